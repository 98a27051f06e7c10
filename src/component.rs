//! The component contract and the instantiator.
//!
//! A [`Component`] only has to know how to [`render`](`Component::render`) itself.
//! Everything else it needs (the Store, its props, and the engine's element factory and re-render trigger)
//! is handed to it through a [`Context`] that the reconciler refreshes before each render.

use crate::{
	dom::NodeId,
	engine::{Engine, Shared},
	load::Template,
	registry::{Definition, Registry},
	value::{Path, Value},
	Error,
};
use core::fmt::{self, Debug, Formatter};
use std::rc::Weak;
use tracing::{instrument, trace, warn};

pub trait Component {
	/// Builds this component's subtree. The returned root must be detached.
	///
	/// # Errors
	///
	/// Typically a [`Error::TemplateParse`] from [`Context::create_element`].
	/// Any error aborts the current render pass.
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error>;

	/// Store paths whose changes should trigger a re-render. Props are always watched.
	///
	/// A component that declares no paths and receives no props is re-rendered on every pass.
	fn watched_paths(&self) -> Vec<Path> {
		Vec::new()
	}
}

/// What a [`Component`] sees while rendering.
pub struct Context<'a> {
	store: &'a Value,
	props: &'a Value,
	capabilities: &'a Capabilities,
}
impl<'a> Context<'a> {
	#[must_use]
	pub fn store(&self) -> &'a Value {
		self.store
	}

	/// The resolved props as a [`Value::Map`].
	#[must_use]
	pub fn props(&self) -> &'a Value {
		self.props
	}

	/// A single prop, or [`Value::Null`].
	#[must_use]
	pub fn prop(&self, name: &str) -> Value {
		self.props.get(name).unwrap_or_default()
	}

	/// Engine access that may be kept beyond this render, for example in event handlers.
	#[must_use]
	pub fn capabilities(&self) -> &'a Capabilities {
		self.capabilities
	}

	/// See [`Capabilities::create_element`].
	///
	/// # Errors
	///
	/// Iff the template has no root element.
	pub fn create_element(&self, template: &Template, bindings: &Value) -> Result<NodeId, Error> {
		self.capabilities.create_element(template, bindings)
	}
}

/// Engine services injected into every instance. Holds the engine weakly.
#[derive(Clone)]
pub struct Capabilities {
	engine: Weak<Shared>,
}
impl Capabilities {
	pub(crate) fn new(engine: Weak<Shared>) -> Self {
		Self { engine }
	}

	fn engine(&self) -> Result<Engine, Error> {
		self.engine.upgrade().map(Engine::from_shared).ok_or(Error::EngineDropped)
	}

	/// Triggers a full synchronous render of the application.
	///
	/// # Errors
	///
	/// Anything [`Engine::render`] returns, or [`Error::EngineDropped`].
	pub fn render(&self) -> Result<(), Error> {
		self.engine()?.render()
	}

	/// Binds `template` into a new detached subtree. See [`load::create_element`](`crate::load::create_element`).
	///
	/// # Errors
	///
	/// [`Error::TemplateParse`] or [`Error::EngineDropped`].
	pub fn create_element(&self, template: &Template, bindings: &Value) -> Result<NodeId, Error> {
		self.engine()?.create_element(template, bindings)
	}

	/// The current Store (shared, so mutations are visible to the next render).
	///
	/// # Errors
	///
	/// Iff the engine is gone.
	pub fn store(&self) -> Result<Value, Error> {
		Ok(self.engine()?.store())
	}
}
impl Debug for Capabilities {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Capabilities").field("engine_alive", &(self.engine.strong_count() > 0)).finish()
	}
}

/// A live component together with the state the reconciler assigns to it on each pass.
pub struct Instance {
	component: Box<dyn Component>,
	store: Value,
	props: Value,
	capabilities: Capabilities,
}
impl Instance {
	/// Runs the constructor with `factories` as its leading arguments.
	/// Store and props start out empty and are assigned before the first render.
	pub(crate) fn instantiate(definition: &Definition, factories: &[Value], capabilities: Capabilities) -> Self {
		let component = definition.construct(factories);
		trace!("Instantiated component.");
		Self {
			component,
			store: Value::map(),
			props: Value::map(),
			capabilities,
		}
	}

	pub(crate) fn assign(&mut self, store: Value, props: Value) {
		self.store = store;
		self.props = props;
	}

	pub(crate) fn watched_paths(&self) -> Vec<Path> {
		self.component.watched_paths()
	}

	pub(crate) fn render(&mut self) -> Result<NodeId, Error> {
		let cx = Context {
			store: &self.store,
			props: &self.props,
			capabilities: &self.capabilities,
		};
		self.component.render(&cx)
	}
}
impl Debug for Instance {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instance").field("props", &self.props).finish_non_exhaustive()
	}
}

/// Looks up `definition`'s factories by name. Missing factories are injected as [`Value::Null`].
#[instrument(skip(definition, registry))]
pub(crate) fn resolve_factories(definition: &Definition, registry: &Registry) -> Vec<Value> {
	definition
		.factories()
		.iter()
		.map(|name| {
			registry.factory(name).unwrap_or_else(|| {
				warn!(factory = %name, "FactoryNotFound: injecting `Null`.");
				Value::Null
			})
		})
		.collect()
}
