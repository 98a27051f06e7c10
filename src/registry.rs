//! Component Definitions and Factories by name.

use crate::{component::Component, value::Value};
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{instrument, trace};

type Constructor = dyn Fn(&[Value]) -> Box<dyn Component>;

/// The factory names to inject, followed by a constructor that receives the resolved factories positionally.
#[derive(Clone)]
pub struct Definition {
	factories: Vec<String>,
	constructor: Rc<Constructor>,
}
impl Definition {
	/// A definition without factories.
	pub fn new<C: 'static + Component>(constructor: impl 'static + Fn(&[Value]) -> C) -> Self {
		Self::with_factories(Vec::<String>::new(), constructor)
	}

	/// Factory names are not validated here. Missing ones resolve to [`Value::Null`] at instantiation.
	pub fn with_factories<C: 'static + Component, S: Into<String>>(factories: impl IntoIterator<Item = S>, constructor: impl 'static + Fn(&[Value]) -> C) -> Self {
		let constructor: Rc<Constructor> = Rc::new(move |factories: &[Value]| -> Box<dyn Component> { Box::new(constructor(factories)) });
		Self {
			factories: factories.into_iter().map(Into::into).collect(),
			constructor,
		}
	}

	#[must_use]
	pub fn factories(&self) -> &[String] {
		&self.factories
	}

	pub(crate) fn construct(&self, factories: &[Value]) -> Box<dyn Component> {
		(self.constructor)(factories)
	}
}
impl Debug for Definition {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Definition").field("factories", &self.factories).finish_non_exhaustive()
	}
}

#[derive(Debug, Default)]
pub struct Registry {
	components: HashMap<String, Rc<Definition>>,
	factories: HashMap<String, Value>,
}
impl Registry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Component names are case-insensitive. Re-registering overwrites.
	#[instrument(skip(self, definition))]
	pub fn register_component(&mut self, name: &str, definition: Definition) {
		if self.components.insert(name.to_ascii_uppercase(), Rc::new(definition)).is_some() {
			trace!("Replaced an existing component definition.");
		}
	}

	/// Factory names are case-sensitive. Re-registering overwrites.
	#[instrument(skip(self, value))]
	pub fn register_factory(&mut self, name: &str, value: Value) {
		if self.factories.insert(name.to_string(), value).is_some() {
			trace!("Replaced an existing factory.");
		}
	}

	#[must_use]
	pub fn component(&self, tag: &str) -> Option<Rc<Definition>> {
		self.components.get(&tag.to_ascii_uppercase()).cloned()
	}

	#[must_use]
	pub fn factory(&self, name: &str) -> Option<Value> {
		self.factories.get(name).cloned()
	}
}
