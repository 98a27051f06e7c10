use crate::{
	diff::{Reconciler, WatcherInfo},
	dom::{Document, Event, NodeId},
	load::{self, Template},
	registry::{Definition, Registry},
	temp_set::TempPairSet,
	value::Value,
	Error,
};
use core::{
	cell::{Cell, Ref, RefCell, RefMut},
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;
use tracing::{error, info, instrument, trace, warn};

/// How component placeholders without a `key` are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeylessIdentity {
	/// Same-tag siblings without a key share one identity.
	/// Once they are matched against the previous pass, only the last of them survives.
	Collapse,
	/// Placeholders without a key are qualified by their ordinal among same-tag placeholders without a key.
	Positional,
}
impl Default for KeylessIdentity {
	fn default() -> Self {
		Self::Collapse
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
	/// `id` attribute of the element that [`Engine::start`] compiles.
	pub root_element_id: String,
	pub keyless_identity: KeylessIdentity,
	/// Maximum component nesting depth.
	pub depth_limit: usize,
}
impl Default for Options {
	fn default() -> Self {
		Self {
			root_element_id: "dom-state-root-element".to_string(),
			keyless_identity: KeylessIdentity::default(),
			depth_limit: 64,
		}
	}
}
impl Options {
	#[must_use]
	pub fn root_element_id(mut self, id: impl Into<String>) -> Self {
		self.root_element_id = id.into();
		self
	}

	#[must_use]
	pub fn keyless_identity(mut self, keyless_identity: KeylessIdentity) -> Self {
		self.keyless_identity = keyless_identity;
		self
	}

	#[must_use]
	pub fn depth_limit(mut self, depth_limit: usize) -> Self {
		self.depth_limit = depth_limit;
		self
	}
}

pub(crate) struct Shared {
	pub(crate) options: RefCell<Options>,
	store: RefCell<Value>,
	pub(crate) registry: RefCell<Registry>,
	pub(crate) document: RefCell<Document>,
	root: RefCell<Option<Reconciler>>,
	rendering: Cell<bool>,
	pub(crate) scratch: RefCell<TempPairSet>,
}

/// The engine context: Store, Registry, rendering target and the compiled root.
///
/// Cloning is cheap and yields another handle to the same engine.
/// Everything is single-threaded: a render pass runs to completion before any call returns.
#[derive(Clone)]
pub struct Engine {
	shared: Rc<Shared>,
}

impl Default for Engine {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for Engine {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Engine")
			.field("options", &*self.shared.options.borrow())
			.field("started", &self.shared.root.try_borrow().map(|root| root.is_some()).unwrap_or(true))
			.field("rendering", &self.shared.rendering.get())
			.finish_non_exhaustive()
	}
}

/// Clears the rendering flag even if a component panics.
struct RenderingGuard<'a>(&'a Cell<bool>);
impl Drop for RenderingGuard<'_> {
	fn drop(&mut self) {
		self.0.set(false)
	}
}

impl Engine {
	/// An engine over an empty [`Document`].
	#[must_use]
	pub fn new() -> Self {
		Self::with_document(Document::new())
	}

	/// An engine over an existing [`Document`], typically one that already contains the root element.
	#[must_use]
	pub fn with_document(document: Document) -> Self {
		Self::from_shared(Rc::new(Shared {
			options: RefCell::new(Options::default()),
			store: RefCell::new(Value::map()),
			registry: RefCell::new(Registry::new()),
			document: RefCell::new(document),
			root: RefCell::new(None),
			rendering: Cell::new(false),
			scratch: RefCell::new(TempPairSet::new()),
		}))
	}

	pub(crate) fn from_shared(shared: Rc<Shared>) -> Self {
		Self { shared }
	}

	/// Applies `options`, and replaces the Store with `initial_store` iff that is a map or list.
	#[instrument(skip(self, initial_store))]
	pub fn configure(&self, options: Options, initial_store: Value) {
		if initial_store.is_composite() {
			*self.shared.store.borrow_mut() = initial_store;
		} else if !initial_store.is_null() {
			warn!("Ignoring initial store that is neither map nor list.");
		}
		*self.shared.options.borrow_mut() = options;
	}

	/// Registers `definition` under the case-insensitive `name`, replacing any previous one.
	pub fn register_component(&self, name: &str, definition: Definition) {
		self.shared.registry.borrow_mut().register_component(name, definition)
	}

	/// Registers a factory value under the exact `name`, replacing any previous one.
	pub fn register_factory(&self, name: &str, value: Value) {
		self.shared.registry.borrow_mut().register_factory(name, value)
	}

	/// A handle to the current Store. Composites are shared, so changes made through it are seen by the next render.
	#[must_use]
	pub fn store(&self) -> Value {
		self.shared.store.borrow().clone()
	}

	/// Swaps the Store wholesale and renders immediately.
	///
	/// # Errors
	///
	/// See [`Engine::render`]. The Store is replaced either way.
	#[instrument(skip(self, store))]
	pub fn replace_store(&self, store: Value) -> Result<(), Error> {
		*self.shared.store.borrow_mut() = store;
		self.render()
	}

	/// Compiles the configured root element from scratch and performs the first render.
	///
	/// # Errors
	///
	/// [`Error::UnknownRoot`] if no element has the configured `id`, [`Error::RenderInProgress`] from inside a pass,
	/// and anything [`Engine::render`] returns.
	#[instrument(skip(self))]
	pub fn start(&self) -> Result<(), Error> {
		if self.shared.rendering.get() {
			return Err(Error::RenderInProgress);
		}
		let id = self.shared.options.borrow().root_element_id.clone();
		let root = match self.shared.document.borrow().get_element_by_id(&id) {
			Some(root) => root,
			None => {
				error!("Root element {:?} not found.", id);
				return Err(Error::UnknownRoot(id));
			}
		};
		let compiled = Reconciler::compile(&self.shared, root, Vec::new(), 0)?;
		*self.shared.root.borrow_mut() = Some(compiled);
		self.render()
	}

	/// Reconciles the live tree against the current Store. Synchronous; repeated calls without Store changes are no-ops.
	///
	/// Nodes that are no longer reachable from the document body afterwards are freed.
	///
	/// # Errors
	///
	/// [`Error::NotStarted`] before [`Engine::start`], [`Error::RenderInProgress`] if called from inside a pass
	/// (the nested request is refused rather than queued), and any error from a component render.
	/// A failed pass leaves already-reconciled parts of the tree updated.
	#[instrument(skip(self))]
	pub fn render(&self) -> Result<(), Error> {
		if self.shared.rendering.get() {
			warn!("Render requested during a render pass. Refusing.");
			return Err(Error::RenderInProgress);
		}
		let mut root = self.shared.root.borrow_mut().take().ok_or(Error::NotStarted)?;

		let result = {
			self.shared.rendering.set(true);
			let _guard = RenderingGuard(&self.shared.rendering);
			let store = self.store();
			root.reconcile(&self.shared, &store, 0)
		};

		let watchers = root.watchers().len();
		*self.shared.root.borrow_mut() = Some(root);
		result?;

		let freed = self.shared.document.borrow_mut().collect_garbage();
		info!("Watcher count/live nodes/freed nodes: {}/{}/{}", watchers, self.shared.document.borrow().len(), freed);
		info!("Change detection heap capacity (visited pairs): {}", self.shared.scratch.borrow().capacity());
		Ok(())
	}

	/// Binds a template into a new detached subtree. See [`load::create_element`].
	///
	/// # Errors
	///
	/// [`Error::TemplateParse`].
	pub fn create_element(&self, template: &Template, bindings: &Value) -> Result<NodeId, Error> {
		let registry = self.shared.registry.borrow();
		load::create_element(&mut self.shared.document.borrow_mut(), &registry, template, bindings)
	}

	/// Calls the handlers bound to `event` on `target`, outside of any document borrow,
	/// so they may change the Store and [`render`](`Engine::render`).
	///
	/// Returns how many handlers ran.
	#[instrument(skip(self))]
	pub fn dispatch(&self, target: NodeId, event: &str) -> usize {
		let handlers = self.shared.document.borrow().listeners(target, event);
		let event = Event { name: event.to_string(), target };
		for handler in &handlers {
			trace!(handler = handler.name(), "Calling handler.");
			handler.call(&event);
		}
		handlers.len()
	}

	/// Read access to the rendering target.
	///
	/// # Panics
	///
	/// If the document is currently borrowed mutably, which only happens inside engine calls.
	#[must_use]
	pub fn document(&self) -> Ref<'_, Document> {
		self.shared.document.borrow()
	}

	/// Write access to the rendering target, to set up the root element before [`Engine::start`].
	///
	/// # Panics
	///
	/// If the document is currently borrowed.
	#[must_use]
	pub fn document_mut(&self) -> RefMut<'_, Document> {
		self.shared.document.borrow_mut()
	}

	/// All live watchers, outermost first. Empty before [`Engine::start`] and during a pass.
	#[must_use]
	pub fn watchers(&self) -> Vec<WatcherInfo> {
		match self.shared.root.try_borrow() {
			Ok(root) => root.as_ref().map(Reconciler::watchers).unwrap_or_default(),
			Err(_) => Vec::new(),
		}
	}

	/// The compiled root element, once started.
	#[must_use]
	pub fn root(&self) -> Option<NodeId> {
		self.shared.root.try_borrow().ok().and_then(|root| root.as_ref().map(Reconciler::root))
	}
}
