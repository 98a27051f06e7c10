use crate::{
	compare,
	component::{resolve_factories, Capabilities, Instance},
	dom::{Document, NodeId},
	engine::{KeylessIdentity, Shared},
	load::kebab_to_camel,
	registry::{Definition, Registry},
	value::{Path, Value},
	Error,
};
use core::fmt::{self, Display, Formatter};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span};

/// What a [`Watcher`] is matched by across passes: the uppercased tag name, qualified by `|key` if there is a `key` prop.
///
/// Without a key, same-tag siblings share an identity unless [`KeylessIdentity::Positional`] is configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);
impl Identity {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for Identity {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Public view of a live watcher, for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherInfo {
	pub identity: Identity,
	/// The node currently standing in for the component in the live tree.
	pub node: NodeId,
	/// Component nesting level, `0` for placeholders in the root element.
	pub depth: usize,
}

/// Binds one component placeholder to its live node, instance and change-detection snapshot.
#[derive(Debug)]
pub(crate) struct Watcher {
	identity: Identity,
	props: Value,
	node: NodeId,
	compiled: Option<Reconciler>,
	snapshot: Value,
	instance: Instance,
}

/// A compiled node tree: the component placeholders found in it, each with a [`Watcher`].
///
/// [`reconcile`](`Reconciler::reconcile`) brings the live tree up to date with a given Store.
#[derive(Debug)]
pub struct Reconciler {
	root: NodeId,
	watchers: Vec<Watcher>,
	/// The root itself was a placeholder, so the root moves along with that watcher's node.
	root_is_placeholder: bool,
}

struct Placeholder {
	node: NodeId,
	tag: String,
	props: Value,
	definition: Rc<Definition>,
}

impl Reconciler {
	/// Discovers the placeholders under (and including) `root` and matches them against `previous` by [`Identity`].
	///
	/// Matched watchers keep their node (which is spliced into `root`'s tree in place of the placeholder),
	/// instance, snapshot and compiled subtree. New identities are instantiated fresh.
	/// Previous watchers that find no match are dropped here.
	#[instrument(skip(shared, previous), fields(previous = previous.len()))]
	pub(crate) fn compile(shared: &Rc<Shared>, root: NodeId, previous: Vec<Watcher>, depth: usize) -> Result<Self, Error> {
		Self::check_depth(shared, depth)?;
		let keyless_identity = shared.options.borrow().keyless_identity;

		let placeholders = {
			let mut document = shared.document.borrow_mut();
			let registry = shared.registry.borrow();
			let mut found = Vec::new();
			discover(&mut document, &registry, root, &mut found);
			found
		};

		let mut previous: Vec<(Identity, Option<Watcher>)> = previous.into_iter().map(|watcher| (watcher.identity.clone(), Some(watcher))).collect();
		let mut ordinals = HashMap::new();
		let mut watchers: Vec<Watcher> = Vec::with_capacity(placeholders.len());
		let mut root_is_placeholder = false;

		for Placeholder { node, tag, props, definition } in placeholders {
			let identity = identity_of(&tag, &props, keyless_identity, &mut ordinals);
			let span = trace_span!("Matching", %identity);
			let _enter = span.enter();

			root_is_placeholder |= node == root;

			// Last match wins, and a claimed watcher stays the match for its identity for the rest of this pass.
			let reused = match previous.iter().rposition(|(candidate, _)| *candidate == identity) {
				None => None,
				Some(i) => match previous[i].1.take() {
					Some(watcher) => Some(watcher),
					None => watchers.iter().rposition(|watcher| watcher.identity == identity).map(|j| {
						trace!("Identity already claimed in this pass. Collapsing onto the later placeholder.");
						watchers.remove(j)
					}),
				},
			};

			let watcher = match reused {
				Some(old) => {
					trace!("Reusing previous watcher.");
					let mut document = shared.document.borrow_mut();
					if let Some(parent) = document.parent(node) {
						document.replace_child(parent, old.node, node);
					}
					Watcher {
						identity,
						props,
						node: old.node,
						compiled: old.compiled,
						snapshot: old.snapshot,
						instance: old.instance,
					}
				}
				None => {
					let factories = resolve_factories(&definition, &shared.registry.borrow());
					let instance = Instance::instantiate(&definition, &factories, Capabilities::new(Rc::downgrade(shared)));
					Watcher {
						identity,
						props,
						node,
						compiled: None,
						snapshot: Value::Null,
						instance,
					}
				}
			};
			watchers.push(watcher);
		}

		let dropped = previous.iter().filter(|(_, watcher)| watcher.is_some()).count();
		if dropped > 0 {
			trace!("Dropping {} unmatched watcher(s).", dropped);
		}

		Ok(Self {
			root,
			watchers,
			root_is_placeholder,
		})
	}

	fn check_depth(shared: &Shared, depth: usize) -> Result<(), Error> {
		let depth_limit = shared.options.borrow().depth_limit;
		if depth > depth_limit {
			error!("Depth limit reached");
			return Err(Error::DepthLimit(depth_limit));
		}
		Ok(())
	}

	/// Updates every watcher against `store`, re-rendering where the change detector says so,
	/// and splices newly rendered subtrees into the live tree. Returns the (unreplaced) root.
	///
	/// # Errors
	///
	/// Errors from component renders and from compiling their output abort the pass.
	#[instrument(skip(self, shared, store), fields(watchers = self.watchers.len()))]
	pub(crate) fn reconcile(&mut self, shared: &Rc<Shared>, store: &Value, depth: usize) -> Result<NodeId, Error> {
		for watcher in &mut self.watchers {
			watcher.reconcile(shared, store, depth)?;
		}
		if self.root_is_placeholder {
			if let Some(watcher) = self.watchers.first() {
				self.root = watcher.node;
			}
		}
		Ok(self.root)
	}

	pub(crate) fn into_watchers(self) -> Vec<Watcher> {
		self.watchers
	}

	#[must_use]
	pub fn root(&self) -> NodeId {
		self.root
	}

	/// All live watchers of this tree and, recursively, of the compiled component subtrees.
	#[must_use]
	pub fn watchers(&self) -> Vec<WatcherInfo> {
		let mut found = Vec::new();
		self.collect_watchers(0, &mut found);
		found
	}

	fn collect_watchers(&self, depth: usize, found: &mut Vec<WatcherInfo>) {
		for watcher in &self.watchers {
			found.push(WatcherInfo {
				identity: watcher.identity.clone(),
				node: watcher.node,
				depth,
			});
			if let Some(compiled) = &watcher.compiled {
				compiled.collect_watchers(depth + 1, found);
			}
		}
	}
}

impl Watcher {
	fn reconcile(&mut self, shared: &Rc<Shared>, store: &Value, depth: usize) -> Result<(), Error> {
		let span = trace_span!("Reconciling", identity = %self.identity);
		let _enter = span.enter();

		self.instance.assign(store.clone(), self.props.clone());

		let watched = self.instance.watched_paths();
		let prop_keys = self.props.keys();
		let (changed, snapshot) = if watched.is_empty() && prop_keys.is_empty() {
			trace!("Nothing to watch. Always rendering.");
			(true, None)
		} else {
			let watch_map: Vec<Path> = watched
				.iter()
				.map(|path| path.prefixed("store"))
				.chain(prop_keys.into_iter().map(|key| Path::from_segments(vec!["props".to_string(), key])))
				.collect();
			let current = Value::from_entries(vec![("store", store.clone()), ("props", self.props.clone())]);
			let verdict = compare::detect_with(&watch_map, &current, &self.snapshot, &mut shared.scratch.borrow_mut());
			(!verdict.unchanged, Some(verdict.snapshot))
		};

		let compiled = match self.compiled.take() {
			Some(compiled) if !changed => compiled,
			previous => {
				trace!("Rendering.");
				// A failed render leaves the previous subtree and snapshot in place, so the next pass retries against them.
				let rendered = Reconciler::check_depth(shared, depth + 1).and_then(|()| self.instance.render());
				let rendered = match rendered {
					Ok(rendered) => rendered,
					Err(error) => {
						self.compiled = previous;
						return Err(error);
					}
				};
				let previous = previous.map(Reconciler::into_watchers).unwrap_or_default();
				Reconciler::compile(shared, rendered, previous, depth + 1)?
			}
		};
		if let Some(snapshot) = snapshot {
			self.snapshot = snapshot;
		}
		let compiled = self.compiled.insert(compiled);

		let child_root = compiled.reconcile(shared, store, depth + 1)?;

		let mut document = shared.document.borrow_mut();
		if document.parent(child_root).is_none() {
			if let Some(parent) = document.parent(self.node) {
				document.replace_child(parent, child_root, self.node);
			}
		}
		// A nested placeholder root may already have been spliced in by its own watcher.
		self.node = child_root;
		Ok(())
	}
}

/// Depth-first search for component placeholders. Their contents are not searched.
fn discover(document: &mut Document, registry: &Registry, node: NodeId, found: &mut Vec<Placeholder>) {
	let tag = match document.tag_name(node) {
		Some(tag) => tag.to_string(),
		None => return,
	};

	if let Some(definition) = registry.component(&tag) {
		// Placeholders that didn't come through the binder (static markup in the root element) get literal props.
		let props = document.take_props(node).unwrap_or_else(|| Value::from_entries(document.attributes(node).iter().map(|(name, value)| (kebab_to_camel(name), Value::from(value.as_str()))).collect::<Vec<_>>()));
		found.push(Placeholder { node, tag, props, definition });
		return;
	}

	for child in document.children(node).to_vec() {
		discover(document, registry, child, found)
	}
}

fn identity_of(tag: &str, props: &Value, keyless_identity: KeylessIdentity, ordinals: &mut HashMap<String, usize>) -> Identity {
	match props.get("key") {
		Some(key) => Identity(format!("{}|{}", tag, key.to_display_string())),
		None => match keyless_identity {
			KeylessIdentity::Collapse => Identity(tag.to_string()),
			KeylessIdentity::Positional => {
				let ordinal = ordinals.entry(tag.to_string()).or_insert(0_usize);
				let identity = Identity(format!("{}#{}", tag, ordinal));
				*ordinal += 1;
				identity
			}
		},
	}
}
