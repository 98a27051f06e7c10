//! The in-memory rendering target.
//!
//! A [`Document`] is an arena of element and text nodes addressed by [`NodeId`].
//! Ids are never reused, so a [`NodeId`] doubles as the node's native identity:
//! two ids are equal exactly when they refer to the same live node.
//!
//! Structural primitives follow DOM semantics. In particular [`Document::replace_child`] and
//! [`Document::append_child`] *move* a node that already has a parent.

use crate::value::{Handler, Value};
use hashbrown::{HashMap, HashSet};
use tracing::{error, instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

/// Passed to [`Handler`]s by [`Engine::dispatch`](`crate::Engine::dispatch`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
	/// The event name without `on` prefix, like `click`.
	pub name: String,
	pub target: NodeId,
}

#[derive(Debug)]
struct Entry {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	data: Data,
}

#[derive(Debug)]
enum Data {
	Element {
		tag: String,
		attributes: Vec<(String, String)>,
		listeners: Vec<(String, Handler)>,
		/// Resolved component props, parked here by the binder until the reconciler collects them.
		props: Option<Value>,
	},
	Text(String),
}

#[derive(Debug)]
pub struct Document {
	nodes: HashMap<NodeId, Entry>,
	next_id: u64,
	body: NodeId,
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Document {
	#[must_use]
	pub fn new() -> Self {
		let body = NodeId(0);
		let mut nodes = HashMap::new();
		nodes.insert(
			body,
			Entry {
				parent: None,
				children: Vec::new(),
				data: Data::Element {
					tag: "BODY".to_string(),
					attributes: Vec::new(),
					listeners: Vec::new(),
					props: None,
				},
			},
		);
		Self { nodes, next_id: 1, body }
	}

	/// The permanent root. Everything not reachable from here is garbage.
	#[must_use]
	pub fn body(&self) -> NodeId {
		self.body
	}

	fn insert(&mut self, data: Data) -> NodeId {
		let id = NodeId(self.next_id);
		self.next_id += 1;
		self.nodes.insert(id, Entry { parent: None, children: Vec::new(), data });
		id
	}

	/// Creates a detached element. Tag names are stored uppercased.
	pub fn create_element(&mut self, tag: &str) -> NodeId {
		self.insert(Data::Element {
			tag: tag.to_ascii_uppercase(),
			attributes: Vec::new(),
			listeners: Vec::new(),
			props: None,
		})
	}

	pub fn create_text(&mut self, text: &str) -> NodeId {
		self.insert(Data::Text(text.to_string()))
	}

	#[must_use]
	pub fn contains(&self, node: NodeId) -> bool {
		self.nodes.contains_key(&node)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	#[must_use]
	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.nodes.get(&node).and_then(|entry| entry.parent)
	}

	#[must_use]
	pub fn children(&self, node: NodeId) -> &[NodeId] {
		self.nodes.get(&node).map_or(&[][..], |entry| entry.children.as_slice())
	}

	/// `None` for text nodes and unknown ids.
	#[must_use]
	pub fn tag_name(&self, node: NodeId) -> Option<&str> {
		match &self.nodes.get(&node)?.data {
			Data::Element { tag, .. } => Some(tag),
			Data::Text(_) => None,
		}
	}

	#[must_use]
	pub fn is_element(&self, node: NodeId) -> bool {
		self.tag_name(node).is_some()
	}

	#[must_use]
	pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
		match &self.nodes.get(&node)?.data {
			Data::Element { attributes, .. } => attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str()),
			Data::Text(_) => None,
		}
	}

	#[must_use]
	pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
		match self.nodes.get(&node).map(|entry| &entry.data) {
			Some(Data::Element { attributes, .. }) => attributes,
			_ => &[],
		}
	}

	#[instrument(skip(self))]
	pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
		match self.nodes.get_mut(&node).map(|entry| &mut entry.data) {
			Some(Data::Element { attributes, .. }) => match attributes.iter_mut().find(|(n, _)| n == name) {
				Some((_, existing)) => *existing = value.to_string(),
				None => attributes.push((name.to_string(), value.to_string())),
			},
			Some(Data::Text(_)) => error!("Can't set an attribute on a text node."),
			None => error!("Unknown node."),
		}
	}

	pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Option<String> {
		match self.nodes.get_mut(&node).map(|entry| &mut entry.data) {
			Some(Data::Element { attributes, .. }) => {
				let i = attributes.iter().position(|(n, _)| n == name)?;
				Some(attributes.remove(i).1)
			}
			_ => None,
		}
	}

	#[instrument(skip(self, handler), fields(handler = handler.name()))]
	pub fn add_event_listener(&mut self, node: NodeId, event: &str, handler: Handler) {
		match self.nodes.get_mut(&node).map(|entry| &mut entry.data) {
			Some(Data::Element { listeners, .. }) => listeners.push((event.to_string(), handler)),
			Some(Data::Text(_)) => error!("Can't listen on a text node."),
			None => error!("Unknown node."),
		}
	}

	/// Handlers bound to `event` on `node`, in binding order.
	#[must_use]
	pub fn listeners(&self, node: NodeId, event: &str) -> Vec<Handler> {
		match self.nodes.get(&node).map(|entry| &entry.data) {
			Some(Data::Element { listeners, .. }) => listeners.iter().filter(|(name, _)| name == event).map(|(_, handler)| handler.clone()).collect(),
			_ => Vec::new(),
		}
	}

	pub(crate) fn set_props(&mut self, node: NodeId, value: Value) {
		if let Some(Data::Element { props, .. }) = self.nodes.get_mut(&node).map(|entry| &mut entry.data) {
			*props = Some(value)
		}
	}

	pub(crate) fn take_props(&mut self, node: NodeId) -> Option<Value> {
		match self.nodes.get_mut(&node).map(|entry| &mut entry.data) {
			Some(Data::Element { props, .. }) => props.take(),
			_ => None,
		}
	}

	fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
		loop {
			if node == ancestor {
				return true;
			}
			match self.parent(node) {
				Some(parent) => node = parent,
				None => return false,
			}
		}
	}

	fn detach(&mut self, node: NodeId) {
		if let Some(parent) = self.nodes.get_mut(&node).and_then(|entry| entry.parent.take()) {
			if let Some(parent) = self.nodes.get_mut(&parent) {
				parent.children.retain(|&child| child != node);
			}
		}
	}

	fn check_insertion(&self, parent: NodeId, new_child: NodeId) -> bool {
		if !self.contains(parent) || !self.contains(new_child) {
			error!("Unknown node.");
			false
		} else if !self.is_element(parent) {
			error!("Text nodes can't have children.");
			false
		} else if self.is_inclusive_ancestor(new_child, parent) {
			error!("Can't insert a node into itself or its own descendant.");
			false
		} else {
			true
		}
	}

	/// Appends `child` to `parent`, first detaching it from its current parent.
	#[instrument(skip(self))]
	pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
		if !self.check_insertion(parent, child) {
			return false;
		}
		self.detach(child);
		if let Some(entry) = self.nodes.get_mut(&child) {
			entry.parent = Some(parent)
		}
		if let Some(entry) = self.nodes.get_mut(&parent) {
			entry.children.push(child)
		}
		true
	}

	/// Puts `new_child` where `old_child` is. `old_child` ends up detached.
	///
	/// `new_child` is moved if it has a parent already, which may be `parent` itself.
	#[instrument(skip(self))]
	pub fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> bool {
		if self.parent(old_child) != Some(parent) {
			error!("The replaced node is not a child of the given parent.");
			return false;
		}
		if new_child == old_child {
			return true;
		}
		if !self.check_insertion(parent, new_child) {
			return false;
		}
		self.detach(new_child);
		let position = match self.children(parent).iter().position(|&child| child == old_child) {
			Some(position) => position,
			None => {
				error!("Parent/child links are inconsistent.");
				return false;
			}
		};
		if let Some(entry) = self.nodes.get_mut(&parent) {
			entry.children[position] = new_child;
		}
		if let Some(entry) = self.nodes.get_mut(&old_child) {
			entry.parent = None;
		}
		if let Some(entry) = self.nodes.get_mut(&new_child) {
			entry.parent = Some(parent);
		}
		trace!("Replaced child node.");
		true
	}

	pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
		if self.parent(child) == Some(parent) {
			self.detach(child);
			true
		} else {
			error!("The removed node is not a child of the given parent.");
			false
		}
	}

	/// `node` and everything below it, in document order.
	#[must_use]
	pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
		let mut found = Vec::new();
		let mut stack = vec![node];
		while let Some(current) = stack.pop() {
			if !self.contains(current) {
				continue;
			}
			found.push(current);
			stack.extend(self.children(current).iter().rev());
		}
		found
	}

	/// First element below (and including) [`body`](`Document::body`) with a matching `id` attribute.
	#[must_use]
	pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
		self.descendants(self.body).into_iter().find(|&node| self.attribute(node, "id") == Some(id))
	}

	/// Concatenated text of `node` and its descendants.
	#[must_use]
	pub fn text_content(&self, node: NodeId) -> String {
		self.descendants(node)
			.into_iter()
			.filter_map(|node| match &self.nodes.get(&node)?.data {
				Data::Text(text) => Some(text.as_str()),
				Data::Element { .. } => None,
			})
			.collect()
	}

	/// Serializes `node` as lowercase HTML. Event listeners and parked props are not part of the output.
	#[must_use]
	pub fn to_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		self.write_html(node, &mut html);
		html
	}

	fn write_html(&self, node: NodeId, html: &mut String) {
		match self.nodes.get(&node).map(|entry| &entry.data) {
			Some(Data::Text(text)) => html.push_str(&escape(text, false)),
			Some(Data::Element { tag, attributes, .. }) => {
				let tag = tag.to_ascii_lowercase();
				html.push('<');
				html.push_str(&tag);
				for (name, value) in attributes {
					html.push(' ');
					html.push_str(name);
					html.push_str("=\"");
					html.push_str(&escape(value, true));
					html.push('"');
				}
				html.push('>');
				for &child in self.children(node) {
					self.write_html(child, html);
				}
				html.push_str("</");
				html.push_str(&tag);
				html.push('>');
			}
			None => {}
		}
	}

	/// Drops every node that is not reachable from [`body`](`Document::body`).
	///
	/// Returns the number of freed nodes.
	#[instrument(skip(self))]
	pub fn collect_garbage(&mut self) -> usize {
		let reachable: HashSet<NodeId> = self.descendants(self.body).into_iter().collect();
		let before = self.nodes.len();
		self.nodes.retain(|id, _| reachable.contains(id));
		let freed = before - self.nodes.len();
		trace!("Freed {} node(s).", freed);
		freed
	}
}

fn escape(text: &str, attribute: bool) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' if attribute => escaped.push_str("&quot;"),
			c => escaped.push(c),
		}
	}
	escaped
}
