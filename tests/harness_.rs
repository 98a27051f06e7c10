#![allow(dead_code)]

use dom_state::{Document, Engine, NodeId};

pub const ROOT_ID: &str = "dom-state-root-element";

pub fn init_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init();
}

/// Puts `<div id="dom-state-root-element">` with one empty placeholder per tag into the body.
pub fn mount(engine: &Engine, placeholders: &[&str]) -> NodeId {
	let mut document = engine.document_mut();
	let root = document.create_element("div");
	document.set_attribute(root, "id", ROOT_ID);
	for tag in placeholders {
		let placeholder = document.create_element(tag);
		document.append_child(root, placeholder);
	}
	let body = document.body();
	document.append_child(body, root);
	root
}

/// Live watcher nodes whose identity starts with `prefix`, in discovery order.
pub fn watcher_nodes(engine: &Engine, prefix: &str) -> Vec<NodeId> {
	engine.watchers().into_iter().filter(|watcher| watcher.identity.as_str().starts_with(prefix)).map(|watcher| watcher.node).collect()
}

/// First element at or below `node` with a matching `class` attribute.
pub fn find_by_class(document: &Document, node: NodeId, class: &str) -> Option<NodeId> {
	document
		.descendants(node)
		.into_iter()
		.find(|&candidate| document.attribute(candidate, "class").map_or(false, |classes| classes.split_whitespace().any(|c| c == class)))
}
