//! The template binder: turns a [`Template`] and a binding bag into live, detached nodes.
//!
//! Attribute values of the form `{{path}}` are references into the binding bag:
//!
//! - On component elements, every attribute becomes a prop under its camel-cased name.
//!   Literal values are kept as strings, references are resolved.
//! - On other elements, `on…` references become event listeners and are removed from the element.

use crate::{
	dom::{Document, NodeId},
	registry::Registry,
	value::{get, Path, Value},
	Error,
};
use tracing::{error, instrument, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
	Element(ElementTemplate),
	Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementTemplate {
	pub tag: String,
	pub attributes: Vec<(String, String)>,
	pub children: Vec<Template>,
}

impl Template {
	pub fn element(tag: impl Into<String>) -> ElementTemplate {
		ElementTemplate {
			tag: tag.into(),
			..ElementTemplate::default()
		}
	}

	pub fn text(text: impl Into<String>) -> Self {
		Self::Text(text.into())
	}
}

impl ElementTemplate {
	#[must_use]
	pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.attributes.push((name.into(), value.into()));
		self
	}

	#[must_use]
	pub fn child(mut self, child: impl Into<Template>) -> Self {
		self.children.push(child.into());
		self
	}

	#[must_use]
	pub fn children<T: Into<Template>>(mut self, children: impl IntoIterator<Item = T>) -> Self {
		self.children.extend(children.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub fn text(self, text: impl Into<String>) -> Self {
		self.child(Template::text(text))
	}
}

impl From<ElementTemplate> for Template {
	fn from(element: ElementTemplate) -> Self {
		Self::Element(element)
	}
}

/// Binds `template` against `bindings` into a new detached subtree of `document` and returns its root.
///
/// # Errors
///
/// [`Error::TemplateParse`] if the template root is not an element or any tag name is not a valid name.
/// Nothing is created in that case.
#[instrument(skip(document, registry, template, bindings))]
pub fn create_element(document: &mut Document, registry: &Registry, template: &Template, bindings: &Value) -> Result<NodeId, Error> {
	let element = match template {
		Template::Element(element) => element,
		Template::Text(_) => {
			error!("Template has no root element.");
			return Err(Error::TemplateParse("no root element".to_string()));
		}
	};
	validate(element)?;
	Ok(load_element(document, registry, element, bindings))
}

fn validate(element: &ElementTemplate) -> Result<(), Error> {
	let valid = !element.tag.is_empty() && element.tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':');
	if !valid {
		error!("Invalid tag name {:?}.", element.tag);
		return Err(Error::TemplateParse(format!("invalid tag name {:?}", element.tag)));
	}
	element.children.iter().try_for_each(|child| match child {
		Template::Element(child) => validate(child),
		Template::Text(_) => Ok(()),
	})
}

pub fn load_child_nodes(document: &mut Document, registry: &Registry, parent: NodeId, children: &[Template], bindings: &Value) {
	for child in children {
		let node = match child {
			Template::Element(element) => load_element(document, registry, element, bindings),
			Template::Text(text) => document.create_text(text),
		};
		document.append_child(parent, node);
	}
}

pub fn load_element(document: &mut Document, registry: &Registry, element: &ElementTemplate, bindings: &Value) -> NodeId {
	let node = document.create_element(&element.tag);
	let is_component = registry.component(&element.tag).is_some();
	if is_component {
		trace!(tag = %element.tag, "Found component placeholder.");
	}
	load_attributes(document, node, is_component, &element.attributes, bindings);
	load_child_nodes(document, registry, node, &element.children, bindings);
	node
}

pub fn load_attributes(document: &mut Document, node: NodeId, is_component: bool, attributes: &[(String, String)], bindings: &Value) {
	let props = if is_component && !attributes.is_empty() { Some(Value::map()) } else { None };
	for (name, value) in attributes {
		if load_attribute(document, node, props.as_ref(), name, value, bindings) {
			document.set_attribute(node, name, value);
		}
	}
	if let Some(props) = props {
		document.set_props(node, props);
	}
}

/// Returns whether the attribute should stay on the element.
pub fn load_attribute(document: &mut Document, node: NodeId, props: Option<&Value>, name: &str, value: &str, bindings: &Value) -> bool {
	let reference = Path::reference(value);
	if let Some(props) = props {
		let prop = match &reference {
			Some(path) => resolve(bindings, path),
			None => Value::from(value),
		};
		props.set(kebab_to_camel(name), prop);
		true
	} else if let (Some(path), Some(event)) = (&reference, name.strip_prefix("on")) {
		match resolve(bindings, path) {
			Value::Handler(handler) => document.add_event_listener(node, event, handler),
			other => {
				#[cfg(feature = "dangerous-logging")]
				warn!(attribute = %name, path = %path, value = ?other, "Event binding did not resolve to a handler. Dropping it.");
				#[cfg(not(feature = "dangerous-logging"))]
				warn!(attribute = %name, path = %path, null = other.is_null(), "Event binding did not resolve to a handler. Dropping it.");
			}
		}
		false
	} else {
		true
	}
}

/// Dotted lookup. Misses resolve to [`Value::Null`].
fn resolve(bindings: &Value, path: &Path) -> Value {
	get(bindings, path).unwrap_or_else(|| {
		warn!(path = %path, "PathResolutionMiss: resolving to `Null`.");
		Value::Null
	})
}

/// `toggle-task-done` → `toggleTaskDone`. Only hyphens followed by a lowercase ASCII letter are folded.
#[must_use]
pub fn kebab_to_camel(name: &str) -> String {
	let mut camel = String::with_capacity(name.len());
	let mut chars = name.chars().peekable();
	while let Some(c) = chars.next() {
		match (c, chars.peek()) {
			('-', Some(&next)) if next.is_ascii_lowercase() => {
				camel.push(next.to_ascii_uppercase());
				chars.next();
			}
			(c, _) => camel.push(c),
		}
	}
	camel
}
