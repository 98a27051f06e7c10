//! A small component reconciliation engine.
//!
//! Component placeholders in a live node tree are matched across render passes by [`Identity`](`diff::Identity`),
//! re-rendered only when the data they watch has changed ([`compare`]), and their fresh output is spliced into
//! the live tree in place of the old subtree. Nodes that don't need re-rendering are kept as-is,
//! so their identity (and any state attached to it) survives.
//!
//! The rendering target is the in-memory [`Document`]. Templates are bound into it by [`load`].
//!
//! # Example
//!
//! ```
//! use dom_state::{Component, Context, Definition, Engine, Error, NodeId, Options, Path, Template, Value};
//!
//! struct Greeting;
//! impl Component for Greeting {
//! 	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
//! 		let name = cx.store().get("name").unwrap_or_default().to_display_string();
//! 		cx.create_element(&Template::element("p").text(format!("Hello, {}!", name)).into(), &Value::Null)
//! 	}
//!
//! 	fn watched_paths(&self) -> Vec<Path> {
//! 		vec![Path::parse("name")]
//! 	}
//! }
//!
//! let engine = Engine::new();
//! engine.configure(Options::default().root_element_id("app"), Value::from_entries(vec![("name", Value::from("World"))]));
//! engine.register_component("greeting", Definition::new(|_| Greeting));
//! {
//! 	let mut document = engine.document_mut();
//! 	let app = document.create_element("div");
//! 	document.set_attribute(app, "id", "app");
//! 	let placeholder = document.create_element("greeting");
//! 	document.append_child(app, placeholder);
//! 	let body = document.body();
//! 	document.append_child(body, app);
//! }
//! engine.start()?;
//!
//! let app = engine.document().get_element_by_id("app").unwrap();
//! assert_eq!(engine.document().to_html(app), r#"<div id="app"><p>Hello, World!</p></div>"#);
//! # Ok::<(), Error>(())
//! ```

#![doc(html_root_url = "https://docs.rs/dom-state/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod compare;
pub mod component;
pub mod diff;
pub mod dom;
mod engine;
pub mod load;
pub mod registry;
mod temp_set;
pub mod value;

pub use component::{Capabilities, Component, Context};
pub use dom::{Document, Event, NodeId};
pub use engine::{Engine, KeylessIdentity, Options};
pub use load::Template;
pub use registry::Definition;
pub use value::{Handler, Path, Value};

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// A template without a usable root element. Fatal for the current pass.
	#[error("template parse error: {0}")]
	TemplateParse(String),
	#[error("root element {0:?} not found")]
	UnknownRoot(String),
	#[error("the engine has not been started")]
	NotStarted,
	/// `render` was requested from inside a render pass.
	#[error("a render pass is already in progress")]
	RenderInProgress,
	#[error("component nesting exceeds the depth limit of {0}")]
	DepthLimit(usize),
	/// A [`Capabilities`] handle outlived its engine.
	#[error("the engine has been dropped")]
	EngineDropped,
}
