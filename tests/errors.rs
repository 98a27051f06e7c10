use dom_state::{Capabilities, Component, Context, Definition, Engine, Error, NodeId, Options, Path, Template, Value};
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

mod harness_;
use harness_::{init_logging, mount};

struct Plain;
impl Component for Plain {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		cx.create_element(&Template::element("p").into(), &Value::Null)
	}
}

#[test]
fn render_before_start() {
	init_logging();
	let engine = Engine::new();
	assert!(matches!(engine.render(), Err(Error::NotStarted)));
	assert!(engine.watchers().is_empty());
	assert_eq!(engine.root(), None);
}

#[test]
fn unknown_root() {
	init_logging();
	let engine = Engine::new();
	engine.configure(Options::default().root_element_id("elsewhere"), Value::Null);
	mount(&engine, &[]);
	match engine.start() {
		Err(Error::UnknownRoot(id)) => assert_eq!(id, "elsewhere"),
		other => panic!("unexpected {:?}", other),
	}
	assert!(matches!(engine.render(), Err(Error::NotStarted)));
}

struct Reentrant {
	outcome: Rc<RefCell<Vec<bool>>>,
}
impl Component for Reentrant {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		self.outcome.borrow_mut().push(matches!(cx.capabilities().render(), Err(Error::RenderInProgress)));
		cx.create_element(&Template::element("p").into(), &Value::Null)
	}
}

#[test]
fn nested_render_is_refused() {
	init_logging();
	let engine = Engine::new();
	let outcome = Rc::new(RefCell::new(Vec::new()));
	{
		let outcome = outcome.clone();
		engine.register_component("reentrant", Definition::new(move |_| Reentrant { outcome: outcome.clone() }));
	}
	mount(&engine, &["reentrant"]);
	engine.start().unwrap();
	engine.render().unwrap();
	assert_eq!(*outcome.borrow(), vec![true, true]);
}

struct Recursive;
impl Component for Recursive {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		cx.create_element(&Template::element("div").child(Template::element("recursive")).into(), &Value::Null)
	}
}

#[test]
fn unbounded_nesting_hits_the_depth_limit() {
	init_logging();
	let engine = Engine::new();
	engine.configure(Options::default().depth_limit(3), Value::Null);
	engine.register_component("recursive", Definition::new(|_| Recursive));
	mount(&engine, &["recursive"]);
	assert!(matches!(engine.start(), Err(Error::DepthLimit(3))));
}

struct Broken;
impl Component for Broken {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		cx.create_element(&Template::text("no element here"), &Value::Null)
	}
}

#[test]
fn template_errors_abort_the_pass() {
	init_logging();
	let engine = Engine::new();
	engine.register_component("plain", Definition::new(|_| Plain));
	engine.register_component("broken", Definition::new(|_| Broken));
	mount(&engine, &["plain", "broken"]);

	assert!(matches!(engine.start(), Err(Error::TemplateParse(_))));
	// The pass is over even though it failed.
	assert!(matches!(engine.render(), Err(Error::TemplateParse(_))));
	assert_eq!(engine.watchers().len(), 2);
}

struct Flaky;
impl Component for Flaky {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		if cx.store().get("fail").and_then(|fail| fail.as_bool()).unwrap_or(false) {
			cx.create_element(&Template::text("no element here"), &Value::Null)
		} else {
			cx.create_element(&Template::element("section").child(Template::element("kid")).into(), &Value::Null)
		}
	}

	fn watched_paths(&self) -> Vec<Path> {
		vec![Path::parse("fail")]
	}
}

struct Kid;
impl Component for Kid {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		cx.create_element(&Template::element("i").text("kid").into(), &Value::Null)
	}

	fn watched_paths(&self) -> Vec<Path> {
		vec![Path::parse("label")]
	}
}

#[test]
fn failed_render_keeps_descendants() {
	init_logging();
	let engine = Engine::new();
	engine.configure(Options::default(), Value::from_entries(vec![("fail", Value::from(false))]));
	let constructions = Rc::new(Cell::new(0));
	engine.register_component("flaky", Definition::new(|_| Flaky));
	{
		let constructions = constructions.clone();
		engine.register_component(
			"kid",
			Definition::new(move |_| {
				constructions.set(constructions.get() + 1);
				Kid
			}),
		);
	}
	mount(&engine, &["flaky"]);
	engine.start().unwrap();
	let before = engine.watchers();
	let html = engine.document().to_html(engine.root().unwrap());
	assert_eq!(html, r#"<div id="dom-state-root-element"><section><i>kid</i></section></div>"#);

	engine.store().set("fail", Value::from(true));
	assert!(matches!(engine.render(), Err(Error::TemplateParse(_))));
	assert_eq!(engine.watchers(), before);
	// Still seen as a change, so the failed render is retried.
	assert!(matches!(engine.render(), Err(Error::TemplateParse(_))));

	engine.store().set("fail", Value::from(false));
	engine.render().unwrap();
	assert_eq!(constructions.get(), 1);
	assert_eq!(engine.watchers(), before);
	assert_eq!(engine.document().to_html(engine.root().unwrap()), html);
}

#[test]
fn non_composite_initial_store_is_ignored() {
	init_logging();
	let engine = Engine::new();
	engine.configure(Options::default(), Value::from_entries(vec![("kept", Value::from(true))]));
	engine.configure(Options::default(), Value::from("not a store"));
	assert_eq!(engine.store().get("kept").and_then(|kept| kept.as_bool()), Some(true));

	engine.configure(Options::default(), Value::from_items(vec![Value::from(1)]));
	assert_eq!(engine.store().len(), 1);
	assert!(engine.store().as_list().is_some());
}

struct Keeper {
	kept: Rc<RefCell<Option<Capabilities>>>,
}
impl Component for Keeper {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		*self.kept.borrow_mut() = Some(cx.capabilities().clone());
		cx.create_element(&Template::element("p").into(), &Value::Null)
	}
}

#[test]
fn capabilities_outliving_the_engine() {
	init_logging();
	let engine = Engine::new();
	let kept = Rc::new(RefCell::new(None));
	{
		let kept = kept.clone();
		engine.register_component("keeper", Definition::new(move |_| Keeper { kept: kept.clone() }));
	}
	mount(&engine, &["keeper"]);
	engine.start().unwrap();

	let capabilities = kept.borrow_mut().take().unwrap();
	assert!(capabilities.store().unwrap().is_composite());
	assert!(capabilities.render().is_ok());

	drop(engine);
	assert!(matches!(capabilities.store(), Err(Error::EngineDropped)));
	assert!(matches!(capabilities.render(), Err(Error::EngineDropped)));
}
