use dom_state::{Component, Context, Definition, Engine, Error, KeylessIdentity, NodeId, Options, Path, Template, Value};
use std::{cell::Cell, rc::Rc};

mod harness_;
use harness_::{init_logging, mount};

struct Pair;
impl Component for Pair {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		let template = Template::element("section")
			.child(Template::element("b").text(cx.store().get("n").unwrap_or_default().to_display_string()))
			.child(Template::element("leaf"))
			.child(Template::element("leaf"));
		cx.create_element(&template.into(), &Value::Null)
	}

	fn watched_paths(&self) -> Vec<Path> {
		vec![Path::parse("n")]
	}
}

struct Leaf {
	drops: Rc<Cell<usize>>,
}
impl Component for Leaf {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		cx.create_element(&Template::element("i").text("leaf").into(), &Value::Null)
	}
}
impl Drop for Leaf {
	fn drop(&mut self) {
		self.drops.set(self.drops.get() + 1)
	}
}

struct Counts {
	constructions: Rc<Cell<usize>>,
	drops: Rc<Cell<usize>>,
}

fn setup(keyless_identity: KeylessIdentity) -> (Engine, Counts) {
	init_logging();
	let engine = Engine::new();
	engine.configure(Options::default().keyless_identity(keyless_identity), Value::from_entries(vec![("n", Value::from(0))]));
	let counts = Counts {
		constructions: Rc::new(Cell::new(0)),
		drops: Rc::new(Cell::new(0)),
	};
	engine.register_component("pair", Definition::new(|_| Pair));
	{
		let (constructions, drops) = (counts.constructions.clone(), counts.drops.clone());
		engine.register_component(
			"leaf",
			Definition::new(move |_| {
				constructions.set(constructions.get() + 1);
				Leaf { drops: drops.clone() }
			}),
		);
	}
	mount(&engine, &["pair"]);
	(engine, counts)
}

fn leaf_identities(engine: &Engine) -> Vec<String> {
	engine.watchers().into_iter().map(|watcher| watcher.identity.to_string()).filter(|identity| identity.starts_with("LEAF")).collect()
}

#[test]
fn collapse_keeps_the_last_claimant() {
	let (engine, counts) = setup(KeylessIdentity::Collapse);
	engine.start().unwrap();
	assert_eq!(leaf_identities(&engine), vec!["LEAF", "LEAF"]);
	assert_eq!(counts.constructions.get(), 2);

	engine.store().set("n", Value::from(1));
	engine.render().unwrap();

	assert_eq!(leaf_identities(&engine), vec!["LEAF"]);
	assert_eq!((counts.constructions.get(), counts.drops.get()), (2, 1));
	assert_eq!(
		engine.document().to_html(engine.root().unwrap()),
		r#"<div id="dom-state-root-element"><section><b>1</b><i>leaf</i></section></div>"#
	);
}

#[test]
fn positional_keeps_both() {
	let (engine, counts) = setup(KeylessIdentity::Positional);
	engine.start().unwrap();
	let before = engine.watchers();

	engine.store().set("n", Value::from(1));
	engine.render().unwrap();

	assert_eq!(leaf_identities(&engine), vec!["LEAF#0", "LEAF#1"]);
	assert_eq!((counts.constructions.get(), counts.drops.get()), (2, 0));
	assert_eq!(engine.watchers().len(), before.len());
	assert_eq!(
		engine.document().to_html(engine.root().unwrap()),
		r#"<div id="dom-state-root-element"><section><b>1</b><i>leaf</i><i>leaf</i></section></div>"#
	);
}
