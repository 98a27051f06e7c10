use dom_state::{Component, Context, Definition, Engine, Error, NodeId, Options, Path, Template, Value};
use std::{cell::Cell, rc::Rc};

mod harness_;
use harness_::{init_logging, mount, watcher_nodes};

struct List;
impl Component for List {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		let ids = cx.store().get("ids").unwrap_or_default();
		let items = ids.keys().into_iter().map(|i| {
			Template::element("list-item")
				.attribute("key", format!("{{{{ids.{}}}}}", i))
				.attribute("label", format!("{{{{ids.{}}}}}", i))
		});
		cx.create_element(&Template::element("ul").children(items).into(), cx.store())
	}

	fn watched_paths(&self) -> Vec<Path> {
		vec![Path::parse("ids")]
	}
}

struct Item {
	drops: Rc<Cell<usize>>,
}
impl Component for Item {
	fn render(&mut self, cx: &Context<'_>) -> Result<NodeId, Error> {
		cx.create_element(&Template::element("li").text(cx.prop("label").to_display_string()).into(), &Value::Null)
	}
}
impl Drop for Item {
	fn drop(&mut self) {
		self.drops.set(self.drops.get() + 1)
	}
}

fn setup(ids: &[i32]) -> (Engine, Rc<Cell<usize>>, Rc<Cell<usize>>) {
	init_logging();
	let engine = Engine::new();
	engine.configure(Options::default(), Value::from_entries(vec![("ids", Value::from_items(ids.iter().copied().map(Value::from)))]));
	let constructions = Rc::new(Cell::new(0));
	let drops = Rc::new(Cell::new(0));
	engine.register_component("item-list", Definition::new(|_| List));
	{
		let (constructions, drops) = (constructions.clone(), drops.clone());
		engine.register_component(
			"list-item",
			Definition::new(move |_| {
				constructions.set(constructions.get() + 1);
				Item { drops: drops.clone() }
			}),
		);
	}
	mount(&engine, &["item-list"]);
	(engine, constructions, drops)
}

fn labels(engine: &Engine) -> Vec<String> {
	let document = engine.document();
	watcher_nodes(engine, "LIST-ITEM|").into_iter().map(|node| document.text_content(node)).collect()
}

#[test]
fn reorder_reuses_nodes() {
	let (engine, constructions, drops) = setup(&[1, 2, 3]);
	engine.start().unwrap();
	let before = watcher_nodes(&engine, "LIST-ITEM|");
	assert_eq!(before.len(), 3);

	engine.store().set("ids", Value::from_items(vec![Value::from(3), Value::from(1), Value::from(2)]));
	engine.render().unwrap();

	let after = watcher_nodes(&engine, "LIST-ITEM|");
	assert_eq!(after, vec![before[2], before[0], before[1]]);
	assert_eq!(labels(&engine), vec!["3", "1", "2"]);
	assert_eq!(
		engine.document().to_html(engine.root().unwrap()),
		r#"<div id="dom-state-root-element"><ul><li>3</li><li>1</li><li>2</li></ul></div>"#
	);
	assert_eq!((constructions.get(), drops.get()), (3, 0));
}

#[test]
fn removed_key_is_dropped() {
	let (engine, constructions, drops) = setup(&[1, 2, 3]);
	engine.start().unwrap();
	let before = watcher_nodes(&engine, "LIST-ITEM|");

	engine.store().get("ids").unwrap().remove("1");
	engine.render().unwrap();

	let identities: Vec<_> = engine.watchers().into_iter().map(|watcher| watcher.identity.to_string()).collect();
	assert_eq!(identities, vec!["ITEM-LIST", "LIST-ITEM|1", "LIST-ITEM|3"]);
	assert_eq!(watcher_nodes(&engine, "LIST-ITEM|"), vec![before[0], before[2]]);
	assert!(!engine.document().contains(before[1]));
	assert_eq!((constructions.get(), drops.get()), (3, 1));
}

#[test]
fn added_key_is_instantiated() {
	let (engine, constructions, _) = setup(&[1]);
	engine.start().unwrap();
	let first = watcher_nodes(&engine, "LIST-ITEM|")[0];

	engine.store().get("ids").unwrap().push(Value::from(7));
	engine.render().unwrap();

	let nodes = watcher_nodes(&engine, "LIST-ITEM|");
	assert_eq!(nodes[0], first);
	assert_eq!(labels(&engine), vec!["1", "7"]);
	assert_eq!(constructions.get(), 2);
}

#[test]
fn dropping_the_engine_drops_instances() {
	let (engine, _, drops) = setup(&[1, 2]);
	engine.start().unwrap();
	drop(engine);
	assert_eq!(drops.get(), 2);
}
