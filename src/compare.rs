//! The change detector: deep equality restricted to a set of watched paths.
//!
//! Given paths like `store.tasks` and `props.title`, only the `store` and `props` keys of the top-level bag are
//! looked at, below those only `tasks` and `title`, and below those everything.
//! Keys that lie outside every path are ignored entirely.
//!
//! Equality, in order:
//!
//! 1. two `NaN` numbers are equal,
//! 2. strictly identical values are equal,
//! 3. two dates, two regular expressions or two handlers compare by their canonical string form,
//! 4. otherwise both must be maps or both lists, compared key for key (restricted as above).
//!    Any difference in key presence or value kind is a change.
//!
//! A pair of composites that is revisited while it's still being compared (a cycle) is conservatively a change.

use crate::{
	temp_set::TempPairSet,
	value::{Path, Value},
};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{instrument, trace};

/// The watched paths, merged into a tree. A node without children means "compare everything below here".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTree(HashMap<String, PathTree>);
impl PathTree {
	pub fn build<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
		let mut tree = Self::default();
		for path in paths {
			path.segments().iter().fold(&mut tree, |node, segment| node.0.entry(segment.clone()).or_default());
		}
		tree
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// `None` means unrestricted.
	fn restriction(&self) -> Option<&Self> {
		if self.0.is_empty() {
			None
		} else {
			Some(self)
		}
	}

	fn child(&self, key: &str) -> Option<&Self> {
		self.0.get(key).and_then(Self::restriction)
	}
}

/// Outcome of [`detect`].
#[derive(Debug, Clone)]
pub struct Verdict {
	/// `true` means nothing watched has changed and rendering can be skipped.
	pub unchanged: bool,
	/// The snapshot to keep for the next comparison.
	/// This is `previous` itself if unchanged, otherwise a restricted structural copy of `new`.
	pub snapshot: Value,
}

/// Compares `new` against the `previous` snapshot along `paths`.
#[must_use]
pub fn detect(paths: &[Path], new: &Value, previous: &Value) -> Verdict {
	detect_with(paths, new, previous, &mut TempPairSet::new())
}

/// [`detect`] with a reusable visited-pair set.
#[instrument(skip(new, previous, visiting), fields(paths = paths.len()))]
pub(crate) fn detect_with(paths: &[Path], new: &Value, previous: &Value, visiting: &mut TempPairSet) -> Verdict {
	let tree = PathTree::build(paths);
	if equal(tree.restriction(), new, previous, visiting.temp()) {
		trace!("Unchanged.");
		Verdict {
			unchanged: true,
			snapshot: previous.clone(),
		}
	} else {
		trace!("Changed.");
		Verdict {
			unchanged: false,
			snapshot: restricted_clone(&tree, new),
		}
	}
}

fn address<T>(rc: &Rc<T>) -> usize {
	Rc::as_ptr(rc) as *const () as usize
}

fn equal(restriction: Option<&PathTree>, x: &Value, y: &Value, visiting: &mut HashSet<(usize, usize)>) -> bool {
	if let (Value::Number(a), Value::Number(b)) = (x, y) {
		if a.is_nan() && b.is_nan() {
			return true;
		}
	}

	if x.strict_eq(y) {
		return true;
	}

	match (x, y) {
		(Value::Date(_), Value::Date(_)) | (Value::Regex(_), Value::Regex(_)) | (Value::Handler(_), Value::Handler(_)) => x.canonical_form() == y.canonical_form(),
		(Value::Map(a), Value::Map(b)) => {
			let pair = (address(a), address(b));
			if !visiting.insert(pair) {
				return false;
			}
			let (a, b) = (a.borrow(), b.borrow());
			let keys: Vec<&str> = match restriction {
				Some(tree) => tree.0.keys().map(String::as_str).collect(),
				None => a.keys().chain(b.keys().filter(|key| !a.contains_key(*key))).map(String::as_str).collect(),
			};
			let result = keys.into_iter().all(|key| entries_equal(restriction, key, a.get(key), b.get(key), visiting));
			visiting.remove(&pair);
			result
		}
		(Value::List(a), Value::List(b)) => {
			let pair = (address(a), address(b));
			if !visiting.insert(pair) {
				return false;
			}
			let (a, b) = (a.borrow(), b.borrow());
			let result = match restriction {
				Some(tree) => tree.0.keys().all(|key| match key.parse::<usize>() {
					Ok(i) => entries_equal(restriction, key, a.get(i), b.get(i), visiting),
					// Not an index: absent on both sides.
					Err(_) => true,
				}),
				None => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| equal(None, x, y, visiting)),
			};
			visiting.remove(&pair);
			result
		}
		_ => false,
	}
}

fn entries_equal(restriction: Option<&PathTree>, key: &str, x: Option<&Value>, y: Option<&Value>, visiting: &mut HashSet<(usize, usize)>) -> bool {
	match (x, y) {
		(None, None) => true,
		(Some(x), Some(y)) => x.same_kind(y) && equal(restriction.and_then(|tree| tree.child(key)), x, y, visiting),
		_ => false,
	}
}

/// Deep copy of `value`, keeping only what `tree` restricts to (or everything, where it doesn't).
fn restricted_clone(tree: &PathTree, value: &Value) -> Value {
	if tree.is_empty() {
		return value.deep_clone();
	}
	match value {
		Value::Map(map) => {
			let map = map.borrow();
			Value::from_entries(tree.0.iter().filter_map(|(key, subtree)| map.get(key).map(|v| (key.clone(), restricted_clone(subtree, v)))).collect::<Vec<_>>())
		}
		Value::List(list) => {
			let list = list.borrow();
			// Unwatched positions are kept as `Null` placeholders, so watched indices and the length stay put.
			let mut copy = vec![Value::Null; list.len()];
			for (key, subtree) in &tree.0 {
				if let Ok(i) = key.parse::<usize>() {
					if let Some(item) = list.get(i) {
						copy[i] = restricted_clone(subtree, item);
					}
				}
			}
			Value::from_items(copy)
		}
		primitive => primitive.clone(),
	}
}
