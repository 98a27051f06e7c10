//! Dynamic values shared by the Store, component props, factories and template bindings.
//!
//! Composites ([`Value::List`] and [`Value::Map`]) are shared and interior-mutable,
//! so a handler can change the Store in place and every holder of the same composite observes it.
//! Cloning a [`Value`] is therefore shallow. Use [`Value::deep_clone`] for an independent copy.

use crate::dom::Event;
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
	mem,
	str::FromStr,
};
use hashbrown::{HashMap, HashSet};
use num_traits::{Float, ToPrimitive};
use std::rc::Rc;

pub type Map = HashMap<String, Value>;
pub type List = Vec<Value>;

#[derive(Clone)]
pub enum Value {
	/// Absent, `undefined` or `null`.
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	/// Milliseconds since the Unix epoch.
	Date(i64),
	/// Regular expression source. Never evaluated.
	Regex(Rc<str>),
	List(Rc<RefCell<List>>),
	Map(Rc<RefCell<Map>>),
	Handler(Handler),
}

impl Default for Value {
	fn default() -> Self {
		Self::Null
	}
}

/// A named event callback.
///
/// The name is the handler's canonical form: two handlers with the same name compare equal during change detection,
/// which lets a component hand out freshly created closures on every render without being considered changed.
#[derive(Clone)]
pub struct Handler {
	name: Rc<str>,
	callback: Rc<dyn Fn(&Event)>,
}
impl Handler {
	pub fn new(name: impl Into<Rc<str>>, callback: impl 'static + Fn(&Event)) -> Self {
		Self {
			name: name.into(),
			callback: Rc::new(callback),
		}
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn call(&self, event: &Event) {
		(self.callback)(event)
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.callback, &other.callback)
	}
}
impl Debug for Handler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Handler").field(&self.name).finish()
	}
}

impl Value {
	#[must_use]
	pub fn map() -> Self {
		Self::Map(Rc::new(RefCell::new(Map::new())))
	}

	#[must_use]
	pub fn list() -> Self {
		Self::List(Rc::new(RefCell::new(List::new())))
	}

	pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
		Self::Map(Rc::new(RefCell::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())))
	}

	pub fn from_items(items: impl IntoIterator<Item = Value>) -> Self {
		Self::List(Rc::new(RefCell::new(items.into_iter().collect())))
	}

	/// Any primitive number. Values without an `f64` representation become `NaN`.
	pub fn number<N: ToPrimitive>(n: N) -> Self {
		Self::Number(n.to_f64().unwrap_or_else(f64::nan))
	}

	pub fn string(s: impl Into<Rc<str>>) -> Self {
		Self::String(s.into())
	}

	#[must_use]
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	#[must_use]
	pub fn is_composite(&self) -> bool {
		matches!(self, Self::List(_) | Self::Map(_))
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match *self {
			Self::Bool(b) => Some(b),
			_ => None,
		}
	}

	/// Numeric coercion: numbers as-is, booleans as 0/1, numeric strings parsed, everything else `NaN`.
	#[must_use]
	pub fn to_number(&self) -> f64 {
		match self {
			Self::Number(n) => *n,
			Self::Bool(b) => f64::from(u8::from(*b)),
			Self::Null => 0.0,
			Self::Date(millis) => millis.to_f64().unwrap_or_else(f64::nan),
			Self::String(s) => {
				let trimmed = s.trim();
				if trimmed.is_empty() {
					0.0
				} else {
					f64::from_str(trimmed).unwrap_or_else(|_| f64::nan())
				}
			}
			Self::Regex(_) | Self::List(_) | Self::Map(_) | Self::Handler(_) => f64::nan(),
		}
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_handler(&self) -> Option<&Handler> {
		match self {
			Self::Handler(handler) => Some(handler),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_map(&self) -> Option<&Rc<RefCell<Map>>> {
		match self {
			Self::Map(map) => Some(map),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_list(&self) -> Option<&Rc<RefCell<List>>> {
		match self {
			Self::List(list) => Some(list),
			_ => None,
		}
	}

	/// Looks up a map key or (decimal) list index.
	#[must_use]
	pub fn get(&self, key: &str) -> Option<Value> {
		match self {
			Self::Map(map) => map.borrow().get(key).cloned(),
			Self::List(list) => key.parse::<usize>().ok().and_then(|i| list.borrow().get(i).cloned()),
			_ => None,
		}
	}

	/// Sets a map key or overwrites an existing list index in place.
	///
	/// Returns `false` if `self` can't hold `key`.
	pub fn set(&self, key: impl Into<String>, value: Value) -> bool {
		let key: String = key.into();
		match self {
			Self::Map(map) => {
				map.borrow_mut().insert(key, value);
				true
			}
			Self::List(list) => match key.parse::<usize>() {
				Ok(i) => match list.borrow_mut().get_mut(i) {
					Some(slot) => {
						*slot = value;
						true
					}
					None => false,
				},
				Err(_) => false,
			},
			_ => false,
		}
	}

	pub fn remove(&self, key: &str) -> Option<Value> {
		match self {
			Self::Map(map) => map.borrow_mut().remove(key),
			Self::List(list) => {
				let i = key.parse::<usize>().ok()?;
				let mut list = list.borrow_mut();
				if i < list.len() {
					Some(list.remove(i))
				} else {
					None
				}
			}
			_ => None,
		}
	}

	/// Appends to a list. Returns `false` for anything else.
	pub fn push(&self, value: Value) -> bool {
		match self {
			Self::List(list) => {
				list.borrow_mut().push(value);
				true
			}
			_ => false,
		}
	}

	/// Entry count of a composite, `0` otherwise.
	#[must_use]
	pub fn len(&self) -> usize {
		match self {
			Self::List(list) => list.borrow().len(),
			Self::Map(map) => map.borrow().len(),
			_ => 0,
		}
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Keys of a map, or indices of a list, as strings.
	#[must_use]
	pub fn keys(&self) -> Vec<String> {
		match self {
			Self::Map(map) => map.borrow().keys().cloned().collect(),
			Self::List(list) => (0..list.borrow().len()).map(|i| i.to_string()).collect(),
			_ => Vec::new(),
		}
	}

	/// Same primitive value, or same composite/callback instance.
	#[must_use]
	pub fn strict_eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			#[allow(clippy::float_cmp)]
			(Self::Number(a), Self::Number(b)) => a == b,
			(Self::String(a), Self::String(b)) => a == b,
			(Self::Date(a), Self::Date(b)) => a == b,
			(Self::Regex(a), Self::Regex(b)) => Rc::ptr_eq(a, b),
			(Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
			(Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b),
			(Self::Handler(a), Self::Handler(b)) => a.ptr_eq(b),
			_ => false,
		}
	}

	/// Whether `self` and `other` are the same variant.
	#[must_use]
	pub fn same_kind(&self, other: &Self) -> bool {
		mem::discriminant(self) == mem::discriminant(other)
	}

	/// String form of the "boxed" kinds (dates, regular expressions and handlers).
	#[must_use]
	pub fn canonical_form(&self) -> Option<String> {
		match self {
			Self::Date(millis) => Some(millis.to_string()),
			Self::Regex(source) => Some(format!("/{}/", source)),
			Self::Handler(handler) => Some(handler.name().to_string()),
			_ => None,
		}
	}

	/// Text as it would appear in an attribute or an identity key.
	#[must_use]
	pub fn to_display_string(&self) -> String {
		match self {
			Self::Null => String::new(),
			Self::Bool(b) => b.to_string(),
			Self::Number(n) => format_number(*n),
			Self::String(s) => s.to_string(),
			Self::List(list) => list.borrow().iter().map(Value::to_display_string).collect::<Vec<_>>().join(","),
			Self::Map(_) => "[object Object]".to_string(),
			Self::Date(_) | Self::Regex(_) | Self::Handler(_) => self.canonical_form().unwrap_or_default(),
		}
	}

	/// A structurally independent copy.
	///
	/// Back-edges of cyclic structures are replaced with [`Value::Null`].
	#[must_use]
	pub fn deep_clone(&self) -> Self {
		self.deep_clone_guarded(&mut HashSet::new())
	}

	fn deep_clone_guarded(&self, visiting: &mut HashSet<usize>) -> Self {
		match self {
			Self::List(list) => {
				let key = Rc::as_ptr(list) as *const () as usize;
				if !visiting.insert(key) {
					return Self::Null;
				}
				let copy = Self::from_items(list.borrow().iter().map(|item| item.deep_clone_guarded(visiting)).collect::<Vec<_>>());
				visiting.remove(&key);
				copy
			}
			Self::Map(map) => {
				let key = Rc::as_ptr(map) as *const () as usize;
				if !visiting.insert(key) {
					return Self::Null;
				}
				let copy = Self::from_entries(map.borrow().iter().map(|(k, v)| (k.clone(), v.deep_clone_guarded(visiting))).collect::<Vec<_>>());
				visiting.remove(&key);
				copy
			}
			primitive => primitive.clone(),
		}
	}
}

fn format_number(n: f64) -> String {
	if n.is_nan() {
		"NaN".to_string()
	} else if n.is_infinite() {
		let infinity = if n.is_sign_positive() { "Infinity" } else { "-Infinity" };
		infinity.to_string()
	} else if n.fract() == 0.0 && n.abs() < 1e15 {
		n.to_i64().map_or_else(|| n.to_string(), |i| i.to_string())
	} else {
		n.to_string()
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		// Composites may be cyclic, so nesting is cut off rather than followed.
		fmt_limited(self, f, 4)
	}
}

fn fmt_limited(value: &Value, f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
	match value {
		Value::Null => f.write_str("Null"),
		Value::Bool(b) => write!(f, "{:?}", b),
		Value::Number(n) => f.write_str(&format_number(*n)),
		Value::String(s) => write!(f, "{:?}", s),
		Value::Date(millis) => write!(f, "Date({})", millis),
		Value::Regex(source) => write!(f, "/{}/", source),
		Value::Handler(handler) => write!(f, "{:?}", handler),
		Value::List(_) | Value::Map(_) if depth == 0 => f.write_str("…"),
		Value::List(list) => {
			f.write_str("[")?;
			for (i, item) in list.borrow().iter().enumerate() {
				if i > 0 {
					f.write_str(", ")?;
				}
				fmt_limited(item, f, depth - 1)?;
			}
			f.write_str("]")
		}
		Value::Map(map) => {
			let map = map.borrow();
			let mut keys: Vec<&String> = map.keys().collect();
			keys.sort();
			f.write_str("{")?;
			for (i, key) in keys.into_iter().enumerate() {
				if i > 0 {
					f.write_str(", ")?;
				}
				write!(f, "{}: ", key)?;
				fmt_limited(&map[key], f, depth - 1)?;
			}
			f.write_str("}")
		}
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}
impl From<f64> for Value {
	fn from(n: f64) -> Self {
		Self::Number(n)
	}
}
impl From<i32> for Value {
	fn from(n: i32) -> Self {
		Self::Number(f64::from(n))
	}
}
impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::String(s.into())
	}
}
impl From<String> for Value {
	fn from(s: String) -> Self {
		Self::String(s.into())
	}
}
impl From<Handler> for Value {
	fn from(handler: Handler) -> Self {
		Self::Handler(handler)
	}
}

/// A dotted reference into a [`Value`], like `store.tasks.0.done`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<String>);
impl Path {
	/// Splits `a.b.c` into its segments. The empty string is the empty path.
	#[must_use]
	pub fn parse(dotted: &str) -> Self {
		let dotted = dotted.trim();
		if dotted.is_empty() {
			Self(Vec::new())
		} else {
			Self(dotted.split('.').map(|segment| segment.trim().to_string()).collect())
		}
	}

	/// Extracts the first `{{path}}` reference from an attribute value.
	#[must_use]
	pub fn reference(attribute_value: &str) -> Option<Self> {
		let start = attribute_value.find("{{")? + 2;
		let end = attribute_value[start..].find("}}")? + start;
		Some(Self::parse(&attribute_value[start..end]))
	}

	pub fn from_segments<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
		Self(segments.into_iter().map(Into::into).collect())
	}

	#[must_use]
	pub fn segments(&self) -> &[String] {
		&self.0
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// `head` followed by this path's segments.
	#[must_use]
	pub fn prefixed(&self, head: &str) -> Self {
		let mut segments = Vec::with_capacity(self.0.len() + 1);
		segments.push(head.to_string());
		segments.extend(self.0.iter().cloned());
		Self(segments)
	}
}
impl From<&str> for Path {
	fn from(dotted: &str) -> Self {
		Self::parse(dotted)
	}
}
impl fmt::Display for Path {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0.join("."))
	}
}

/// Resolves `path` against `bag`. The empty path resolves to `bag` itself.
#[must_use]
pub fn get(bag: &Value, path: &Path) -> Option<Value> {
	path.segments().iter().try_fold(bag.clone(), |current, segment| current.get(segment))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reference_takes_first_placeholder() {
		assert_eq!(Path::reference("{{a.b}} and {{c}}"), Some(Path::parse("a.b")));
		assert_eq!(Path::reference("{{ spaced }}"), Some(Path::parse("spaced")));
		assert_eq!(Path::reference("plain"), None);
		assert_eq!(Path::reference("{{unterminated"), None);
	}

	#[test]
	fn get_walks_maps_and_lists() {
		let bag = Value::from_entries(vec![("tasks", Value::from_items(vec![Value::from_entries(vec![("title", Value::from("A"))])]))]);
		let title = get(&bag, &Path::parse("tasks.0.title")).unwrap();
		assert_eq!(title.as_str(), Some("A"));
		assert!(get(&bag, &Path::parse("tasks.1.title")).is_none());
		assert!(get(&bag, &Path::parse("missing")).is_none());
		assert!(get(&bag, &Path::default()).unwrap().strict_eq(&bag));
	}

	#[test]
	fn deep_clone_breaks_cycles() {
		let outer = Value::map();
		outer.set("self", outer.clone());
		outer.set("n", Value::from(1));
		let copy = outer.deep_clone();
		assert!(!copy.strict_eq(&outer));
		assert!(copy.get("self").unwrap().is_null());
		assert_eq!(copy.get("n").unwrap().to_number(), 1.0);
	}

	#[test]
	fn display_strings() {
		assert_eq!(Value::from(3).to_display_string(), "3");
		assert_eq!(Value::from(2.5).to_display_string(), "2.5");
		assert_eq!(Value::Null.to_display_string(), "");
		assert_eq!(Value::number(7_u8).to_display_string(), "7");
	}
}
