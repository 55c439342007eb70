use std::fmt;
use std::rc::Rc;

/// Identifies one slot of a tracked object.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
	Name(Rc<str>),
	Index(usize),
	/// Size of an array-like target.
	Length,
	/// Whole-target iteration.
	Iterate,
}

impl Key {
	pub fn name(name: &str) -> Self {
		Key::Name(Rc::from(name))
	}

	pub fn as_index(&self) -> Option<usize> {
		match self {
			Key::Index(index) => Some(*index),
			_ => None,
		}
	}

	/// Spells array keys canonically: `"length"` is [`Key::Length`] and a
	/// name like `"2"` is [`Key::Index`]. Other keys are returned as is.
	pub fn for_array(self) -> Key {
		let index = match &self {
			Key::Name(name) if &**name == "length" => return Key::Length,
			Key::Name(name) => name
				.parse::<usize>()
				.ok()
				.filter(|index| index.to_string() == **name),
			_ => None,
		};

		index.map_or(self, Key::Index)
	}
}

impl From<&str> for Key {
	fn from(name: &str) -> Self {
		Key::name(name)
	}
}

impl From<usize> for Key {
	fn from(index: usize) -> Self {
		Key::Index(index)
	}
}

impl fmt::Debug for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Key::Name(name) => write!(f, "{:?}", name),
			Key::Index(index) => write!(f, "[{}]", index),
			Key::Length => f.write_str("length"),
			Key::Iterate => f.write_str("<iterate>"),
		}
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Key::Name(name) => f.write_str(name),
			other => fmt::Debug::fmt(other, f),
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TrackOp {
	Get,
	Has,
	Iterate,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TriggerOp {
	Set,
	Add,
	Delete,
	Clear,
}
