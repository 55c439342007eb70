use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::rc::Rc;

use crate::error::{ReactiveError, TriggerError};
use crate::registry::{forget_addr, track, trigger};
use crate::value::has_changed;
use crate::{Key, Target, TrackOp, TriggerOp, Value};

/// How a [`Reactive`] handle intercepts access to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
	/// Plain access, invisible to the tracking core.
	Raw,
	Mutable,
	Readonly,
	ShallowMutable,
	ShallowReadonly,
}

impl Variant {
	pub fn is_readonly(self) -> bool {
		matches!(self, Variant::Readonly | Variant::ShallowReadonly)
	}

	pub fn is_shallow(self) -> bool {
		matches!(self, Variant::ShallowMutable | Variant::ShallowReadonly)
	}

	fn observed(self) -> bool {
		matches!(self, Variant::Mutable | Variant::ShallowMutable)
	}
}

/// Longest array a target may hold; longer lengths and indices at or past
/// it are rejected.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

enum Data {
	Object(BTreeMap<Key, Value>),
	Array(Vec<Value>),
}

pub struct TargetBody {
	data: RefCell<Data>,
	array: bool,
	skip: Cell<bool>,
}

impl Target for TargetBody {
	fn is_array(&self) -> bool {
		self.array
	}
}

impl Drop for TargetBody {
	fn drop(&mut self) {
		forget_addr(self as *const TargetBody as *const () as usize);
	}
}

impl TargetBody {
	fn new(data: Data) -> Rc<Self> {
		Rc::new(TargetBody {
			array: matches!(data, Data::Array(_)),
			data: RefCell::new(data),
			skip: Cell::new(false),
		})
	}

	fn read(&self, key: &Key) -> Value {
		match (&*self.data.borrow(), key) {
			(Data::Object(map), key) => map.get(key).cloned().unwrap_or_default(),
			(Data::Array(vec), Key::Index(index)) => vec.get(*index).cloned().unwrap_or_default(),
			(Data::Array(vec), Key::Length) => Value::from(vec.len()),
			(Data::Array(_), _) => Value::Undefined,
		}
	}

	fn contains(&self, key: &Key) -> bool {
		match (&*self.data.borrow(), key) {
			(Data::Object(map), key) => map.contains_key(key),
			(Data::Array(vec), Key::Index(index)) => *index < vec.len(),
			(Data::Array(_), Key::Length) => true,
			(Data::Array(_), _) => false,
		}
	}

	fn len(&self) -> usize {
		match &*self.data.borrow() {
			Data::Object(map) => map.len(),
			Data::Array(vec) => vec.len(),
		}
	}

	/// Stores `value` and returns whether the key existed, with the
	/// previous value.
	fn write(&self, key: &Key, value: Value) -> Result<(bool, Value), ReactiveError> {
		match (&mut *self.data.borrow_mut(), key) {
			(Data::Object(map), Key::Name(_) | Key::Index(_)) => {
				let old = map.insert(key.clone(), value);
				Ok((old.is_some(), old.unwrap_or_default()))
			}
			(Data::Array(_), Key::Index(index)) if *index >= MAX_ARRAY_LENGTH => {
				Err(ReactiveError::InvalidKey { key: key.clone() })
			}
			(Data::Array(vec), Key::Index(index)) => {
				let index = *index;
				let had_key = index < vec.len();
				if !had_key {
					vec.resize(index + 1, Value::Undefined);
				}
				let old = std::mem::replace(&mut vec[index], value);
				Ok((had_key, old))
			}
			_ => Err(ReactiveError::InvalidKey { key: key.clone() }),
		}
	}
}

/// A handle to an object or array target together with the variant that
/// decides whether reads are tracked and writes are triggered.
///
/// Handles are cheap to clone. Two handles over the same target are the
/// same object for [`Value::same_value`], whatever their variants.
#[derive(Clone)]
pub struct Reactive {
	target: Rc<TargetBody>,
	variant: Variant,
}

impl Reactive {
	/// An empty raw object.
	pub fn object() -> Self {
		Self::raw(Data::Object(BTreeMap::new()))
	}

	pub fn object_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<Key>,
		V: Into<Value>,
	{
		let map = entries
			.into_iter()
			.map(|(key, value)| (key.into(), value.into()))
			.collect();
		Self::raw(Data::Object(map))
	}

	pub fn array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
		Self::raw(Data::Array(items.into_iter().map(Into::into).collect()))
	}

	fn raw(data: Data) -> Self {
		Reactive {
			target: TargetBody::new(data),
			variant: Variant::Raw,
		}
	}

	fn with_variant(&self, variant: Variant) -> Self {
		if self.target.skip.get() {
			return self.to_raw();
		}

		Reactive {
			target: self.target.clone(),
			variant,
		}
	}

	/// Deep mutable wrapper. Any existing wrapper is returned unchanged.
	pub fn reactive(&self) -> Self {
		if self.is_proxy() {
			return self.clone();
		}
		self.with_variant(Variant::Mutable)
	}

	pub fn shallow_reactive(&self) -> Self {
		if self.is_proxy() {
			return self.clone();
		}
		self.with_variant(Variant::ShallowMutable)
	}

	pub fn readonly(&self) -> Self {
		if self.is_readonly() {
			return self.clone();
		}
		self.with_variant(Variant::Readonly)
	}

	pub fn shallow_readonly(&self) -> Self {
		if self.is_readonly() {
			return self.clone();
		}
		self.with_variant(Variant::ShallowReadonly)
	}

	/// Excludes the target from wrapping from now on.
	pub fn mark_raw(self) -> Self {
		self.target.skip.set(true);
		self.to_raw()
	}

	pub fn to_raw(&self) -> Self {
		Reactive {
			target: self.target.clone(),
			variant: Variant::Raw,
		}
	}

	pub fn variant(&self) -> Variant {
		self.variant
	}

	pub fn is_reactive(&self) -> bool {
		self.variant.observed()
	}

	pub fn is_readonly(&self) -> bool {
		self.variant.is_readonly()
	}

	pub fn is_shallow(&self) -> bool {
		self.variant.is_shallow()
	}

	pub fn is_proxy(&self) -> bool {
		self.variant != Variant::Raw
	}

	pub fn is_array(&self) -> bool {
		self.target.array
	}

	pub fn same_target(&self, other: &Reactive) -> bool {
		Rc::ptr_eq(&self.target, &other.target)
	}

	/// Shared target, for use with [`crate::track`] and [`crate::trigger`].
	pub fn target(&self) -> &Rc<TargetBody> {
		&self.target
	}

	fn observe(&self, op: TrackOp, key: Key) {
		if self.variant.observed() {
			track(&self.target, op, key);
		}
	}

	fn notify(
		&self,
		op: TriggerOp,
		key: Option<&Key>,
		value: Option<&Value>,
		old: Option<&Value>,
	) -> Result<(), TriggerError> {
		if !self.variant.observed() {
			return Ok(());
		}
		trigger(&self.target, op, key, value, old)
	}

	fn check_writable(&self, key: &Key) -> Result<(), ReactiveError> {
		if self.variant.is_readonly() {
			tracing::warn!(%key, "write rejected: target is readonly");
			return Err(ReactiveError::Readonly { key: key.clone() });
		}
		Ok(())
	}

	fn wrap(&self, value: Value) -> Value {
		if self.variant.is_shallow() || self.variant == Variant::Raw {
			return value;
		}

		match value {
			Value::Object(object) if self.variant.is_readonly() => Value::Object(object.readonly()),
			Value::Object(object) => Value::Object(object.reactive()),
			other => other,
		}
	}

	fn key(&self, key: impl Into<Key>) -> Key {
		let key = key.into();
		if self.target.array {
			key.for_array()
		} else {
			key
		}
	}

	pub fn get(&self, key: impl Into<Key>) -> Value {
		let key = self.key(key);
		let value = self.target.read(&key);
		self.observe(TrackOp::Get, key);
		self.wrap(value)
	}

	pub fn has(&self, key: impl Into<Key>) -> bool {
		let key = self.key(key);
		let has = self.target.contains(&key);
		self.observe(TrackOp::Has, key);
		has
	}

	/// Own keys; arrays yield their indices. Depends on the set of keys,
	/// not on any value.
	pub fn keys(&self) -> Vec<Key> {
		let keys = match &*self.target.data.borrow() {
			Data::Object(map) => map.keys().cloned().collect(),
			Data::Array(vec) => (0..vec.len()).map(Key::Index).collect(),
		};

		let key = if self.target.array { Key::Length } else { Key::Iterate };
		self.observe(TrackOp::Iterate, key);
		keys
	}

	pub fn len(&self) -> usize {
		let len = self.target.len();
		if self.target.array {
			self.observe(TrackOp::Get, Key::Length);
		} else {
			self.observe(TrackOp::Iterate, Key::Iterate);
		}
		len
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ReactiveError> {
		let key = self.key(key);
		let mut value = value.into();
		self.check_writable(&key)?;

		if key == Key::Length && self.target.array {
			let len = value.as_length().ok_or(ReactiveError::InvalidLength)?;
			return self.set_len(len);
		}

		if !self.variant.is_shallow() {
			value = value.into_raw();
		}

		let (had_key, old) = self.target.write(&key, value.clone())?;
		if !had_key {
			self.notify(TriggerOp::Add, Some(&key), Some(&value), None)?;
		} else if has_changed(&value, &old) {
			self.notify(TriggerOp::Set, Some(&key), Some(&value), Some(&old))?;
		}

		Ok(())
	}

	pub fn set_len(&self, len: usize) -> Result<(), ReactiveError> {
		self.check_writable(&Key::Length)?;
		if len > MAX_ARRAY_LENGTH {
			return Err(ReactiveError::InvalidLength);
		}

		let old_len = match &mut *self.target.data.borrow_mut() {
			Data::Array(vec) => {
				let old_len = vec.len();
				vec.resize(len, Value::Undefined);
				old_len
			}
			Data::Object(_) => return Err(ReactiveError::NotAnArray),
		};

		if old_len != len {
			self.notify(
				TriggerOp::Set,
				Some(&Key::Length),
				Some(&Value::from(len)),
				Some(&Value::from(old_len)),
			)?;
		}

		Ok(())
	}

	/// Removes `key`; on arrays the slot is left `Undefined`. Returns
	/// whether the key was present.
	pub fn delete(&self, key: impl Into<Key>) -> Result<bool, ReactiveError> {
		let key = self.key(key);
		self.check_writable(&key)?;

		let old = match (&mut *self.target.data.borrow_mut(), &key) {
			(Data::Object(map), _) => map.remove(&key),
			(Data::Array(vec), Key::Index(index)) => vec.get_mut(*index).map(std::mem::take),
			(Data::Array(_), _) => return Err(ReactiveError::InvalidKey { key: key.clone() }),
		};

		let Some(old) = old else {
			return Ok(false);
		};

		self.notify(TriggerOp::Delete, Some(&key), None, Some(&old))?;
		Ok(true)
	}

	pub fn push(&self, value: impl Into<Value>) -> Result<(), ReactiveError> {
		if !self.target.array {
			return Err(ReactiveError::NotAnArray);
		}

		let len = self.target.len();
		self.set(Key::Index(len), value)
	}

	pub fn pop(&self) -> Result<Option<Value>, ReactiveError> {
		self.check_writable(&Key::Length)?;

		let (old, len) = match &mut *self.target.data.borrow_mut() {
			Data::Array(vec) => (vec.pop(), vec.len()),
			Data::Object(_) => return Err(ReactiveError::NotAnArray),
		};

		let Some(old) = old else {
			return Ok(None);
		};

		let deleted = self.notify(TriggerOp::Delete, Some(&Key::Index(len)), None, Some(&old));
		let resized = self.notify(
			TriggerOp::Set,
			Some(&Key::Length),
			Some(&Value::from(len)),
			Some(&Value::from(len + 1)),
		);
		TriggerError::merge(deleted, resized)?;

		Ok(Some(self.wrap(old)))
	}

	pub fn clear(&self) -> Result<(), ReactiveError> {
		self.check_writable(&Key::Iterate)?;

		let had_entries = match &mut *self.target.data.borrow_mut() {
			Data::Object(map) => {
				let had_entries = !map.is_empty();
				map.clear();
				had_entries
			}
			Data::Array(vec) => {
				let had_entries = !vec.is_empty();
				vec.clear();
				had_entries
			}
		};

		if had_entries {
			self.notify(TriggerOp::Clear, None, None, None)?;
		}

		Ok(())
	}
}

impl Debug for Reactive {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut debug = f.debug_struct("Reactive");
		debug.field("variant", &self.variant);
		match self.target.data.try_borrow() {
			Ok(data) => match &*data {
				Data::Object(map) => debug.field("object", &map.keys().collect::<Vec<_>>()),
				Data::Array(vec) => debug.field("len", &vec.len()),
			},
			Err(_) => debug.field("data", &"<borrowed>"),
		};
		debug.finish()
	}
}

/// Deep mutable wrapper over an object value. Primitives are returned
/// unchanged.
pub fn reactive(value: &Value) -> Value {
	wrap_value(value, "reactive", Reactive::reactive)
}

pub fn readonly(value: &Value) -> Value {
	wrap_value(value, "readonly", Reactive::readonly)
}

pub fn shallow_reactive(value: &Value) -> Value {
	wrap_value(value, "shallow_reactive", Reactive::shallow_reactive)
}

pub fn shallow_readonly(value: &Value) -> Value {
	wrap_value(value, "shallow_readonly", Reactive::shallow_readonly)
}

fn wrap_value(value: &Value, kind: &'static str, func: fn(&Reactive) -> Reactive) -> Value {
	match value {
		Value::Object(object) => Value::Object(func(object)),
		other => {
			tracing::warn!(?other, kind, "value cannot be made reactive");
			other.clone()
		}
	}
}
