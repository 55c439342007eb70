use std::fmt::Debug;
use std::rc::Rc;

use crate::Reactive;

/// Dynamic value stored in reactive targets.
#[derive(Clone, Default)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	Str(Rc<str>),
	Object(Reactive),
}

impl Value {
	/// Same-value comparison: `NaN` equals itself, `+0` and `-0` differ,
	/// objects compare by target identity.
	pub fn same_value(&self, other: &Value) -> bool {
		match (self, other) {
			(Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => same_number(*a, *b),
			(Value::Str(a), Value::Str(b)) => a == b,
			(Value::Object(a), Value::Object(b)) => a.same_target(b),
			_ => false,
		}
	}

	pub fn as_number(&self) -> Option<f64> {
		match self {
			Value::Number(number) => Some(*number),
			_ => None,
		}
	}

	/// The value as an array length, if it is a non-negative integer.
	pub fn as_length(&self) -> Option<usize> {
		match self {
			Value::Number(number) if *number >= 0.0 && number.fract() == 0.0 && number.is_finite() => {
				Some(*number as usize)
			}
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(value) => Some(value.as_ref()),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Reactive> {
		match self {
			Value::Object(object) => Some(object),
			_ => None,
		}
	}

	pub fn is_object(&self) -> bool {
		matches!(self, Value::Object(_))
	}

	pub(crate) fn into_raw(self) -> Value {
		match self {
			Value::Object(object) => Value::Object(object.to_raw()),
			other => other,
		}
	}
}

fn same_number(a: f64, b: f64) -> bool {
	if a.is_nan() {
		return b.is_nan();
	}

	a.to_bits() == b.to_bits()
}

/// Whether a write of `value` over `old` is observable.
pub fn has_changed(value: &Value, old: &Value) -> bool {
	!value.same_value(old)
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.same_value(other)
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Undefined => f.write_str("undefined"),
			Value::Null => f.write_str("null"),
			Value::Bool(value) => value.fmt(f),
			Value::Number(value) => value.fmt(f),
			Value::Str(value) => value.fmt(f),
			Value::Object(object) => object.fmt(f),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Number(value.into())
	}
}

impl From<usize> for Value {
	fn from(value: usize) -> Self {
		Value::Number(value as f64)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Str(Rc::from(value))
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Str(Rc::from(value))
	}
}

impl From<Reactive> for Value {
	fn from(value: Reactive) -> Self {
		Value::Object(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nan_is_unchanged() {
		assert!(!has_changed(&Value::from(f64::NAN), &Value::from(f64::NAN)));
		assert!(!has_changed(&Value::from(f64::NAN), &Value::from(-f64::NAN)));
	}

	#[test]
	fn signed_zeroes_differ() {
		assert!(has_changed(&Value::from(0.0), &Value::from(-0.0)));
		assert!(!has_changed(&Value::from(0.0), &Value::from(0)));
	}

	#[test]
	fn primitives_of_different_kinds_differ() {
		assert!(has_changed(&Value::from(1), &Value::from("1")));
		assert!(has_changed(&Value::Undefined, &Value::Null));
		assert!(!has_changed(&Value::from("a"), &Value::from(String::from("a"))));
	}

	#[test]
	fn objects_compare_by_identity() {
		let a = Reactive::object();
		let b = Reactive::object();

		assert!(!has_changed(&Value::from(a.clone()), &Value::from(a.reactive())));
		assert!(has_changed(&Value::from(a), &Value::from(b)));
	}

	#[test]
	fn length_requires_non_negative_integer() {
		assert_eq!(Value::from(3).as_length(), Some(3));
		assert_eq!(Value::from(1.5).as_length(), None);
		assert_eq!(Value::from(-1).as_length(), None);
		assert_eq!(Value::from(f64::INFINITY).as_length(), None);
	}
}
