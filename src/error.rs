use std::any::Any;

use thiserror::Error;

use crate::{EffectId, Key};

#[derive(Debug, Error)]
pub enum ReactiveError {
	#[error("write to key `{key}` failed: target is readonly")]
	Readonly { key: Key },
	#[error("target is not an array")]
	NotAnArray,
	#[error("key `{key}` is not valid for this target")]
	InvalidKey { key: Key },
	#[error("length must be a non-negative integer")]
	InvalidLength,
	/// The write was applied, but some of its dependents panicked.
	#[error(transparent)]
	Effects(#[from] TriggerError),
}

#[derive(Debug, Error)]
#[error("{} effect(s) failed while handling a trigger", .failures.len())]
pub struct TriggerError {
	pub failures: Vec<EffectFailure>,
}

impl TriggerError {
	pub(crate) fn merge(
		first: Result<(), TriggerError>,
		second: Result<(), TriggerError>,
	) -> Result<(), TriggerError> {
		match (first, second) {
			(Ok(()), Ok(())) => Ok(()),
			(Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
			(Err(mut first), Err(second)) => {
				first.failures.extend(second.failures);
				Err(first)
			}
		}
	}
}

#[derive(Debug, Clone)]
pub struct EffectFailure {
	pub effect: EffectId,
	pub name: &'static str,
	pub message: String,
}

impl EffectFailure {
	pub(crate) fn new(effect: EffectId, name: &'static str, payload: Box<dyn Any + Send>) -> Self {
		let message = if let Some(message) = payload.downcast_ref::<&str>() {
			message.to_string()
		} else if let Some(message) = payload.downcast_ref::<String>() {
			message.clone()
		} else {
			"<non-string panic payload>".to_string()
		};

		EffectFailure {
			effect,
			name,
			message,
		}
	}
}
