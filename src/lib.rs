pub mod macros;

mod addr;
mod context;
mod dependencies;
mod effect;
mod error;
mod key;
mod reactive;
mod registry;
mod value;

use std::any::Any;

pub use context::{
	active_effect, enable_tracking, is_tracking, pause_tracking, reset_tracking, untracked,
	TrackingGuard,
};
pub use dependencies::Dep;
pub use effect::{effect, effect_with, stop, Effect, EffectId, EffectOptions};
pub use error::{EffectFailure, ReactiveError, TriggerError};
pub use key::{Key, TrackOp, TriggerOp};
pub use reactive::{
	reactive, readonly, shallow_reactive, shallow_readonly, Reactive, TargetBody, Variant,
	MAX_ARRAY_LENGTH,
};
pub use registry::{dep_for, forget, track, trigger};
pub use value::{has_changed, Value};

/// Deepest effect nesting that still gets its own marker bit. Runs
/// nested deeper fall back to relinking their dependencies from scratch.
pub const MAX_MARKER_BITS: u32 = 30;

/// Anything whose reads and writes are reported through [`track`] and
/// [`trigger`].
pub trait Target: Any {
	/// Array-like targets get `Length` handling on writes.
	fn is_array(&self) -> bool {
		false
	}
}

pub(crate) trait Subscriber: 'static {
	fn core(&self) -> &effect::EffectCore;

	/// Called by [`trigger`] when something this subscriber read changed.
	fn rerun(&self);
}
