use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::effect::EffectId;
use crate::Subscriber;

pub(crate) struct Context {
	pub(crate) should_track: Cell<bool>,
	track_stack: RefCell<Vec<bool>>,
	pub(crate) active: RefCell<Option<Rc<dyn Subscriber>>>,
	pub(crate) depth: Cell<u32>,
}

impl Context {
	fn new() -> Self {
		Context {
			should_track: Cell::new(true),
			track_stack: RefCell::new(Vec::new()),
			active: RefCell::new(None),
			depth: Cell::new(0),
		}
	}

	fn push(&self, should_track: bool) {
		self.track_stack.borrow_mut().push(self.should_track.get());
		self.should_track.set(should_track);
	}

	fn pop(&self) {
		let last = self.track_stack.borrow_mut().pop();
		self.should_track.set(last.unwrap_or(true));
	}

	/// The running effect, if reads should currently be recorded against it.
	pub(crate) fn tracking_effect(&self) -> Option<Rc<dyn Subscriber>> {
		if !self.should_track.get() {
			return None;
		}

		self.active.borrow().clone()
	}
}

thread_local! {
	static CONTEXT: Context = Context::new();
}

pub(crate) fn with_context<R>(func: impl FnOnce(&Context) -> R) -> R {
	CONTEXT.with(func)
}

/// Suspends dependency collection until the matching [`reset_tracking`].
pub fn pause_tracking() {
	with_context(|cx| cx.push(false))
}

pub fn enable_tracking() {
	with_context(|cx| cx.push(true))
}

/// Restores the tracking flag saved by the last
/// [`pause_tracking`] or [`enable_tracking`].
pub fn reset_tracking() {
	with_context(|cx| cx.pop())
}

pub fn is_tracking() -> bool {
	with_context(|cx| cx.should_track.get() && cx.active.borrow().is_some())
}

pub fn active_effect() -> Option<EffectId> {
	with_context(|cx| cx.active.borrow().as_ref().map(|effect| effect.core().id()))
}

/// Scoped tracking override. Dropping the guard restores the flag and
/// the suspension stack to what they were when it was acquired, even if
/// the scope unwinds or calls to [`pause_tracking`] inside it were left
/// unbalanced.
#[must_use]
pub struct TrackingGuard {
	saved: bool,
	height: usize,
}

impl TrackingGuard {
	pub fn pause() -> Self {
		Self::acquire(false)
	}

	pub fn enable() -> Self {
		Self::acquire(true)
	}

	fn acquire(should_track: bool) -> Self {
		with_context(|cx| {
			let guard = TrackingGuard {
				saved: cx.should_track.get(),
				height: cx.track_stack.borrow().len(),
			};
			cx.push(should_track);
			guard
		})
	}
}

impl Drop for TrackingGuard {
	fn drop(&mut self) {
		let _ = CONTEXT.try_with(|cx| {
			cx.track_stack.borrow_mut().truncate(self.height);
			cx.should_track.set(self.saved);
		});
	}
}

/// Runs `func` without recording any of its reads.
pub fn untracked<R>(func: impl FnOnce() -> R) -> R {
	let _guard = TrackingGuard::pause();
	func()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn suspension_nests() {
		assert!(with_context(|cx| cx.should_track.get()));

		pause_tracking();
		enable_tracking();
		assert!(with_context(|cx| cx.should_track.get()));
		reset_tracking();
		assert!(!with_context(|cx| cx.should_track.get()));
		reset_tracking();

		assert!(with_context(|cx| cx.should_track.get()));
	}

	#[test]
	fn guard_restores_unbalanced_scope() {
		{
			let _guard = TrackingGuard::pause();
			pause_tracking();
			pause_tracking();
		}

		assert!(with_context(|cx| cx.should_track.get()));
		assert_eq!(with_context(|cx| cx.track_stack.borrow().len()), 0);
	}

	#[test]
	fn guard_restores_on_unwind() {
		let result = std::panic::catch_unwind(|| {
			untracked(|| panic!("boom"));
		});

		assert!(result.is_err());
		assert!(with_context(|cx| cx.should_track.get()));
	}
}
