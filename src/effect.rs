use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Display};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::with_context;
use crate::dependencies::{finalize_markers, init_markers, Dep, DepList};
use crate::{Subscriber, MAX_MARKER_BITS};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectId(u64);

impl EffectId {
	fn next() -> Self {
		EffectId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
	}
}

impl Display for EffectId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EffectOptions {
	/// Do not run on creation; the caller runs it explicitly.
	pub lazy: bool,
	pub name: Option<&'static str>,
}

impl EffectOptions {
	pub fn lazy(mut self) -> Self {
		self.lazy = true;
		self
	}

	pub fn named(mut self, name: &'static str) -> Self {
		self.name = Some(name);
		self
	}
}

/// Type-erased part of an effect, shared with the Deps it is linked to.
pub(crate) struct EffectCore {
	id: EffectId,
	name: &'static str,
	active: Cell<bool>,
	pub(crate) deps: RefCell<DepList>,
	parent: RefCell<Option<Weak<dyn Subscriber>>>,
	// Marker bits of the runs of this effect currently on the stack.
	running: Cell<u32>,
}

impl EffectCore {
	fn new(name: &'static str) -> Self {
		EffectCore {
			id: EffectId::next(),
			name,
			active: Cell::new(true),
			deps: RefCell::new(DepList::new()),
			parent: RefCell::new(None),
			running: Cell::new(0),
		}
	}

	pub(crate) fn id(&self) -> EffectId {
		self.id
	}

	pub(crate) fn name(&self) -> &'static str {
		self.name
	}

	pub(crate) fn is_active(&self) -> bool {
		self.active.get()
	}

	pub(crate) fn link(&self, dep: &Dep) {
		self.deps.borrow_mut().push(dep.clone());
	}

	/// Removes this effect from every Dep it belongs to.
	fn cleanup(&self) {
		let running = self.running.get();
		let deps = std::mem::take(&mut *self.deps.borrow_mut());
		for dep in deps {
			dep.remove(self.id);
			dep.clear_markers(running);
		}
	}

	fn stop(&self) {
		if !self.active.get() {
			return;
		}

		self.cleanup();
		self.active.set(false);
		tracing::debug!(effect = %self.id, name = self.name, "effect stopped");
	}
}

impl Drop for EffectCore {
	fn drop(&mut self) {
		self.cleanup();
	}
}

/// Pushes an effect onto the tracking context for the duration of one run.
/// Restoration happens in `Drop`, so it also runs when the computation
/// panics.
struct RunScope {
	effect: Rc<dyn Subscriber>,
	parent: Option<Rc<dyn Subscriber>>,
	last_parent: Option<Weak<dyn Subscriber>>,
	last_should_track: bool,
	bit: Option<u32>,
}

impl RunScope {
	fn enter(effect: Rc<dyn Subscriber>) -> Self {
		let (parent, last_should_track, depth) = with_context(|cx| {
			let parent = cx.active.replace(Some(effect.clone()));
			let last_should_track = cx.should_track.replace(true);
			let depth = cx.depth.get() + 1;
			cx.depth.set(depth);
			(parent, last_should_track, depth)
		});

		let core = effect.core();
		let last_parent = core.parent.replace(parent.as_ref().map(|p| Rc::downgrade(p)));

		let bit = if depth <= MAX_MARKER_BITS {
			let bit = 1 << depth;
			core.running.set(core.running.get() | bit);
			init_markers(&core.deps.borrow(), bit);
			Some(bit)
		} else {
			tracing::trace!(effect = %core.id, depth, "marker bits exhausted, relinking from scratch");
			core.cleanup();
			None
		};

		RunScope {
			effect,
			parent,
			last_parent,
			last_should_track,
			bit,
		}
	}
}

impl Drop for RunScope {
	fn drop(&mut self) {
		let core = self.effect.core();
		if let Some(bit) = self.bit {
			finalize_markers(&mut core.deps.borrow_mut(), core.id, bit, core.running.get());
			core.running.set(core.running.get() & !bit);
		}

		core.parent.replace(self.last_parent.take());

		let parent = self.parent.take();
		let _current = with_context(|cx| {
			cx.depth.set(cx.depth.get() - 1);
			cx.should_track.set(self.last_should_track);
			cx.active.replace(parent)
		});
	}
}

pub struct Effect<T: 'static> {
	body: Rc<EffectBody<T>>,
}

struct EffectBody<T: 'static> {
	core: EffectCore,
	func: Box<dyn Fn() -> T>,
	this: Weak<EffectBody<T>>,
}

impl<T: 'static> Clone for Effect<T> {
	fn clone(&self) -> Self {
		Effect {
			body: self.body.clone(),
		}
	}
}

impl<T: 'static> Effect<T> {
	/// Creates an effect without running it.
	#[must_use]
	pub fn new(func: Box<dyn Fn() -> T>) -> Self {
		Self::new_with_name("<unnamed>", func)
	}

	#[must_use]
	pub fn new_with_name(name: &'static str, func: Box<dyn Fn() -> T>) -> Self {
		Effect {
			body: Rc::new_cyclic(|this| EffectBody {
				core: EffectCore::new(name),
				func,
				this: this.clone(),
			}),
		}
	}

	/// Runs the computation, collecting what it reads. A panic inside the
	/// computation is propagated after the tracking context is restored.
	pub fn run(&self) -> T {
		self.body.run()
	}

	/// Unlinks the effect from everything it depends on. Permanent.
	pub fn stop(&self) {
		self.body.core.stop()
	}

	pub fn id(&self) -> EffectId {
		self.body.core.id
	}

	pub fn name(&self) -> &'static str {
		self.body.core.name
	}

	pub fn is_active(&self) -> bool {
		self.body.core.is_active()
	}

	pub fn deps_len(&self) -> usize {
		self.body.core.deps.borrow().len()
	}

	pub fn depends_on(&self, dep: &Dep) -> bool {
		self.body.core.deps.borrow().iter().any(|linked| linked.ptr_eq(dep))
	}

	/// The effect that was active when the current run started.
	pub fn parent(&self) -> Option<EffectId> {
		let parent = self.body.core.parent.borrow();
		parent.as_ref().and_then(Weak::upgrade).map(|p| p.core().id)
	}
}

impl<T: 'static> EffectBody<T> {
	fn run(&self) -> T {
		if !self.core.is_active() {
			return (self.func)();
		}

		let Some(this) = self.this.upgrade() else {
			return (self.func)();
		};

		let _scope = RunScope::enter(this);
		(self.func)()
	}
}

impl<T: 'static> Subscriber for EffectBody<T> {
	fn core(&self) -> &EffectCore {
		&self.core
	}

	fn rerun(&self) {
		let _ = self.run();
	}
}

impl<T: 'static> Debug for Effect<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Effect")
			.field("id", &self.body.core.id)
			.field("name", &self.body.core.name)
			.field("active", &self.body.core.is_active())
			.finish()
	}
}

/// Creates an effect and runs it once.
pub fn effect<T: 'static>(func: impl Fn() -> T + 'static) -> Effect<T> {
	effect_with(func, EffectOptions::default())
}

pub fn effect_with<T: 'static>(func: impl Fn() -> T + 'static, options: EffectOptions) -> Effect<T> {
	let effect = Effect::new_with_name(options.name.unwrap_or("<unnamed>"), Box::new(func));
	if !options.lazy {
		effect.run();
	}

	effect
}

pub fn stop<T: 'static>(effect: &Effect<T>) {
	effect.stop()
}
