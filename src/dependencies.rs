use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use fxhash::FxHashSet;
use smallvec::SmallVec;

use crate::effect::EffectId;
use crate::Subscriber;

/// Reverse index kept by every effect: the Deps it currently belongs to.
pub(crate) type DepList = SmallVec<[Dep; 4]>;

/// Set of effects that depend on one (target, key) pair.
///
/// Membership is weak: a Dep never keeps an effect alive. The two marker
/// words hold one bit per effect nesting depth. `was_tracked` says the Dep
/// was linked to the effect running at that depth before its current run,
/// `new_tracked` says the current run has read it.
#[derive(Clone)]
pub struct Dep {
	body: Rc<DepBody>,
}

struct DepBody {
	effects: RefCell<BTreeMap<EffectId, Weak<dyn Subscriber>>>,
	was_tracked: Cell<u32>,
	new_tracked: Cell<u32>,
}

impl Dep {
	pub(crate) fn new() -> Self {
		Dep {
			body: Rc::new(DepBody {
				effects: RefCell::new(BTreeMap::new()),
				was_tracked: Cell::new(0),
				new_tracked: Cell::new(0),
			}),
		}
	}

	pub fn len(&self) -> usize {
		self.body.effects.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.body.effects.borrow().is_empty()
	}

	pub fn contains(&self, effect: EffectId) -> bool {
		self.body.effects.borrow().contains_key(&effect)
	}

	pub fn ptr_eq(&self, other: &Dep) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}

	pub(crate) fn add(&self, effect: EffectId, subscriber: Weak<dyn Subscriber>) {
		self.body.effects.borrow_mut().entry(effect).or_insert(subscriber);
	}

	pub(crate) fn remove(&self, effect: EffectId) {
		self.body.effects.borrow_mut().remove(&effect);
	}

	pub(crate) fn was_tracked(&self, bit: u32) -> bool {
		self.body.was_tracked.get() & bit != 0
	}

	pub(crate) fn new_tracked(&self, bit: u32) -> bool {
		self.body.new_tracked.get() & bit != 0
	}

	pub(crate) fn mark_new(&self, bit: u32) {
		self.body.new_tracked.set(self.body.new_tracked.get() | bit);
	}

	fn mark_was(&self, bit: u32) {
		self.body.was_tracked.set(self.body.was_tracked.get() | bit);
	}

	pub(crate) fn clear_markers(&self, bits: u32) {
		self.body.was_tracked.set(self.body.was_tracked.get() & !bits);
		self.body.new_tracked.set(self.body.new_tracked.get() & !bits);
	}

	/// Live members in id order, skipping those already seen in the
	/// same fan-out.
	pub(crate) fn collect_into(
		&self,
		seen: &mut FxHashSet<EffectId>,
		out: &mut Vec<Rc<dyn Subscriber>>,
	) {
		for (id, subscriber) in self.body.effects.borrow().iter() {
			if !seen.insert(*id) {
				continue;
			}

			if let Some(subscriber) = subscriber.upgrade() {
				out.push(subscriber);
			}
		}
	}
}

impl Debug for Dep {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dep")
			.field("effects", &self.body.effects.borrow().keys().collect::<Vec<_>>())
			.field("was_tracked", &format_args!("{:#b}", self.body.was_tracked.get()))
			.field("new_tracked", &format_args!("{:#b}", self.body.new_tracked.get()))
			.finish()
	}
}

/// Everything the effect is linked to right now counts as "was tracked"
/// for the run that is about to start at `bit`.
pub(crate) fn init_markers(deps: &DepList, bit: u32) {
	for dep in deps {
		dep.mark_was(bit);
		dep.body.new_tracked.set(dep.body.new_tracked.get() & !bit);
	}
}

/// Unlinks Deps that were read by the previous run but not by this one,
/// then clears this depth's bits.
///
/// `running` holds the bits of every run of the same effect still on the
/// stack. An unlinked Dep is never visited by those outer runs again, so
/// their bits are cleared here too.
pub(crate) fn finalize_markers(deps: &mut DepList, effect: EffectId, bit: u32, running: u32) {
	deps.retain(|dep| {
		let stale = dep.was_tracked(bit) && !dep.new_tracked(bit);
		if stale {
			dep.remove(effect);
			dep.clear_markers(running | bit);
		} else {
			dep.clear_markers(bit);
		}
		!stale
	});
}
