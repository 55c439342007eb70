use std::any::Any;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use fxhash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::addr::WeakAddr;
use crate::context::with_context;
use crate::dependencies::Dep;
use crate::error::{EffectFailure, TriggerError};
use crate::{Key, Subscriber, Target, TrackOp, TriggerOp, Value, MAX_MARKER_BITS};

const MIN_SWEEP: usize = 64;

struct TargetDeps {
	target: WeakAddr<dyn Any>,
	deps: BTreeMap<Key, Dep>,
}

/// target -> key -> Dep. Entries hold the target weakly; an entry whose
/// target is gone is treated as absent.
struct Registry {
	targets: FxHashMap<usize, TargetDeps>,
	sweep_at: usize,
}

impl Registry {
	fn new() -> Self {
		Registry {
			targets: FxHashMap::default(),
			sweep_at: MIN_SWEEP,
		}
	}

	fn register<T: Target>(&mut self, target: &Rc<T>, key: Key) -> Dep {
		let addr = addr_of(target);
		if !self.targets.contains_key(&addr) && self.targets.len() >= self.sweep_at {
			self.sweep();
		}

		let entry = match self.targets.entry(addr) {
			Entry::Occupied(entry) => {
				let entry = entry.into_mut();
				if !entry.target.is_alive() {
					*entry = TargetDeps::new(target);
				}
				entry
			}
			Entry::Vacant(entry) => entry.insert(TargetDeps::new(target)),
		};
		debug_assert_eq!(entry.target.addr(), addr);

		entry.deps.entry(key).or_insert_with(Dep::new).clone()
	}

	fn lookup(&self, addr: usize) -> Option<&BTreeMap<Key, Dep>> {
		self.targets
			.get(&addr)
			.filter(|entry| entry.target.is_alive())
			.map(|entry| &entry.deps)
	}

	fn sweep(&mut self) {
		let before = self.targets.len();
		self.targets.retain(|_, entry| entry.target.is_alive());
		self.sweep_at = (self.targets.len() * 2).max(MIN_SWEEP);
		tracing::debug!(before, after = self.targets.len(), "swept dead targets");
	}
}

impl TargetDeps {
	fn new<T: Target>(target: &Rc<T>) -> Self {
		TargetDeps {
			target: WeakAddr::new(Rc::downgrade(target) as Weak<dyn Any>),
			deps: BTreeMap::new(),
		}
	}
}

thread_local! {
	static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new());
}

fn addr_of<T>(target: &Rc<T>) -> usize {
	Rc::as_ptr(target) as *const () as usize
}

/// Records that the running effect read `key` of `target`.
pub fn track<T: Target>(target: &Rc<T>, op: TrackOp, key: Key) {
	let Some(effect) = with_context(|cx| cx.tracking_effect()) else {
		return;
	};

	if !effect.core().is_active() {
		return;
	}

	tracing::trace!(effect = %effect.core().id(), ?op, ?key, "track");
	let dep = REGISTRY.with(|registry| registry.borrow_mut().register(target, key));
	track_effect(&dep, &effect);
}

fn track_effect(dep: &Dep, effect: &Rc<dyn Subscriber>) {
	let core = effect.core();
	let depth = with_context(|cx| cx.depth.get());

	let should_link = if depth <= MAX_MARKER_BITS {
		let bit = 1 << depth;
		if dep.new_tracked(bit) {
			false
		} else {
			dep.mark_new(bit);
			!dep.was_tracked(bit)
		}
	} else {
		!dep.contains(core.id())
	};

	if should_link {
		dep.add(core.id(), Rc::downgrade(effect));
		core.link(dep);
	}
}

/// Re-runs every effect that depends on what the write changed.
///
/// Each affected effect runs once, even if it is reachable through
/// several keys. A panicking effect does not stop the others; all
/// failures are reported together once the fan-out is done.
pub fn trigger<T: Target>(
	target: &Rc<T>,
	op: TriggerOp,
	key: Option<&Key>,
	new_value: Option<&Value>,
	old_value: Option<&Value>,
) -> Result<(), TriggerError> {
	let is_array = target.is_array();
	let effects = REGISTRY.with(|registry| {
		let registry = registry.borrow();
		let deps = registry.lookup(addr_of(target))?;

		let mut collected: SmallVec<[&Dep; 4]> = SmallVec::new();
		match (op, key) {
			(TriggerOp::Clear, _) => collected.extend(deps.values()),
			(_, Some(Key::Length)) => {
				let len = new_value.and_then(Value::as_length);
				for (key, dep) in deps {
					match (key, len) {
						(Key::Length, _) => collected.push(dep),
						(Key::Index(index), Some(len)) if *index >= len => collected.push(dep),
						_ => {}
					}
				}
			}
			(op, key) => {
				if let Some(dep) = key.and_then(|key| deps.get(key)) {
					collected.push(dep);
				}

				let extra = match op {
					TriggerOp::Add if is_array => match key {
						Some(Key::Index(_)) => Some(Key::Length),
						_ => None,
					},
					TriggerOp::Add | TriggerOp::Delete if !is_array => Some(Key::Iterate),
					_ => None,
				};

				if let Some(dep) = extra.and_then(|extra| deps.get(&extra)) {
					collected.push(dep);
				}
			}
		}

		let mut seen = FxHashSet::default();
		let mut effects = Vec::new();
		for dep in collected {
			dep.collect_into(&mut seen, &mut effects);
		}

		Some(effects)
	});

	let Some(effects) = effects else {
		return Ok(());
	};

	tracing::trace!(?op, ?key, ?new_value, ?old_value, effects = effects.len(), "trigger");

	let mut failures = Vec::new();
	for effect in effects {
		let core = effect.core();
		// Stopped by an effect that ran earlier in this fan-out.
		if !core.is_active() {
			continue;
		}

		if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| effect.rerun())) {
			let failure = EffectFailure::new(core.id(), core.name(), payload);
			tracing::error!(effect = %failure.effect, name = failure.name, message = %failure.message, "effect failed during trigger");
			failures.push(failure);
		}
	}

	if failures.is_empty() {
		Ok(())
	} else {
		Err(TriggerError { failures })
	}
}

/// The Dep for `(target, key)`, if anything ever tracked it.
pub fn dep_for<T: Target>(target: &Rc<T>, key: &Key) -> Option<Dep> {
	REGISTRY.with(|registry| {
		registry
			.borrow()
			.lookup(addr_of(target))
			.and_then(|deps| deps.get(key).cloned())
	})
}

/// Drops every Dep registered for `target`.
pub fn forget<T: Target>(target: &Rc<T>) {
	forget_addr(addr_of(target))
}

pub(crate) fn forget_addr(addr: usize) {
	let _ = REGISTRY.try_with(|registry| {
		if let Ok(mut registry) = registry.try_borrow_mut() {
			registry.targets.remove(&addr);
		}
	});
}
