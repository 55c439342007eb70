use std::cell::Cell;
use std::rc::Rc;

use reactivity::{
	effect, reactive, readonly, shallow_reactive, Key, Reactive, ReactiveError, Value, Variant,
	MAX_ARRAY_LENGTH,
};


fn watch(state: &Reactive, read: impl Fn(&Reactive) + 'static) -> (Rc<Cell<usize>>, reactivity::Effect<()>) {
	let runs = Rc::new(Cell::new(0));
	let e = effect({
		let state = state.clone();
		let runs = runs.clone();
		move || {
			runs.set(runs.get() + 1);
			read(&state);
		}
	});
	(runs, e)
}

#[test]
fn shrinking_length_reruns_out_of_range_readers_only() {
	mock::init_tracing();
	let arr = Reactive::array([1, 2, 3]).reactive();

	let (last, _e2) = watch(&arr, |arr| {
		arr.get(Key::Index(2));
	});
	let (first, _e0) = watch(&arr, |arr| {
		arr.get(Key::Index(0));
	});

	arr.set(Key::Length, 1).unwrap();

	assert_eq!(last.get(), 2);
	assert_eq!(first.get(), 1);
	assert_eq!(arr.get(Key::Index(2)), Value::Undefined);
}

#[test]
fn growing_length_only_reruns_length_readers() {
	let arr = Reactive::array([1, 2, 3]).reactive();

	let (len, _a) = watch(&arr, |arr| {
		arr.len();
	});
	let (item, _b) = watch(&arr, |arr| {
		arr.get(Key::Index(1));
	});

	arr.set_len(5).unwrap();
	assert_eq!(len.get(), 2);
	assert_eq!(item.get(), 1);

	arr.set_len(5).unwrap();
	assert_eq!(len.get(), 2);
}

#[test]
fn adding_an_index_reruns_length_readers() {
	let arr = Reactive::array([1, 2]).reactive();

	let (len, _a) = watch(&arr, |arr| {
		arr.len();
	});
	let (keys, _b) = watch(&arr, |arr| {
		arr.keys();
	});
	let (missing, _c) = watch(&arr, |arr| {
		arr.get(Key::Index(4));
	});

	arr.push(3).unwrap();
	assert_eq!(len.get(), 2);
	assert_eq!(keys.get(), 2);
	assert_eq!(missing.get(), 1);

	arr.set(Key::Index(4), 5).unwrap();
	assert_eq!(len.get(), 3);
	assert_eq!(missing.get(), 2);
	assert_eq!(arr.get(Key::Index(3)), Value::Undefined);

	// Overwriting an existing index leaves length readers alone.
	arr.set(Key::Index(0), 10).unwrap();
	assert_eq!(len.get(), 3);
}

#[test]
fn pop_reruns_index_and_length_readers() {
	let arr = Reactive::array([1, 2, 3]).reactive();

	let (both, _e) = watch(&arr, |arr| {
		arr.get(Key::Index(2));
		arr.len();
	});

	// One rerun for the removed index, one for the new length.
	assert_eq!(arr.pop().unwrap(), Some(Value::from(3)));
	assert_eq!(both.get(), 3);
	assert_eq!(arr.len(), 2);

	Reactive::array(Vec::<Value>::new()).reactive().pop().unwrap();
}

#[test]
fn object_iteration_follows_added_and_deleted_keys() {
	let state = Reactive::object_from([("a", 1)]).reactive();

	let (keys, _a) = watch(&state, |state| {
		state.keys();
	});
	let (has, _b) = watch(&state, |state| {
		state.has("b");
	});

	state.set("a", 2).unwrap();
	assert_eq!(keys.get(), 1);

	state.set("b", 1).unwrap();
	assert_eq!(keys.get(), 2);
	assert_eq!(has.get(), 2);

	assert!(state.delete("b").unwrap());
	assert_eq!(keys.get(), 3);
	assert_eq!(has.get(), 3);

	assert!(!state.delete("b").unwrap());
	assert_eq!(keys.get(), 3);
}

#[test]
fn readonly_rejects_writes_and_does_not_track() {
	let raw = Reactive::object_from([("k", 1)]);
	let state = raw.reactive();
	let view = readonly(&Value::from(raw.clone()));
	let view = view.as_object().unwrap().clone();

	assert!(view.is_readonly());
	assert!(matches!(view.set("k", 2), Err(ReactiveError::Readonly { .. })));
	assert!(matches!(view.delete("k"), Err(ReactiveError::Readonly { .. })));
	assert!(matches!(view.clear(), Err(ReactiveError::Readonly { .. })));
	assert_eq!(view.get("k"), Value::from(1));

	let (runs, _e) = watch(&view, |view| {
		view.get("k");
	});

	state.set("k", 2).unwrap();
	assert_eq!(runs.get(), 1);
	assert_eq!(view.get("k"), Value::from(2));
}

#[test]
fn deep_and_shallow_nesting() {
	let inner = Reactive::object_from([("x", 1)]);
	let raw = Reactive::object_from([("inner", inner.clone())]);

	let deep = raw.reactive();
	let nested = deep.get("inner");
	assert_eq!(nested.as_object().unwrap().variant(), Variant::Mutable);

	let ro = raw.readonly().get("inner");
	assert_eq!(ro.as_object().unwrap().variant(), Variant::Readonly);

	let shallow = shallow_reactive(&Value::from(raw.clone()));
	let nested_raw = shallow.as_object().unwrap().get("inner");
	assert_eq!(nested_raw.as_object().unwrap().variant(), Variant::Raw);

	let (runs, _e) = watch(&deep, |deep| {
		deep.get("inner").as_object().unwrap().get("x");
	});

	nested.as_object().unwrap().set("x", 2).unwrap();
	assert_eq!(runs.get(), 2);

	// Through the raw handle nothing is observed.
	inner.set("x", 3).unwrap();
	assert_eq!(runs.get(), 2);
}

#[test]
fn wrapping_rules() {
	let raw = Reactive::object();
	let state = raw.reactive();
	let view = raw.readonly();

	assert!(state.is_reactive() && state.is_proxy());
	assert!(!raw.is_proxy());
	assert_eq!(state.reactive().variant(), Variant::Mutable);
	assert_eq!(view.reactive().variant(), Variant::Readonly);
	assert_eq!(state.to_raw().variant(), Variant::Raw);
	assert!(state.same_target(&view));

	let primitive = reactive(&Value::from(1));
	assert_eq!(primitive, Value::from(1));

	let skipped = Reactive::object().mark_raw();
	assert_eq!(skipped.reactive().variant(), Variant::Raw);
	assert_eq!(skipped.readonly().variant(), Variant::Raw);
}

#[test]
fn invalid_keys_are_rejected() {
	let arr = Reactive::array([1]).reactive();
	let obj = Reactive::object().reactive();

	assert!(matches!(arr.set("name", 1), Err(ReactiveError::InvalidKey { .. })));
	assert!(matches!(arr.set(Key::Length, -1), Err(ReactiveError::InvalidLength)));
	assert!(matches!(obj.set(Key::Length, 1), Err(ReactiveError::InvalidKey { .. })));
	assert!(matches!(obj.set_len(1), Err(ReactiveError::NotAnArray)));
	assert!(matches!(obj.push(1), Err(ReactiveError::NotAnArray)));
}

#[test]
fn oversized_indices_and_lengths_are_rejected() {
	let arr = Reactive::array([1, 2]).reactive();
	let (runs, _e) = watch(&arr, |arr| {
		arr.len();
	});

	assert!(matches!(arr.set(Key::Index(usize::MAX), 1), Err(ReactiveError::InvalidKey { .. })));
	assert!(matches!(
		arr.set(Key::Index(MAX_ARRAY_LENGTH), 1),
		Err(ReactiveError::InvalidKey { .. })
	));
	assert!(matches!(arr.set(Key::Length, 1e300), Err(ReactiveError::InvalidLength)));
	assert!(matches!(arr.set_len(usize::MAX), Err(ReactiveError::InvalidLength)));

	assert_eq!(arr.len(), 2);
	assert_eq!(runs.get(), 1);
}

#[test]
fn array_keys_accept_their_string_spelling() {
	let arr = Reactive::array([1, 2, 3]).reactive();

	let (second, _e) = watch(&arr, |arr| {
		arr.get("1");
	});

	assert_eq!(arr.get("0"), Value::from(1));
	assert!(arr.has("2") && !arr.has("3"));

	arr.set(Key::Index(1), 20).unwrap();
	assert_eq!(second.get(), 2);

	arr.set("length", 1).unwrap();
	assert_eq!(arr.len(), 1);
	assert_eq!(second.get(), 3);
	assert_eq!(arr.get("length"), Value::from(1));

	// Not canonical indices, so still invalid on an array.
	assert!(matches!(arr.set("01", 1), Err(ReactiveError::InvalidKey { .. })));
	assert!(matches!(arr.set("-1", 1), Err(ReactiveError::InvalidKey { .. })));
}
