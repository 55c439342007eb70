use std::rc::Weak;

/// A weak pointer remembered by address. Used as a registry key holder
/// that never keeps the target alive.
pub struct WeakAddr<T: ?Sized> {
	ptr: Weak<T>,
}

impl<T: ?Sized> WeakAddr<T> {
	pub fn new(ptr: Weak<T>) -> Self {
		WeakAddr { ptr }
	}

	pub fn addr(&self) -> usize {
		Weak::as_ptr(&self.ptr) as *const () as usize
	}

	pub fn is_alive(&self) -> bool {
		self.ptr.strong_count() > 0
	}
}
