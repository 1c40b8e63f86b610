use std::fmt;
use std::sync::{Arc, Weak};

use relay_reflect::{Handle, Object};

/// Non-owning reference to a handler object.
#[derive(Clone, Default)]
pub struct WeakHandle(Weak<Object>);

impl WeakHandle {
	/// Downgrades `handle`.
	pub fn new(handle: &Handle) -> Self {
		Self(Arc::downgrade(handle))
	}

	/// Returns true while the referent has not been deallocated.
	#[inline]
	pub fn is_alive(&self) -> bool {
		self.0.strong_count() > 0
	}

	/// Returns a strong reference if the referent is still alive.
	#[inline]
	pub fn upgrade(&self) -> Option<Handle> {
		self.0.upgrade()
	}

	/// Returns true if this handle refers to `handle`'s object.
	#[inline]
	pub fn refers_to(&self, handle: &Handle) -> bool {
		std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(handle))
	}
}

impl fmt::Debug for WeakHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakHandle")
			.field("address", &format_args!("{:#x}", self.0.as_ptr() as usize))
			.field("alive", &self.is_alive())
			.finish()
	}
}
