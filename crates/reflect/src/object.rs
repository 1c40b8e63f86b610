use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ids::TypeDescriptor;

/// Strong reference to a runtime object.
pub type Handle = Arc<Object>;

/// A runtime object: a retargetable type pointer plus an optional payload.
///
/// Identity is the allocation address; two handles denote the same object
/// iff [`Arc::ptr_eq`] holds.
pub struct Object {
	isa: AtomicU32,
	payload: Option<Box<dyn Any + Send + Sync>>,
}

impl Object {
	/// Allocates an object of type `ty` without payload.
	pub fn new(ty: TypeDescriptor) -> Handle {
		Arc::new(Self {
			isa: AtomicU32::new(ty.as_u32()),
			payload: None,
		})
	}

	/// Allocates an object of type `ty` carrying `payload`.
	pub fn with_payload<T: Any + Send + Sync>(ty: TypeDescriptor, payload: T) -> Handle {
		Arc::new(Self {
			isa: AtomicU32::new(ty.as_u32()),
			payload: Some(Box::new(payload)),
		})
	}

	/// Returns the object's current type.
	#[inline]
	pub fn type_descriptor(&self) -> TypeDescriptor {
		TypeDescriptor::from_u32(self.isa.load(Ordering::Acquire))
	}

	/// Retargets the object to `ty`.
	///
	/// Callers go through [`crate::Reflection::set_type`], which validates
	/// the descriptor first.
	pub fn retarget(&self, ty: TypeDescriptor) {
		self.isa.store(ty.as_u32(), Ordering::Release);
	}

	/// Returns the payload downcast to `T`.
	pub fn payload<T: Any>(&self) -> Option<&T> {
		self.payload.as_deref()?.downcast_ref::<T>()
	}

	/// Returns the identity address of this object.
	#[inline]
	pub fn address(&self) -> usize {
		self as *const Self as usize
	}
}

impl fmt::Debug for Object {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Object")
			.field("address", &format_args!("{:#x}", self.address()))
			.field("type", &self.type_descriptor())
			.finish_non_exhaustive()
	}
}
