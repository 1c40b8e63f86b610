use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::object::Object;
use crate::value::Value;

/// Signature shared by every implementation body.
pub type ImpFn = dyn Fn(&Object, &[Value]) -> Value + Send + Sync;

static NEXT_IMPLEMENTATION: AtomicU64 = AtomicU64::new(1);

/// A callable implementation bound to a message on some type.
///
/// Clones share identity; two separately constructed implementations never
/// compare equal, even with identical bodies.
#[derive(Clone)]
pub struct Implementation {
	id: u64,
	label: Arc<str>,
	func: Arc<ImpFn>,
}

impl Implementation {
	/// Wraps `func` as a new implementation.
	pub fn new(
		label: impl AsRef<str>,
		func: impl Fn(&Object, &[Value]) -> Value + Send + Sync + 'static,
	) -> Self {
		Self {
			id: NEXT_IMPLEMENTATION.fetch_add(1, Ordering::Relaxed),
			label: Arc::from(label.as_ref()),
			func: Arc::new(func),
		}
	}

	/// Invokes the implementation with `receiver` as `self`.
	#[inline]
	pub fn invoke(&self, receiver: &Object, args: &[Value]) -> Value {
		(self.func)(receiver, args)
	}

	/// Returns the unique implementation id.
	pub const fn id(&self) -> u64 {
		self.id
	}

	/// Returns the human readable label.
	pub fn label(&self) -> &str {
		&self.label
	}
}

impl PartialEq for Implementation {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for Implementation {}

impl fmt::Debug for Implementation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Implementation")
			.field("id", &self.id)
			.field("label", &self.label)
			.finish()
	}
}
