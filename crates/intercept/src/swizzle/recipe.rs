use std::fmt;
use std::sync::OnceLock;

use relay_reflect::{Implementation, Object, Value};

/// Receives the implementation a replacement displaced.
///
/// Usually a `static`, so the replacement body can reach the original:
///
/// ```
/// use relay_intercept::OriginalSlot;
///
/// static ORIGINAL_LAYOUT: OriginalSlot = OriginalSlot::new();
/// assert!(!ORIGINAL_LAYOUT.is_filled());
/// ```
pub struct OriginalSlot {
	original: OnceLock<Option<Implementation>>,
}

impl OriginalSlot {
	pub const fn new() -> Self {
		Self {
			original: OnceLock::new(),
		}
	}

	/// Returns true once a replacement has written the slot.
	pub fn is_filled(&self) -> bool {
		self.original.get().is_some()
	}

	/// The displaced implementation; `None` before the replacement ran or
	/// when the target had no implementation to displace.
	pub fn get(&self) -> Option<&Implementation> {
		self.original.get()?.as_ref()
	}

	/// Invokes the displaced implementation, if there is one.
	pub fn invoke(&self, receiver: &Object, args: &[Value]) -> Option<Value> {
		self.get().map(|imp| imp.invoke(receiver, args))
	}

	/// Writes the slot; returns false if it was already written.
	pub(crate) fn fill(&self, original: Option<Implementation>) -> bool {
		self.original.set(original).is_ok()
	}
}

impl Default for OriginalSlot {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for OriginalSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OriginalSlot")
			.field("original", &self.get())
			.field("filled", &self.is_filled())
			.finish()
	}
}

/// A replacement described statically: where the displaced implementation
/// goes and what replaces it.
///
/// ```
/// use relay_intercept::{OriginalSlot, SwizzleRecipe};
/// use relay_reflect::{Implementation, Value};
///
/// struct LoudLayout;
///
/// static ORIGINAL: OriginalSlot = OriginalSlot::new();
///
/// impl SwizzleRecipe for LoudLayout {
/// 	fn original() -> &'static OriginalSlot {
/// 		&ORIGINAL
/// 	}
///
/// 	fn replacement() -> Implementation {
/// 		Implementation::new("LoudLayout", |this, args| {
/// 			ORIGINAL.invoke(this, args).unwrap_or(Value::Unit)
/// 		})
/// 	}
/// }
/// ```
pub trait SwizzleRecipe {
	/// Slot receiving the displaced implementation.
	fn original() -> &'static OriginalSlot;

	/// The implementation installed by the replacement.
	fn replacement() -> Implementation;
}
