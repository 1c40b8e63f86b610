use std::fmt;
use std::sync::Arc;

use crate::error::ReflectError;

/// Identifier of a dynamically dispatched operation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(Arc<str>);

impl MessageId {
	/// Creates a message identifier from its name.
	pub fn new(name: impl AsRef<str>) -> Self {
		Self(Arc::from(name.as_ref()))
	}

	/// Returns the message name.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "MessageId({})", self.0)
	}
}

impl fmt::Display for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for MessageId {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

/// Named set of messages a handler may claim to support.
///
/// Names are restricted to ASCII alphanumerics, `_` and `.` so that
/// canonical signatures can join them with a delimiter outside that set.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability(Arc<str>);

impl Capability {
	/// Creates a capability, panicking on an invalid name.
	///
	/// Intended for literal names; use [`Capability::try_new`] for input that
	/// is not known to be valid.
	pub fn new(name: impl AsRef<str>) -> Self {
		let name = name.as_ref();
		assert!(is_valid_name(name), "invalid capability name {name:?}");
		Self(Arc::from(name))
	}

	/// Creates a capability, rejecting names outside the allowed alphabet.
	pub fn try_new(name: impl AsRef<str>) -> Result<Self, ReflectError> {
		let name = name.as_ref();
		if !is_valid_name(name) {
			return Err(ReflectError::InvalidName(name.to_string()));
		}
		Ok(Self(Arc::from(name)))
	}

	/// Returns the capability name.
	pub fn name(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Capability({})", self.0)
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Returns true if `name` is usable as a capability name.
pub fn is_valid_name(name: &str) -> bool {
	!name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Dense runtime type identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDescriptor(u32);

impl TypeDescriptor {
	/// Creates a descriptor from its dense index.
	pub const fn from_u32(raw: u32) -> Self {
		Self(raw)
	}

	/// Returns the dense index.
	pub const fn as_u32(self) -> u32 {
		self.0
	}

	#[inline]
	pub(crate) const fn index(self) -> usize {
		self.0 as usize
	}
}
