use std::fmt;

use relay_reflect::Capability;
use smallvec::SmallVec;

/// Joins capability names inside a signature. Never part of a valid
/// capability name.
pub const DELIMITER: char = ',';

/// Sorted, deduplicated capability set.
pub type CapabilitySet = SmallVec<[Capability; 4]>;

/// Sorts and deduplicates `capabilities`.
pub fn canonical<'a>(capabilities: impl IntoIterator<Item = &'a Capability>) -> CapabilitySet {
	let mut set: CapabilitySet = capabilities.into_iter().cloned().collect();
	set.sort_unstable();
	set.dedup();
	set
}

/// Canonical name of a capability set under a parent type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
	parent: Box<str>,
	capabilities: Box<str>,
}

impl Signature {
	/// Builds the signature of `capabilities` (already canonical) under
	/// `parent`.
	pub fn new(parent: &str, capabilities: &[Capability]) -> Self {
		let mut joined = String::new();
		for (i, capability) in capabilities.iter().enumerate() {
			if i > 0 {
				joined.push(DELIMITER);
			}
			joined.push_str(capability.name());
		}
		Self {
			parent: parent.into(),
			capabilities: joined.into_boxed_str(),
		}
	}

	/// Joined capability names.
	pub fn capabilities(&self) -> &str {
		&self.capabilities
	}

	/// Type name probed at `salt`.
	pub fn type_name(&self, salt: u32) -> String {
		salted(&format!("{}_{}", self.parent, self.capabilities), salt)
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}<{}>", self.parent, self.capabilities)
	}
}

/// Appends `_{salt}` to `stem` unless `salt` is zero.
pub fn salted(stem: &str, salt: u32) -> String {
	if salt == 0 { stem.to_string() } else { format!("{stem}_{salt}") }
}
