use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use relay_reflect::{MessageId, TypeDescriptor};
use rustc_hash::FxHashMap as HashMap;
use smallvec::SmallVec;

use crate::error::ReplacementError;

/// Identity of a replacement: two requests with equal keys are the same
/// replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplacementKey {
	/// Instance type named by the request.
	pub ty: TypeDescriptor,
	/// True for class-side replacements.
	pub is_meta: bool,
	/// One message for implementation swaps, two (in request order) for
	/// exchanges.
	pub messages: SmallVec<[MessageId; 2]>,
}

type Gate = Arc<OnceLock<Result<(), ReplacementError>>>;

/// Outcome of every replacement attempted in one interception context.
#[derive(Debug, Default)]
pub struct ReplacementLedger {
	gates: Mutex<HashMap<ReplacementKey, Gate>>,
}

impl ReplacementLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs `apply` unless a replacement with `key` already ran.
	///
	/// The first caller runs `apply` and receives its result; concurrent
	/// callers block until it finishes. Every later caller receives
	/// [`ReplacementError::AlreadyApplied`] if the first run succeeded, or the
	/// first run's error otherwise.
	pub(crate) fn run_once(
		&self,
		key: ReplacementKey,
		describe: impl FnOnce() -> String,
		apply: impl FnOnce() -> Result<(), ReplacementError>,
	) -> Result<(), ReplacementError> {
		let gate = Arc::clone(self.gates.lock().entry(key).or_default());
		let mut ran = false;
		let outcome = gate.get_or_init(|| {
			ran = true;
			apply()
		});
		match (ran, outcome) {
			(true, outcome) => outcome.clone(),
			(false, Ok(())) => Err(ReplacementError::AlreadyApplied {
				replacement: describe(),
			}),
			(false, Err(err)) => Err(err.clone()),
		}
	}

	/// Returns true if a replacement with `key` ran and succeeded.
	pub fn is_applied(&self, key: &ReplacementKey) -> bool {
		self.gates
			.lock()
			.get(key)
			.is_some_and(|gate| matches!(gate.get(), Some(Ok(()))))
	}

	/// Number of distinct replacements attempted.
	pub fn len(&self) -> usize {
		self.gates.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.gates.lock().is_empty()
	}
}
