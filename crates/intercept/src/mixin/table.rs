use std::sync::Arc;

use parking_lot::Mutex;
use relay_reflect::{Handle, Reflection};
use rustc_hash::FxHashMap as HashMap;

use super::EmbeddedDispatch;
use crate::config::DispatchConfig;
use crate::types::SynthesizedTypes;

/// Side table from object identity to its dispatch state.
///
/// Keys are object addresses. An entry keeps its owner's allocation alive
/// through a weak reference, so an address is not reused while its entry
/// exists. Entries of dead owners are pruned on every attach.
#[derive(Default)]
pub struct MixinTable {
	entries: Mutex<HashMap<usize, Arc<EmbeddedDispatch>>>,
}

impl MixinTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the dispatch state of `owner`, attaching a fresh one on first
	/// use.
	pub(crate) fn attach(
		&self,
		owner: &Handle,
		reflection: &Arc<dyn Reflection>,
		types: &Arc<SynthesizedTypes>,
		config: &Arc<DispatchConfig>,
	) -> Arc<EmbeddedDispatch> {
		let mut entries = self.entries.lock();
		let pruned = prune(&mut entries);
		if pruned > 0 {
			tracing::trace!(pruned, "orphaned dispatch state dropped");
		}
		let dispatch = entries.entry(owner.address()).or_insert_with(|| {
			tracing::debug!(owner = ?owner, "dispatch state attached");
			Arc::new(EmbeddedDispatch::new(
				owner,
				Arc::clone(reflection),
				Arc::clone(types),
				Arc::clone(config),
			))
		});
		debug_assert!(dispatch.owned_by(owner));
		Arc::clone(dispatch)
	}

	/// Returns the dispatch state of `owner` if one is attached.
	pub fn get(&self, owner: &Handle) -> Option<Arc<EmbeddedDispatch>> {
		self.entries
			.lock()
			.get(&owner.address())
			.filter(|d| d.owned_by(owner))
			.cloned()
	}

	/// Drops the dispatch state of `owner`.
	pub fn detach(&self, owner: &Handle) -> Option<Arc<EmbeddedDispatch>> {
		self.entries.lock().remove(&owner.address())
	}

	/// Drops the state of every dead owner; returns how many were dropped.
	pub fn prune(&self) -> usize {
		prune(&mut self.entries.lock())
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

fn prune(entries: &mut HashMap<usize, Arc<EmbeddedDispatch>>) -> usize {
	let before = entries.len();
	entries.retain(|_, d| !d.is_orphaned());
	before - entries.len()
}

impl std::fmt::Debug for MixinTable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MixinTable").field("entries", &self.len()).finish()
	}
}
