//! Priority-ordered chains of weakly held handlers.
//!
//! # Invariants
//!
//! - The most recently appended entry has the highest priority. Positions
//!   passed to and reported by the chain are priority indices: 0 is queried
//!   first.
//! - Dead entries are only removed by a traversal that reaches them (or by
//!   [`HandlerChain::purge`]); they are never returned.

use std::sync::Arc;

use relay_reflect::Handle;
use smallvec::SmallVec;

use crate::handle::WeakHandle;

/// Ordered sequence of weak handler references.
#[derive(Debug, Default, Clone)]
pub struct HandlerChain {
	/// Oldest first; traversal runs back to front.
	entries: SmallVec<[WeakHandle; 4]>,
}

impl HandlerChain {
	/// Creates an empty chain.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of entries, including dead ones not yet purged.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if the chain holds no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Pushes `handler` as the new highest-priority entry.
	pub fn append(&mut self, handler: &Handle) {
		self.entries.push(WeakHandle::new(handler));
	}

	/// Appends every handler in order; the last one ends up first.
	pub fn append_all<'a>(&mut self, handlers: impl IntoIterator<Item = &'a Handle>) {
		self.entries
			.extend(handlers.into_iter().map(WeakHandle::new));
	}

	/// Inserts `handler` at priority index `index`.
	///
	/// # Panics
	///
	/// Panics if `index > len`.
	pub fn insert(&mut self, index: usize, handler: &Handle) {
		let len = self.entries.len();
		assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
		self.entries.insert(len - index, WeakHandle::new(handler));
	}

	/// Inserts `handlers` starting at priority index `index`, keeping their
	/// relative order.
	///
	/// # Panics
	///
	/// Panics if `index > len`.
	pub fn insert_all<'a>(&mut self, index: usize, handlers: impl IntoIterator<Item = &'a Handle>) {
		for (offset, handler) in handlers.into_iter().enumerate() {
			self.insert(index + offset, handler);
		}
	}

	/// Removes the highest-priority entry referring to `handler`.
	pub fn remove(&mut self, handler: &Handle) -> Option<Handle> {
		let pos = self.entries.iter().rposition(|e| e.refers_to(handler))?;
		self.entries.remove(pos);
		Some(Arc::clone(handler))
	}

	/// Removes the entry at priority index `index`, returning its referent if
	/// it is still alive.
	pub fn remove_at(&mut self, index: usize) -> Option<Handle> {
		let len = self.entries.len();
		if index >= len {
			return None;
		}
		self.entries.remove(len - 1 - index).upgrade()
	}

	/// Returns true if some entry refers to `handler`.
	pub fn contains(&self, handler: &Handle) -> bool {
		self.entries.iter().any(|e| e.refers_to(handler))
	}

	/// Live handlers in priority order.
	pub fn live(&self) -> Vec<Handle> {
		self.entries.iter().rev().filter_map(WeakHandle::upgrade).collect()
	}

	/// Walks the chain in priority order and returns the first live handler
	/// accepted by `accept`. Dead entries visited on the way are purged.
	pub fn find(&mut self, mut accept: impl FnMut(&Handle) -> bool) -> Option<Handle> {
		let mut dead: SmallVec<[usize; 4]> = SmallVec::new();
		let mut found = None;
		for (pos, entry) in self.entries.iter().enumerate().rev() {
			match entry.upgrade() {
				Some(handler) => {
					if accept(&handler) {
						found = Some(handler);
						break;
					}
				}
				None => dead.push(pos),
			}
		}
		// Positions were collected back to front, so removal keeps earlier
		// positions valid.
		for pos in dead {
			self.entries.remove(pos);
		}
		found
	}

	/// Removes every dead entry; returns how many were removed.
	pub fn purge(&mut self) -> usize {
		let before = self.entries.len();
		self.entries.retain(|e| e.is_alive());
		before - self.entries.len()
	}
}

#[cfg(test)]
mod tests;
