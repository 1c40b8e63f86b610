//! Memoized message resolution with coalesced, deferred invalidation.
//!
//! # Role
//!
//! A [`DispatchCache`] maps each observed [`MessageId`] to the handler it
//! resolved to, or to the fact that nothing handled it. Entries are never
//! invalidated one by one: a mutation marks the whole cache dirty and
//! schedules a single flush on the calling thread's [`RunLoop`]. Readers
//! also flush a dirty cache before consulting it, so a flush queued on a
//! loop that never turns cannot pin the cache.
//!
//! # Invariants
//!
//! - At most one flush is pending per dirty period; further mutations before
//!   the flush runs only observe the flag already set.
//! - A flush happens at most once per dirty period, whoever performs it.
//! - A cached handler is held weakly; a dead cached handler reads as a miss.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use relay_reflect::{Handle, MessageId};
use relay_run_loop::{RunLoop, RunLoopMode, ScheduleTiming};
use rustc_hash::FxHashMap as HashMap;

use crate::handle::WeakHandle;

/// A memoized resolution.
#[derive(Debug, Clone)]
pub enum CacheEntry {
	/// The message resolved to this handler.
	Resolved(WeakHandle),
	/// No handler in the chain implements the message.
	NoHandler,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone)]
pub enum CacheLookup {
	/// A live handler was cached.
	Hit(Handle),
	/// A negative result was cached.
	NoHandler,
	/// Nothing usable is cached.
	Miss,
}

/// Per-owner dispatch cache.
#[derive(Debug, Default)]
pub struct DispatchCache {
	entries: RwLock<HashMap<MessageId, CacheEntry>>,
	dirty: AtomicBool,
	flushes: AtomicU64,
}

impl DispatchCache {
	/// Creates an empty, clean cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Looks up the memoized resolution of `message`.
	pub fn lookup(&self, message: &MessageId) -> CacheLookup {
		match self.entries.read().get(message) {
			Some(CacheEntry::Resolved(handle)) => match handle.upgrade() {
				Some(handler) => CacheLookup::Hit(handler),
				None => CacheLookup::Miss,
			},
			Some(CacheEntry::NoHandler) => CacheLookup::NoHandler,
			None => CacheLookup::Miss,
		}
	}

	/// Memoizes the resolution of `message`.
	pub fn store(&self, message: &MessageId, entry: CacheEntry) {
		self.entries.write().insert(message.clone(), entry);
	}

	/// Number of memoized messages.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns true if nothing is memoized.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Returns true while a flush is pending.
	pub fn is_dirty(&self) -> bool {
		self.dirty.load(Ordering::Acquire)
	}

	/// Number of flushes performed so far.
	pub fn flush_count(&self) -> u64 {
		self.flushes.load(Ordering::Acquire)
	}

	/// Sets the dirty flag; returns true if the cache was clean before.
	pub fn mark_dirty(&self) -> bool {
		!self.dirty.swap(true, Ordering::AcqRel)
	}

	/// Clears every entry if the cache is dirty; returns whether it did.
	///
	/// The flag is reset under the entries lock, so a reader that observes
	/// a clean cache never observes the entries it is about to lose.
	pub fn flush_if_dirty(&self) -> bool {
		if !self.dirty.load(Ordering::Acquire) {
			return false;
		}
		let dropped = {
			let mut entries = self.entries.write();
			if !self.dirty.swap(false, Ordering::AcqRel) {
				return false;
			}
			let dropped = entries.len();
			entries.clear();
			dropped
		};
		let flushes = self.flushes.fetch_add(1, Ordering::AcqRel) + 1;
		tracing::debug!(dropped, flushes, "dispatch cache flushed");
		true
	}

	/// Marks the cache dirty and, on the clean-to-dirty transition, schedules
	/// one flush on the calling thread's run loop.
	///
	/// Returns true if a flush was scheduled by this call.
	pub fn invalidate_later(self: &Arc<Self>, timing: ScheduleTiming, mode: RunLoopMode) -> bool {
		if !self.mark_dirty() {
			return false;
		}
		let cache = Arc::downgrade(self);
		RunLoop::current().schedule_in([mode], timing, move || {
			if let Some(cache) = cache.upgrade() {
				cache.flush_if_dirty();
			}
		});
		true
	}
}
