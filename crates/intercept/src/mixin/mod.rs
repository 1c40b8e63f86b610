//! Forwarding behavior embedded into an existing object.
//!
//! # Role
//!
//! [`EmbeddedDispatch`] runs the forwarding proxy's resolution for an object
//! that keeps its own identity. The object's own type is the final fallback
//! instead of a separate receiver. Capabilities are registered incrementally;
//! each registration widens the owner's type through the synthesized-type
//! registry.
//!
//! # Invariants
//!
//! - Resolutions are memoized in a [`DispatchCache`]; every chain mutation
//!   schedules one coalesced flush on the mutating thread's run loop instead
//!   of clearing synchronously. A resolution that finds the cache dirty
//!   flushes it first, so a completed mutation is never answered from
//!   entries built before it.
//! - The owner's own type is consulted on every resolution and never cached.
//! - Capabilities are read from a lock-free snapshot; mutations serialize on
//!   the chain lock.
//! - Widening derives from the attach-time type, unless something else (a
//!   graft, say) retargeted the owner to a descendant of it since the last
//!   widening; that descendant is then kept as the parent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use relay_reflect::{Capability, Handle, MessageId, ReflectError, Reflection, SendError, TypeDescriptor, Value};

use crate::cache::{CacheEntry, CacheLookup, DispatchCache};
use crate::chain::HandlerChain;
use crate::config::DispatchConfig;
use crate::handle::WeakHandle;
use crate::types::{CapabilitySet, SynthesizedTypes, canonical};

mod table;

pub use table::MixinTable;

/// Per-object dispatch state.
pub struct EmbeddedDispatch {
	owner: WeakHandle,
	/// Owner type when the state was attached; widened types extend it.
	base_type: TypeDescriptor,
	/// Type this state last assigned to the owner.
	widened: AtomicU32,
	reflection: Arc<dyn Reflection>,
	types: Arc<SynthesizedTypes>,
	config: Arc<DispatchConfig>,
	capabilities: ArcSwap<CapabilitySet>,
	chain: Mutex<HandlerChain>,
	cache: Arc<DispatchCache>,
}

impl EmbeddedDispatch {
	pub(crate) fn new(
		owner: &Handle,
		reflection: Arc<dyn Reflection>,
		types: Arc<SynthesizedTypes>,
		config: Arc<DispatchConfig>,
	) -> Self {
		let base_type = reflection.type_of(owner);
		Self {
			owner: WeakHandle::new(owner),
			base_type,
			widened: AtomicU32::new(base_type.as_u32()),
			reflection,
			types,
			config,
			capabilities: ArcSwap::from_pointee(CapabilitySet::new()),
			chain: Mutex::new(HandlerChain::new()),
			cache: Arc::new(DispatchCache::new()),
		}
	}

	/// The owning object, if it is still alive.
	pub fn owner(&self) -> Option<Handle> {
		self.owner.upgrade()
	}

	pub(crate) fn owned_by(&self, object: &Handle) -> bool {
		self.owner.refers_to(object)
	}

	pub(crate) fn is_orphaned(&self) -> bool {
		!self.owner.is_alive()
	}

	/// Type of the owner when dispatch state was attached.
	pub fn base_type(&self) -> TypeDescriptor {
		self.base_type
	}

	/// Registered capabilities, sorted.
	pub fn capabilities(&self) -> Arc<CapabilitySet> {
		self.capabilities.load_full()
	}

	/// Registers `capability`, widening the owner's type when it does not
	/// conform yet. Returns false if it was already registered.
	pub fn add_capability(&self, capability: &Capability) -> Result<bool, ReflectError> {
		self.add_capabilities([capability]).map(|added| added > 0)
	}

	/// Registers every capability in `capabilities`; returns how many were
	/// new.
	pub fn add_capabilities<'a>(
		&self,
		capabilities: impl IntoIterator<Item = &'a Capability>,
	) -> Result<usize, ReflectError> {
		let _chain = self.chain.lock();
		let current = self.capabilities.load_full();
		let requested = canonical(capabilities);
		let added = requested.iter().filter(|c| !current.contains(c)).count();
		if added == 0 {
			return Ok(0);
		}
		let next = canonical(current.iter().chain(requested.iter()));

		if let Some(owner) = self.owner.upgrade() {
			let own = self.reflection.type_of(&owner);
			if !requested.iter().all(|c| self.reflection.conforms_to(own, c)) {
				let parent = self.widening_parent(own);
				let widened = self.types.type_for(parent, &next)?;
				if widened != own {
					self.reflection.set_type(&owner, widened)?;
					tracing::debug!(from = ?own, to = ?widened, ?parent, "owner type widened");
				}
				self.widened.store(widened.as_u32(), Ordering::Release);
			}
		}

		self.capabilities.store(Arc::new(next));
		Ok(added)
	}

	pub fn append_handler(&self, handler: &Handle) {
		let mut chain = self.chain.lock();
		chain.append(handler);
		self.invalidate();
	}

	pub fn append_handlers<'a>(&self, handlers: impl IntoIterator<Item = &'a Handle>) {
		let mut chain = self.chain.lock();
		let before = chain.len();
		chain.append_all(handlers);
		if chain.len() != before {
			self.invalidate();
		}
	}

	/// Inserts `handler` at priority index `index` (0 is queried first).
	///
	/// # Panics
	///
	/// Panics if `index` exceeds the chain length.
	pub fn insert_handler(&self, index: usize, handler: &Handle) {
		let mut chain = self.chain.lock();
		chain.insert(index, handler);
		self.invalidate();
	}

	/// # Panics
	///
	/// Panics if `index` exceeds the chain length.
	pub fn insert_handlers<'a>(&self, index: usize, handlers: impl IntoIterator<Item = &'a Handle>) {
		let mut chain = self.chain.lock();
		let before = chain.len();
		chain.insert_all(index, handlers);
		if chain.len() != before {
			self.invalidate();
		}
	}

	pub fn remove_handler(&self, handler: &Handle) -> Option<Handle> {
		let mut chain = self.chain.lock();
		let removed = chain.remove(handler)?;
		self.invalidate();
		Some(removed)
	}

	pub fn remove_handlers<'a>(&self, handlers: impl IntoIterator<Item = &'a Handle>) -> Vec<Handle> {
		let mut chain = self.chain.lock();
		let removed: Vec<Handle> = handlers.into_iter().filter_map(|h| chain.remove(h)).collect();
		if !removed.is_empty() {
			self.invalidate();
		}
		removed
	}

	/// Removes the entry at priority index `index`.
	pub fn remove_handler_at(&self, index: usize) -> Option<Handle> {
		let mut chain = self.chain.lock();
		if index >= chain.len() {
			return None;
		}
		let removed = chain.remove_at(index);
		self.invalidate();
		removed
	}

	pub fn contains_handler(&self, handler: &Handle) -> bool {
		self.chain.lock().contains(handler)
	}

	/// Live handlers in priority order.
	pub fn handlers(&self) -> Vec<Handle> {
		self.chain.lock().live()
	}

	/// The memoized resolutions.
	pub fn cache(&self) -> &DispatchCache {
		&self.cache
	}

	/// Flushes the cache now if a flush is pending.
	pub fn flush_pending(&self) -> bool {
		self.cache.flush_if_dirty()
	}

	/// Returns the object `message` would be dispatched to: a chained
	/// handler, else the owner if its own type implements `message`.
	pub fn resolve(&self, message: &MessageId) -> Option<Handle> {
		if !self.declares(message) {
			return None;
		}
		self.resolve_declared(message)
	}

	/// Returns true if `message` resolves to a handler or to the owner.
	/// Messages outside the registered capabilities are answered by the
	/// owner's own type alone.
	pub fn responds_to(&self, message: &MessageId) -> bool {
		let responds = if self.declares(message) {
			self.resolve_declared(message).is_some()
		} else {
			self.own_fallback(message).is_some()
		};
		if self.config.trace.responding {
			tracing::trace!(%message, responds, "embedded responds_to");
		}
		responds
	}

	/// Sends `message` to the resolved object, falling through to the owner's
	/// own behavior when nothing resolves.
	pub fn send(&self, message: &MessageId, args: &[Value]) -> Result<Value, SendError> {
		if let Some(target) = self.resolve(message) {
			if self.config.trace.forwarding {
				tracing::trace!(%message, target = ?target, "forwarding message");
			}
			return self.reflection.send(&target, message, args);
		}
		match self.owner.upgrade() {
			Some(owner) => self.reflection.send(&owner, message, args),
			None => Err(SendError::Unrecognized {
				type_name: self
					.reflection
					.type_name(self.base_type)
					.map(|n| n.to_string())
					.unwrap_or_default(),
				message: message.clone(),
			}),
		}
	}

	/// The attach-time type, or the owner's current type when it was
	/// retargeted below the attach-time type by someone else.
	fn widening_parent(&self, own: TypeDescriptor) -> TypeDescriptor {
		let last = TypeDescriptor::from_u32(self.widened.load(Ordering::Acquire));
		if own != last && own != self.base_type && self.reflection.is_subtype_of(own, self.base_type) {
			own
		} else {
			self.base_type
		}
	}

	fn declares(&self, message: &MessageId) -> bool {
		self.capabilities
			.load()
			.iter()
			.any(|c| self.reflection.belongs_to(message, c))
	}

	fn resolve_declared(&self, message: &MessageId) -> Option<Handle> {
		// A flush queued on a loop that never turns must not pin stale
		// entries; the queued task then finds the cache clean.
		self.cache.flush_if_dirty();

		let from_chain = match self.cache.lookup(message) {
			CacheLookup::Hit(handler) => Some(handler),
			CacheLookup::NoHandler => None,
			CacheLookup::Miss => {
				let mut chain = self.chain.lock();
				let reflection = &*self.reflection;
				let found = chain.find(|h| reflection.implements(reflection.type_of(h), message));
				let entry = match &found {
					Some(handler) => CacheEntry::Resolved(WeakHandle::new(handler)),
					None => CacheEntry::NoHandler,
				};
				self.cache.store(message, entry);
				if self.config.trace.dispatching {
					tracing::trace!(%message, resolved = found.is_some(), "dispatch table rebuilt entry");
				}
				found
			}
		};

		from_chain.or_else(|| self.own_fallback(message))
	}

	fn own_fallback(&self, message: &MessageId) -> Option<Handle> {
		self.owner
			.upgrade()
			.filter(|owner| self.reflection.implements(self.reflection.type_of(owner), message))
	}

	fn invalidate(&self) {
		let scheduled = self
			.cache
			.invalidate_later(self.config.invalidation_timing, self.config.invalidation_mode.clone());
		if scheduled {
			tracing::trace!("dispatch cache invalidation scheduled");
		}
	}
}

impl std::fmt::Debug for EmbeddedDispatch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EmbeddedDispatch")
			.field("owner", &self.owner)
			.field("base_type", &self.base_type)
			.field("capabilities", &self.capabilities.load_full())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests;
