//! Capability-scoped forwarding proxy.
//!
//! # Role
//!
//! A [`ForwardingProxy`] is a fresh object whose synthesized type declares a
//! caller-chosen capability set. It implements none of their messages itself;
//! each message that belongs to one of its capabilities is routed to the first
//! live handler in its [`HandlerChain`] that implements it, then to the
//! receiver. A proxy may instead be scoped to an explicit message list
//! ([`ProxyScope::Messages`]); it is then an instance of the proxy base type
//! and no type is synthesized.
//!
//! # Invariants
//!
//! - Messages outside the proxy's scope never resolve, whatever the handlers
//!   implement.
//! - `resolve` and `responds_to` walk the chain identically, purging the dead
//!   entries they pass.
//! - Chain and receiver mutate under one per-proxy lock.

use std::sync::Arc;

use parking_lot::Mutex;
use relay_reflect::{Capability, Handle, MessageId, Object, ReflectError, Reflection, SendError, TypeDescriptor, Value};
use smallvec::SmallVec;

use crate::chain::HandlerChain;
use crate::config::TraceConfig;
use crate::context::Interception;
use crate::handle::WeakHandle;
use crate::types::{CapabilitySet, canonical};

/// The messages a proxy forwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyScope {
	/// Every message declared by these capabilities, sorted.
	Capabilities(CapabilitySet),
	/// Exactly these messages, sorted.
	Messages(SmallVec<[MessageId; 4]>),
}

impl ProxyScope {
	fn contains(&self, reflection: &dyn Reflection, message: &MessageId) -> bool {
		match self {
			Self::Capabilities(capabilities) => capabilities.iter().any(|c| reflection.belongs_to(message, c)),
			Self::Messages(messages) => messages.binary_search(message).is_ok(),
		}
	}
}

#[derive(Default)]
struct ProxyState {
	chain: HandlerChain,
	receiver: WeakHandle,
}

/// Standalone object forwarding a capability set to a chain of handlers.
pub struct ForwardingProxy {
	object: Handle,
	reflection: Arc<dyn Reflection>,
	scope: ProxyScope,
	state: Mutex<ProxyState>,
	trace: TraceConfig,
}

impl ForwardingProxy {
	/// Creates a proxy conforming to `capabilities`.
	///
	/// Proxies requesting the same set, in any order, share one synthesized
	/// type.
	pub fn create<'a>(
		ctx: &Interception,
		capabilities: impl IntoIterator<Item = &'a Capability>,
	) -> Result<Self, ReflectError> {
		let capabilities = canonical(capabilities);
		let ty = ctx.types().type_for(ctx.proxy_base_type(), &capabilities)?;
		tracing::debug!(?ty, capabilities = capabilities.len(), "forwarding proxy created");
		Ok(Self {
			object: Object::new(ty),
			reflection: Arc::clone(ctx.reflection()),
			scope: ProxyScope::Capabilities(capabilities),
			state: Mutex::new(ProxyState::default()),
			trace: ctx.config().trace,
		})
	}

	/// Creates a proxy forwarding exactly `messages`, independent of any
	/// capability.
	pub fn for_messages<M: Into<MessageId>>(ctx: &Interception, messages: impl IntoIterator<Item = M>) -> Self {
		let mut messages: SmallVec<[MessageId; 4]> = messages.into_iter().map(Into::into).collect();
		messages.sort_unstable();
		messages.dedup();
		tracing::debug!(messages = messages.len(), "message-scoped proxy created");
		Self {
			object: Object::new(ctx.proxy_base_type()),
			reflection: Arc::clone(ctx.reflection()),
			scope: ProxyScope::Messages(messages),
			state: Mutex::new(ProxyState::default()),
			trace: ctx.config().trace,
		}
	}

	/// The proxy object itself.
	pub fn object(&self) -> &Handle {
		&self.object
	}

	/// Current type of the proxy object.
	pub fn type_descriptor(&self) -> TypeDescriptor {
		self.reflection.type_of(&self.object)
	}

	pub fn scope(&self) -> &ProxyScope {
		&self.scope
	}

	/// Requested capabilities, sorted. Empty for a message-scoped proxy.
	pub fn capabilities(&self) -> &[Capability] {
		match &self.scope {
			ProxyScope::Capabilities(capabilities) => capabilities.as_slice(),
			ProxyScope::Messages(_) => &[],
		}
	}

	/// Forwarded messages, sorted. Empty for a capability-scoped proxy.
	pub fn messages(&self) -> &[MessageId] {
		match &self.scope {
			ProxyScope::Capabilities(_) => &[],
			ProxyScope::Messages(messages) => messages.as_slice(),
		}
	}

	/// Replaces the fallback handler.
	pub fn set_receiver(&self, receiver: Option<&Handle>) {
		self.state.lock().receiver = receiver.map(WeakHandle::new).unwrap_or_default();
	}

	/// Returns the fallback handler if it is still alive.
	pub fn receiver(&self) -> Option<Handle> {
		self.state.lock().receiver.upgrade()
	}

	/// Pushes `handler` as the new highest-priority entry.
	pub fn append_handler(&self, handler: &Handle) {
		self.state.lock().chain.append(handler);
	}

	/// Appends every handler in order; the last one ends up first.
	pub fn append_handlers<'a>(&self, handlers: impl IntoIterator<Item = &'a Handle>) {
		self.state.lock().chain.append_all(handlers);
	}

	/// Inserts `handler` at priority index `index` (0 is queried first).
	///
	/// # Panics
	///
	/// Panics if `index` exceeds the chain length.
	pub fn insert_handler(&self, index: usize, handler: &Handle) {
		self.state.lock().chain.insert(index, handler);
	}

	/// Inserts `handlers` from priority index `index` on.
	///
	/// # Panics
	///
	/// Panics if `index` exceeds the chain length.
	pub fn insert_handlers<'a>(&self, index: usize, handlers: impl IntoIterator<Item = &'a Handle>) {
		self.state.lock().chain.insert_all(index, handlers);
	}

	/// Removes `handler` by identity, returning it if it was chained.
	pub fn remove_handler(&self, handler: &Handle) -> Option<Handle> {
		self.state.lock().chain.remove(handler)
	}

	/// Removes every handler in `handlers`; returns those that were chained.
	pub fn remove_handlers<'a>(&self, handlers: impl IntoIterator<Item = &'a Handle>) -> Vec<Handle> {
		let mut state = self.state.lock();
		handlers
			.into_iter()
			.filter_map(|h| state.chain.remove(h))
			.collect()
	}

	/// Removes the entry at priority index `index`.
	pub fn remove_handler_at(&self, index: usize) -> Option<Handle> {
		self.state.lock().chain.remove_at(index)
	}

	/// Returns true if `handler` is chained, dead or alive.
	pub fn contains_handler(&self, handler: &Handle) -> bool {
		self.state.lock().chain.contains(handler)
	}

	/// Live handlers in priority order.
	pub fn handlers(&self) -> Vec<Handle> {
		self.state.lock().chain.live()
	}

	/// Number of chain entries, dead ones included until purged.
	pub fn chain_len(&self) -> usize {
		self.state.lock().chain.len()
	}

	/// Returns the handler `message` would be forwarded to.
	pub fn resolve(&self, message: &MessageId) -> Option<Handle> {
		if !self.declares(message) {
			if self.trace.dispatching {
				tracing::trace!(%message, "message outside proxy scope");
			}
			return None;
		}

		let mut state = self.state.lock();
		let reflection = &*self.reflection;
		let implements = |h: &Handle| reflection.implements(reflection.type_of(h), message);
		let resolved = state
			.chain
			.find(implements)
			.or_else(|| state.receiver.upgrade().filter(implements));
		drop(state);

		if self.trace.dispatching {
			tracing::trace!(%message, resolved = resolved.is_some(), "proxy resolution");
		}
		resolved
	}

	/// Returns true if some handler would receive `message`.
	pub fn responds_to(&self, message: &MessageId) -> bool {
		let responds = self.resolve(message).is_some();
		if self.trace.responding {
			tracing::trace!(%message, responds, "proxy responds_to");
		}
		responds
	}

	/// Sends `message` to the resolved handler, or to the proxy itself when
	/// nothing resolves.
	pub fn send(&self, message: &MessageId, args: &[Value]) -> Result<Value, SendError> {
		match self.resolve(message) {
			Some(handler) => {
				if self.trace.forwarding {
					tracing::trace!(%message, handler = ?handler, "forwarding message");
				}
				self.reflection.send(&handler, message, args)
			}
			None => self.reflection.send(&self.object, message, args),
		}
	}

	fn declares(&self, message: &MessageId) -> bool {
		self.scope.contains(&*self.reflection, message)
	}
}

impl std::fmt::Debug for ForwardingProxy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ForwardingProxy")
			.field("object", &self.object)
			.field("scope", &self.scope)
			.finish_non_exhaustive()
	}
}
