//! Deduplicated lists of weakly held delegates.
//!
//! A [`Multicast`] is the fan-out counterpart of a handler chain: instead of
//! picking one handler per message, every live delegate that implements a
//! message receives it, in registration order.

use parking_lot::Mutex;
use relay_reflect::{Handle, MessageId, Reflection, Value};

use crate::chain::HandlerChain;

/// Weakly held delegates, each registered at most once.
#[derive(Debug, Default)]
pub struct Multicast {
	chain: Mutex<HandlerChain>,
}

impl Multicast {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `delegate`; returns false if it was already registered.
	pub fn add(&self, delegate: &Handle) -> bool {
		let mut chain = self.chain.lock();
		if chain.contains(delegate) {
			return false;
		}
		chain.append(delegate);
		true
	}

	/// Unregisters `delegate`, returning it if it was registered.
	pub fn remove(&self, delegate: &Handle) -> Option<Handle> {
		self.chain.lock().remove(delegate)
	}

	pub fn contains(&self, delegate: &Handle) -> bool {
		self.chain.lock().contains(delegate)
	}

	/// Live delegates in registration order. Dead entries are dropped.
	pub fn delegates(&self) -> Vec<Handle> {
		let mut chain = self.chain.lock();
		chain.purge();
		let mut live = chain.live();
		live.reverse();
		live
	}

	/// Number of live delegates.
	pub fn len(&self) -> usize {
		let mut chain = self.chain.lock();
		chain.purge();
		chain.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Sends `message` to every live delegate whose type implements it, in
	/// registration order, and collects the replies.
	///
	/// The delegate list is snapshotted first; delegates may add or remove
	/// delegates from inside the call.
	pub fn broadcast(&self, reflection: &dyn Reflection, message: &MessageId, args: &[Value]) -> Vec<Value> {
		let delegates = self.delegates();
		let replies: Vec<Value> = delegates
			.iter()
			.filter(|d| reflection.implements(reflection.type_of(d), message))
			.filter_map(|d| reflection.send(d, message, args).ok())
			.collect();
		tracing::trace!(%message, delegates = delegates.len(), replies = replies.len(), "multicast");
		replies
	}
}
