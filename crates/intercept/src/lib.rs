//! Dynamic message interception over a [`relay_reflect::Reflection`] service.
//!
//! - [`ForwardingProxy`]: a fresh object conforming to caller-chosen
//!   capabilities that forwards their messages through a handler chain.
//! - [`EmbeddedDispatch`]: the same forwarding embedded into an existing
//!   object, with a coalesced [`DispatchCache`].
//! - [`SynthesizedTypes`]: deduplicating factory for the types both need.
//! - [`Replacement`]: one-shot implementation swaps and exchanges.
//! - [`Multicast`]: a deduplicated weak delegate list that fans messages out.
//!
//! Everything hangs off an [`Interception`] context.

pub mod cache;
pub mod chain;
pub mod config;
mod context;
pub mod error;
mod graft;
mod handle;
pub mod mixin;
pub mod multicast;
pub mod proxy;
pub mod swizzle;
pub mod types;

#[cfg(test)]
mod testing;

pub use cache::{CacheEntry, CacheLookup, DispatchCache};
pub use chain::HandlerChain;
pub use config::{DispatchConfig, TraceConfig};
pub use context::{InitError, Interception};
pub use error::{ConfigError, GraftError, ReplacementError};
pub use handle::WeakHandle;
pub use mixin::{EmbeddedDispatch, MixinTable};
pub use multicast::Multicast;
pub use proxy::{ForwardingProxy, ProxyScope};
pub use swizzle::{OriginalSlot, Replacement, ReplacementKey, ReplacementLedger, ReplacementTarget, SwizzleRecipe};
pub use types::{Signature, SynthesizedTypes};
