//! The entry point tying a reflection service to the interception machinery.

use std::sync::Arc;

use relay_reflect::{Capability, Handle, Implementation, MessageId, ReflectError, Reflection, TypeDescriptor};

use crate::config::DispatchConfig;
use crate::error::{ConfigError, GraftError};
use crate::graft::Grafts;
use crate::mixin::{EmbeddedDispatch, MixinTable};
use crate::proxy::ForwardingProxy;
use crate::swizzle::{OriginalSlot, Replacement, ReplacementLedger, ReplacementTarget, SwizzleRecipe};
use crate::types::SynthesizedTypes;

/// Errors raised while setting up an [`Interception`].
#[derive(Debug, thiserror::Error)]
pub enum InitError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Reflect(#[from] ReflectError),
}

/// Owns the synthesized-type registry, the replacement ledger, the mixin side
/// table and the graft registry for one reflection service.
pub struct Interception {
	reflection: Arc<dyn Reflection>,
	config: Arc<DispatchConfig>,
	types: Arc<SynthesizedTypes>,
	proxy_base: TypeDescriptor,
	ledger: Arc<ReplacementLedger>,
	mixins: MixinTable,
	grafts: Grafts,
}

impl Interception {
	/// Validates `config` and registers the proxy base type unless the
	/// service already knows a type by that name.
	pub fn new(reflection: Arc<dyn Reflection>, config: DispatchConfig) -> Result<Self, InitError> {
		config.validate()?;
		let proxy_base = match reflection.lookup_type(&config.proxy_type_name) {
			Some(ty) => ty,
			None => reflection.create_subtype(reflection.root_type(), &config.proxy_type_name)?,
		};
		tracing::debug!(
			proxy_type = %config.proxy_type_name,
			?proxy_base,
			max_salt_probes = config.max_salt_probes,
			"interception context ready"
		);
		Ok(Self {
			types: Arc::new(SynthesizedTypes::new(
				Arc::clone(&reflection),
				config.max_salt_probes,
			)),
			grafts: Grafts::new(Arc::clone(&reflection), config.max_salt_probes),
			reflection,
			config: Arc::new(config),
			proxy_base,
			ledger: Arc::new(ReplacementLedger::new()),
			mixins: MixinTable::new(),
		})
	}

	pub fn reflection(&self) -> &Arc<dyn Reflection> {
		&self.reflection
	}

	pub fn config(&self) -> &DispatchConfig {
		&self.config
	}

	pub fn types(&self) -> &SynthesizedTypes {
		&self.types
	}

	/// Parent of every synthesized proxy type.
	pub fn proxy_base_type(&self) -> TypeDescriptor {
		self.proxy_base
	}

	pub fn ledger(&self) -> &ReplacementLedger {
		&self.ledger
	}

	pub fn mixins(&self) -> &MixinTable {
		&self.mixins
	}

	/// Creates a forwarding proxy conforming to `capabilities`.
	pub fn create_proxy<'a>(
		&self,
		capabilities: impl IntoIterator<Item = &'a Capability>,
	) -> Result<ForwardingProxy, ReflectError> {
		ForwardingProxy::create(self, capabilities)
	}

	/// Creates a forwarding proxy for exactly `messages`.
	pub fn create_message_proxy<M: Into<MessageId>>(&self, messages: impl IntoIterator<Item = M>) -> ForwardingProxy {
		ForwardingProxy::for_messages(self, messages)
	}

	/// Returns the dispatch state embedded in `owner`, attaching it first if
	/// needed.
	pub fn attach_dispatch(&self, owner: &Handle) -> Arc<EmbeddedDispatch> {
		self.mixins
			.attach(owner, &self.reflection, &self.types, &self.config)
	}

	pub fn dispatch_for(&self, owner: &Handle) -> Option<Arc<EmbeddedDispatch>> {
		self.mixins.get(owner)
	}

	pub fn detach_dispatch(&self, owner: &Handle) -> Option<Arc<EmbeddedDispatch>> {
		self.mixins.detach(owner)
	}

	/// Describes replacing `target`'s implementation of `message` with
	/// `replacement`, capturing the displaced one in `slot`.
	pub fn replace(
		&self,
		target: ReplacementTarget,
		message: impl Into<MessageId>,
		slot: &'static OriginalSlot,
		replacement: Implementation,
	) -> Replacement {
		Replacement::implementation(
			Arc::clone(&self.reflection),
			Arc::clone(&self.ledger),
			target,
			message.into(),
			slot,
			replacement,
		)
	}

	/// Describes the replacement defined by recipe `R`.
	pub fn replace_with<R: SwizzleRecipe>(
		&self,
		target: ReplacementTarget,
		message: impl Into<MessageId>,
	) -> Replacement {
		Replacement::from_recipe::<R>(
			Arc::clone(&self.reflection),
			Arc::clone(&self.ledger),
			target,
			message.into(),
		)
	}

	/// Describes swapping the implementations of `a` and `b` on `target`.
	pub fn exchange(
		&self,
		target: ReplacementTarget,
		a: impl Into<MessageId>,
		b: impl Into<MessageId>,
	) -> Replacement {
		Replacement::exchange(
			Arc::clone(&self.reflection),
			Arc::clone(&self.ledger),
			target,
			a.into(),
			b.into(),
		)
	}

	/// Copies `grafting_type`'s implementations of `capability` onto `object`
	/// alone. Returns the object's new type.
	pub fn graft(
		&self,
		capability: &Capability,
		grafting_type: TypeDescriptor,
		object: &Handle,
	) -> Result<TypeDescriptor, GraftError> {
		self.grafts.graft(capability, grafting_type, object)
	}

	/// Restores `object`'s type from before its first graft. Returns false if
	/// it was never grafted.
	pub fn ungraft_all(&self, object: &Handle) -> Result<bool, GraftError> {
		self.grafts.ungraft_all(object)
	}
}

impl std::fmt::Debug for Interception {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Interception")
			.field("config", &self.config)
			.field("proxy_base", &self.proxy_base)
			.field("types", &self.types)
			.field("mixins", &self.mixins)
			.finish_non_exhaustive()
	}
}
