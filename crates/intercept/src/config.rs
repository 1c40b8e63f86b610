//! Dispatch configuration.

use relay_run_loop::{RunLoopMode, ScheduleTiming};
use serde::Deserialize;

use crate::error::ConfigError;

/// Toggles for per-message trace events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
	/// Emit an event for every forwarded send.
	pub forwarding: bool,
	/// Emit an event for every `responds_to` answer.
	pub responding: bool,
	/// Emit an event for every resolution that walks the handler chain.
	pub dispatching: bool,
}

/// Configuration shared by proxies, mixins and the type registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
	/// Name of the base type every proxy type is synthesized from.
	pub proxy_type_name: String,
	/// Upper bound on salt probing when naming synthesized types.
	pub max_salt_probes: u32,
	/// Run-loop timing of deferred dispatch-cache invalidation.
	pub invalidation_timing: ScheduleTiming,
	/// Run-loop mode of deferred dispatch-cache invalidation.
	pub invalidation_mode: RunLoopMode,
	/// Per-message trace toggles.
	pub trace: TraceConfig,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			proxy_type_name: "RelayForwardingProxy".to_string(),
			max_salt_probes: 1024,
			invalidation_timing: ScheduleTiming::NextLoopBegan,
			invalidation_mode: RunLoopMode::Common,
			trace: TraceConfig::default(),
		}
	}
}

impl DispatchConfig {
	/// Parses and validates a TOML document. Missing keys take defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Checks invariants serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.proxy_type_name.trim().is_empty() {
			return Err(ConfigError::Invalid("proxy_type_name must not be empty".into()));
		}
		if self.max_salt_probes == 0 {
			return Err(ConfigError::Invalid("max_salt_probes must be at least 1".into()));
		}
		Ok(())
	}
}
