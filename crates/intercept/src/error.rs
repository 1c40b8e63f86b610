use relay_reflect::{MessageId, ReflectError};

/// Errors raised by [`crate::Replacement::perform`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplacementError {
	#[error("replacement {replacement} was already applied")]
	AlreadyApplied { replacement: String },

	#[error("{type_name} does not implement {message}")]
	MissingImplementation { type_name: String, message: MessageId },

	#[error(transparent)]
	Reflect(#[from] ReflectError),
}

/// Errors raised when grafting a capability implementation onto an object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraftError {
	#[error("{type_name} does not conform to {capability}")]
	NotConforming { type_name: String, capability: String },

	#[error(transparent)]
	Reflect(#[from] ReflectError),
}

/// Errors raised while loading a [`crate::DispatchConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to parse dispatch config: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("invalid dispatch config: {0}")]
	Invalid(String),
}
