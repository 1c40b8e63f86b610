use crate::ids::{MessageId, TypeDescriptor};

/// Errors raised by reflection queries and type mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReflectError {
	#[error("type name already registered: {0}")]
	DuplicateTypeName(String),

	#[error("unknown type: {0:?}")]
	UnknownType(TypeDescriptor),

	#[error("invalid identifier: {0:?}")]
	InvalidName(String),

	#[error("{type_name} does not implement {message}")]
	MissingImplementation { type_name: String, message: MessageId },
}

/// Errors raised when sending a message to an object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
	#[error("{type_name} does not recognize message {message}")]
	Unrecognized { type_name: String, message: MessageId },

	#[error(transparent)]
	Reflect(#[from] ReflectError),
}
