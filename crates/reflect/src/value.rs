use std::sync::Arc;

/// Argument or return value carried by a dynamic message send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value {
	/// No value.
	#[default]
	Unit,
	/// Boolean value.
	Bool(bool),
	/// Integer value.
	Int(i64),
	/// String value.
	Str(Arc<str>),
}

impl Value {
	/// Returns the boolean value if this is a `Bool` variant.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the integer value if this is an `Int` variant.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the string value if this is a `Str` variant.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(v) => Some(v),
			_ => None,
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Str(Arc::from(v))
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Str(Arc::from(v))
	}
}
