//! The reflection service consumed by the interception layer.

use std::sync::Arc;

use crate::error::{ReflectError, SendError};
use crate::ids::{Capability, MessageId, TypeDescriptor};
use crate::implementation::Implementation;
use crate::object::Object;
use crate::value::Value;

/// Answers type, capability and implementation queries, and performs the
/// handful of type mutations dynamic dispatch needs.
///
/// "Own" queries look at a single type; every other query walks the parent
/// chain.
pub trait Reflection: Send + Sync {
	/// Returns the root of the type hierarchy.
	fn root_type(&self) -> TypeDescriptor;

	/// Returns the current type of `object`.
	fn type_of(&self, object: &Object) -> TypeDescriptor {
		object.type_descriptor()
	}

	/// Retargets `object` to `ty`.
	fn set_type(&self, object: &Object, ty: TypeDescriptor) -> Result<(), ReflectError>;

	/// Returns the registered name of `ty`.
	fn type_name(&self, ty: TypeDescriptor) -> Option<Arc<str>>;

	/// Looks up an instance type by name.
	fn lookup_type(&self, name: &str) -> Option<TypeDescriptor>;

	/// Returns the parent of `ty`, or `None` for the root.
	fn parent(&self, ty: TypeDescriptor) -> Option<TypeDescriptor>;

	/// Returns true if `ty` holds class-side implementations.
	fn is_meta(&self, ty: TypeDescriptor) -> bool;

	/// Returns the class-side companion of an instance type.
	fn meta_type(&self, ty: TypeDescriptor) -> Option<TypeDescriptor>;

	/// Returns true if `ty` or an ancestor implements `message`.
	fn implements(&self, ty: TypeDescriptor, message: &MessageId) -> bool;

	/// Returns true if `ty` itself carries an implementation of `message`.
	fn owns_implementation(&self, ty: TypeDescriptor, message: &MessageId) -> bool;

	/// Returns true if `message` is declared by `capability` or a capability
	/// it inherits.
	fn belongs_to(&self, message: &MessageId, capability: &Capability) -> bool;

	/// Returns the messages declared by `capability` and its ancestors.
	fn capability_messages(&self, capability: &Capability) -> Vec<MessageId>;

	/// Returns the capabilities declared directly on `ty`.
	fn declared_capabilities(&self, ty: TypeDescriptor) -> Vec<Capability>;

	/// Returns true if `ty` or an ancestor declares `capability` or a
	/// capability inheriting it.
	fn conforms_to(&self, ty: TypeDescriptor, capability: &Capability) -> bool;

	/// Registers a new named type extending `parent`.
	fn create_subtype(&self, parent: TypeDescriptor, name: &str) -> Result<TypeDescriptor, ReflectError>;

	/// Declares conformance of `ty` to `capability` without adding behavior.
	fn add_capability(&self, ty: TypeDescriptor, capability: &Capability) -> Result<(), ReflectError>;

	/// Returns the implementation `ty` would run for `message`.
	fn get_implementation(&self, ty: TypeDescriptor, message: &MessageId) -> Option<Implementation>;

	/// Adds an implementation to `ty`; returns false if `ty` already owns one.
	fn add_implementation(
		&self,
		ty: TypeDescriptor,
		message: &MessageId,
		imp: Implementation,
	) -> Result<bool, ReflectError>;

	/// Replaces (or installs) the implementation `ty` owns for `message` and
	/// returns the one it owned before.
	fn replace_implementation(
		&self,
		ty: TypeDescriptor,
		message: &MessageId,
		imp: Implementation,
	) -> Result<Option<Implementation>, ReflectError>;

	/// Swaps the implementations `ty` runs for `a` and `b`.
	fn exchange_implementations(
		&self,
		ty: TypeDescriptor,
		a: &MessageId,
		b: &MessageId,
	) -> Result<(), ReflectError>;

	/// Installs `imp` on `ty`, replacing if `ty` owns an implementation and
	/// adding otherwise.
	fn set_implementation(
		&self,
		ty: TypeDescriptor,
		message: &MessageId,
		imp: Implementation,
	) -> Result<(), ReflectError> {
		if self.owns_implementation(ty, message) {
			self.replace_implementation(ty, message, imp)?;
		} else {
			self.add_implementation(ty, message, imp)?;
		}
		Ok(())
	}

	/// Returns true if `ty` is `ancestor` or descends from it.
	fn is_subtype_of(&self, ty: TypeDescriptor, ancestor: TypeDescriptor) -> bool {
		let mut cursor = Some(ty);
		while let Some(current) = cursor {
			if current == ancestor {
				return true;
			}
			cursor = self.parent(current);
		}
		false
	}

	/// Invokes the implementation `receiver`'s type runs for `message`.
	fn send(&self, receiver: &Object, message: &MessageId, args: &[Value]) -> Result<Value, SendError> {
		let ty = self.type_of(receiver);
		match self.get_implementation(ty, message) {
			Some(imp) => Ok(imp.invoke(receiver, args)),
			None => Err(SendError::Unrecognized {
				type_name: self.type_name(ty).map(|n| n.to_string()).unwrap_or_default(),
				message: message.clone(),
			}),
		}
	}
}
