//! One-shot replacement of a type's implementations.
//!
//! # Role
//!
//! A [`Replacement`] describes either an implementation swap (install a new
//! implementation for one message and capture the displaced one in an
//! [`OriginalSlot`]) or an exchange of the implementations of two messages.
//! [`Replacement::perform`] applies it at most once per interception context.
//!
//! # Invariants
//!
//! - Identity is the [`ReplacementKey`]: target type, message(s) and the
//!   class-side flag. Two requests with equal keys share one gate.
//! - Exactly one caller runs the mutation, even under concurrent first
//!   calls; every other caller observes the same outcome.
//! - An exchange keeps its request order, so exchanging `b` with `a` is a
//!   distinct replacement from exchanging `a` with `b`.

use std::fmt;
use std::sync::Arc;

use relay_reflect::{Implementation, MessageId, ReflectError, Reflection, TypeDescriptor};
use smallvec::smallvec;

use crate::error::ReplacementError;

mod ledger;
mod recipe;

pub use ledger::{ReplacementKey, ReplacementLedger};
pub use recipe::{OriginalSlot, SwizzleRecipe};

/// Which side of a type a replacement patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplacementTarget {
	/// Implementations run by instances of the type.
	Instance(TypeDescriptor),
	/// Implementations run by the type itself, held by its meta type.
	Class(TypeDescriptor),
}

impl ReplacementTarget {
	/// The instance type named by the target.
	pub fn type_descriptor(self) -> TypeDescriptor {
		match self {
			Self::Instance(ty) | Self::Class(ty) => ty,
		}
	}

	pub fn is_meta(self) -> bool {
		matches!(self, Self::Class(_))
	}

	fn sigil(self) -> char {
		if self.is_meta() { '+' } else { '-' }
	}
}

enum ReplacementKind {
	Implementation {
		message: MessageId,
		slot: &'static OriginalSlot,
		replacement: Implementation,
	},
	Exchange {
		a: MessageId,
		b: MessageId,
	},
}

/// A one-shot implementation replacement.
pub struct Replacement {
	reflection: Arc<dyn Reflection>,
	ledger: Arc<ReplacementLedger>,
	target: ReplacementTarget,
	kind: ReplacementKind,
}

impl Replacement {
	pub(crate) fn implementation(
		reflection: Arc<dyn Reflection>,
		ledger: Arc<ReplacementLedger>,
		target: ReplacementTarget,
		message: MessageId,
		slot: &'static OriginalSlot,
		replacement: Implementation,
	) -> Self {
		Self {
			reflection,
			ledger,
			target,
			kind: ReplacementKind::Implementation {
				message,
				slot,
				replacement,
			},
		}
	}

	pub(crate) fn from_recipe<R: SwizzleRecipe>(
		reflection: Arc<dyn Reflection>,
		ledger: Arc<ReplacementLedger>,
		target: ReplacementTarget,
		message: MessageId,
	) -> Self {
		Self::implementation(reflection, ledger, target, message, R::original(), R::replacement())
	}

	pub(crate) fn exchange(
		reflection: Arc<dyn Reflection>,
		ledger: Arc<ReplacementLedger>,
		target: ReplacementTarget,
		a: MessageId,
		b: MessageId,
	) -> Self {
		Self {
			reflection,
			ledger,
			target,
			kind: ReplacementKind::Exchange { a, b },
		}
	}

	pub fn target(&self) -> ReplacementTarget {
		self.target
	}

	pub fn key(&self) -> ReplacementKey {
		let messages = match &self.kind {
			ReplacementKind::Implementation { message, .. } => smallvec![message.clone()],
			ReplacementKind::Exchange { a, b } => smallvec![a.clone(), b.clone()],
		};
		ReplacementKey {
			ty: self.target.type_descriptor(),
			is_meta: self.target.is_meta(),
			messages,
		}
	}

	/// Returns true if an equivalent replacement already ran successfully.
	pub fn is_applied(&self) -> bool {
		self.ledger.is_applied(&self.key())
	}

	/// Applies the replacement unless an equivalent one already ran.
	pub fn perform(&self) -> Result<(), ReplacementError> {
		let result = self.ledger.run_once(self.key(), || self.to_string(), || self.apply());
		match &result {
			Ok(()) => tracing::debug!(replacement = %self, "replacement applied"),
			Err(ReplacementError::AlreadyApplied { .. }) => {
				tracing::warn!(replacement = %self, "replacement already applied");
			}
			Err(err) => tracing::debug!(replacement = %self, error = %err, "replacement failed"),
		}
		result
	}

	fn apply(&self) -> Result<(), ReplacementError> {
		let ty = self.patched_type()?;
		match &self.kind {
			ReplacementKind::Implementation {
				message,
				slot,
				replacement,
			} => {
				let original = self.reflection.get_implementation(ty, message);
				if !slot.fill(original) {
					tracing::warn!(replacement = %self, "original slot already written; keeping first value");
				}
				if self.reflection.owns_implementation(ty, message) {
					self.reflection.replace_implementation(ty, message, replacement.clone())?;
				} else {
					self.reflection.add_implementation(ty, message, replacement.clone())?;
				}
				Ok(())
			}
			ReplacementKind::Exchange { a, b } => {
				for message in [a, b] {
					if !self.reflection.implements(ty, message) {
						return Err(ReplacementError::MissingImplementation {
							type_name: self.type_label(),
							message: message.clone(),
						});
					}
				}
				self.reflection.exchange_implementations(ty, a, b)?;
				Ok(())
			}
		}
	}

	fn patched_type(&self) -> Result<TypeDescriptor, ReflectError> {
		match self.target {
			ReplacementTarget::Instance(ty) => Ok(ty),
			ReplacementTarget::Class(ty) => self
				.reflection
				.meta_type(ty)
				.ok_or(ReflectError::UnknownType(ty)),
		}
	}

	fn type_label(&self) -> String {
		let ty = self.target.type_descriptor();
		self.reflection
			.type_name(ty)
			.map(|n| n.to_string())
			.unwrap_or_else(|| format!("{ty:?}"))
	}
}

impl PartialEq for Replacement {
	fn eq(&self, other: &Self) -> bool {
		self.key() == other.key()
	}
}

impl Eq for Replacement {}

impl std::hash::Hash for Replacement {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.key().hash(state);
	}
}

impl fmt::Display for Replacement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let sigil = self.target.sigil();
		let name = self.type_label();
		match &self.kind {
			ReplacementKind::Implementation { message, .. } => write!(f, "[{name} {sigil}{message}]"),
			ReplacementKind::Exchange { a, b } => write!(f, "[{name} {sigil}{a} <-> {sigil}{b}]"),
		}
	}
}

impl fmt::Debug for Replacement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Replacement")
			.field("target", &self.target)
			.field("key", &self.key())
			.finish_non_exhaustive()
	}
}
