//! Deduplicating factory for synthesized types.
//!
//! # Role
//!
//! Proxies and mixins need a type that declares an arbitrary capability set.
//! [`SynthesizedTypes::type_for`] returns one, creating it through the
//! [`Reflection`] service only when no suitable type exists yet. Types are
//! named after their canonical [`Signature`], with a numeric salt appended
//! when the plain name is taken by an unsuitable type.
//!
//! # Invariants
//!
//! - Capability order and duplicates never affect the result.
//! - At most one type is synthesized per (parent, capability set); probing and
//!   creation run under one process-wide lock.
//! - Records are never removed.
//! - Exhausting `max_salt_probes` is a contract violation and panics.

use std::sync::Arc;

use parking_lot::Mutex;
use relay_reflect::{Capability, ReflectError, Reflection, TypeDescriptor};
use rustc_hash::FxHashMap as HashMap;

mod signature;

pub use signature::{CapabilitySet, DELIMITER, Signature, canonical, salted};

/// Serializes type synthesis across every registry in the process.
static SYNTHESIS: Mutex<()> = parking_lot::const_mutex(());

type RecordKey = (TypeDescriptor, Box<str>);

/// Registry of synthesized types keyed by (parent, capability signature).
pub struct SynthesizedTypes {
	reflection: Arc<dyn Reflection>,
	max_salt_probes: u32,
	records: Mutex<HashMap<RecordKey, TypeDescriptor>>,
}

impl SynthesizedTypes {
	pub fn new(reflection: Arc<dyn Reflection>, max_salt_probes: u32) -> Self {
		Self {
			reflection,
			max_salt_probes,
			records: Mutex::new(HashMap::default()),
		}
	}

	/// Number of recorded signatures.
	pub fn len(&self) -> usize {
		self.records.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.lock().is_empty()
	}

	/// Returns the recorded type for `capabilities` under `parent` without
	/// synthesizing anything.
	pub fn lookup<'a>(
		&self,
		parent: TypeDescriptor,
		capabilities: impl IntoIterator<Item = &'a Capability>,
	) -> Option<TypeDescriptor> {
		let capabilities = canonical(capabilities);
		let parent_name = self.reflection.type_name(parent)?;
		let signature = Signature::new(&parent_name, &capabilities);
		self.records
			.lock()
			.get(&(parent, Box::from(signature.capabilities())))
			.copied()
	}

	/// Returns a type extending `parent` that conforms to every capability in
	/// `capabilities`, synthesizing it on first request.
	///
	/// An empty capability set yields `parent` itself.
	///
	/// # Panics
	///
	/// Panics if every probed name up to `max_salt_probes` is taken by a type
	/// that cannot be reused or extended.
	pub fn type_for<'a>(
		&self,
		parent: TypeDescriptor,
		capabilities: impl IntoIterator<Item = &'a Capability>,
	) -> Result<TypeDescriptor, ReflectError> {
		let capabilities = canonical(capabilities);
		if capabilities.is_empty() {
			return Ok(parent);
		}
		let parent_name = self
			.reflection
			.type_name(parent)
			.ok_or(ReflectError::UnknownType(parent))?;
		let signature = Signature::new(&parent_name, &capabilities);
		let key: RecordKey = (parent, Box::from(signature.capabilities()));

		let _synthesis = SYNTHESIS.lock();
		let recorded = self.records.lock().get(&key).copied();
		if let Some(ty) = recorded
			&& self.conforms_to_all(ty, &capabilities)
		{
			return Ok(ty);
		}

		let mut extend_from = None;
		for salt in 0..self.max_salt_probes {
			let name = signature.type_name(salt);
			match self.reflection.lookup_type(&name) {
				Some(ty) if self.reflection.is_subtype_of(ty, parent) => {
					if self.conforms_to_all(ty, &capabilities) {
						tracing::trace!(%signature, salt, ?ty, "reusing registered type");
						self.records.lock().insert(key, ty);
						return Ok(ty);
					}
					extend_from = Some(ty);
				}
				Some(ty) => {
					tracing::trace!(%signature, salt, ?ty, "type name taken by foreign type");
				}
				None => {
					let base = extend_from.unwrap_or(parent);
					let ty = self.reflection.create_subtype(base, &name)?;
					for capability in &capabilities {
						if !self.reflection.conforms_to(ty, capability) {
							self.reflection.add_capability(ty, capability)?;
						}
					}
					tracing::debug!(%signature, salt, ?ty, ?base, "type synthesized");
					self.records.lock().insert(key, ty);
					return Ok(ty);
				}
			}
		}

		tracing::error!(%signature, probes = self.max_salt_probes, "salt probing exhausted");
		panic!(
			"no usable type name for {signature} after {} salt probes",
			self.max_salt_probes
		);
	}

	fn conforms_to_all(&self, ty: TypeDescriptor, capabilities: &[Capability]) -> bool {
		capabilities.iter().all(|c| self.reflection.conforms_to(ty, c))
	}
}

impl std::fmt::Debug for SynthesizedTypes {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SynthesizedTypes")
			.field("max_salt_probes", &self.max_salt_probes)
			.field("records", &self.len())
			.finish_non_exhaustive()
	}
}
