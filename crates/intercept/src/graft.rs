//! Per-object capability grafting.
//!
//! Grafting retargets a single object to a subtype of its type that carries
//! another type's implementations of one capability's messages. Other
//! instances of the original type are untouched. Grafted subtypes are keyed
//! by (original type, capability to grafting-type table) and reused.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use relay_reflect::{Capability, Handle, Reflection, TypeDescriptor};
use rustc_hash::FxHashMap as HashMap;

use crate::error::GraftError;
use crate::types::salted;

type GraftTable = BTreeMap<Capability, TypeDescriptor>;

struct GraftRecord {
	original: TypeDescriptor,
	table: GraftTable,
}

#[derive(Default)]
struct GraftState {
	/// Grafted type to the type and table it was built from.
	records: HashMap<TypeDescriptor, GraftRecord>,
	by_table: HashMap<(TypeDescriptor, GraftTable), TypeDescriptor>,
}

pub(crate) struct Grafts {
	reflection: Arc<dyn Reflection>,
	max_salt_probes: u32,
	state: Mutex<GraftState>,
}

impl Grafts {
	pub(crate) fn new(reflection: Arc<dyn Reflection>, max_salt_probes: u32) -> Self {
		Self {
			reflection,
			max_salt_probes,
			state: Mutex::new(GraftState::default()),
		}
	}

	pub(crate) fn graft(
		&self,
		capability: &Capability,
		grafting_type: TypeDescriptor,
		object: &Handle,
	) -> Result<TypeDescriptor, GraftError> {
		let mut state = self.state.lock();
		let current = self.reflection.type_of(object);
		for ty in [current, grafting_type] {
			if !self.reflection.conforms_to(ty, capability) {
				return Err(GraftError::NotConforming {
					type_name: self.name_of(ty),
					capability: capability.to_string(),
				});
			}
		}

		let (original, mut table) = match state.records.get(&current) {
			Some(record) => (record.original, record.table.clone()),
			None => (current, GraftTable::new()),
		};
		table.insert(capability.clone(), grafting_type);

		let key = (original, table);
		let existing = state.by_table.get(&key).copied();
		let grafted = match existing {
			Some(ty) => ty,
			None => {
				let ty = self.synthesize(original, &key.1)?;
				state.records.insert(
					ty,
					GraftRecord {
						original,
						table: key.1.clone(),
					},
				);
				state.by_table.insert(key, ty);
				ty
			}
		};

		self.reflection.set_type(object, grafted)?;
		tracing::debug!(%capability, ?grafting_type, ?grafted, "capability grafted");
		Ok(grafted)
	}

	pub(crate) fn ungraft_all(&self, object: &Handle) -> Result<bool, GraftError> {
		let state = self.state.lock();
		let current = self.reflection.type_of(object);
		let Some(record) = state.records.get(&current) else {
			return Ok(false);
		};
		self.reflection.set_type(object, record.original)?;
		tracing::debug!(from = ?current, to = ?record.original, "grafts removed");
		Ok(true)
	}

	/// Creates the grafted subtype of `original` for `table` and installs the
	/// grafted implementations on it.
	fn synthesize(&self, original: TypeDescriptor, table: &GraftTable) -> Result<TypeDescriptor, GraftError> {
		let entries: Vec<String> = table
			.iter()
			.map(|(capability, ty)| format!("{capability}={}", self.name_of(*ty)))
			.collect();
		let stem = format!("{}+graft<{}>", self.name_of(original), entries.join(","));

		let Some(name) = (0..self.max_salt_probes)
			.map(|salt| salted(&stem, salt))
			.find(|name| self.reflection.lookup_type(name).is_none())
		else {
			tracing::error!(%stem, probes = self.max_salt_probes, "salt probing exhausted");
			panic!("no usable type name for {stem} after {} salt probes", self.max_salt_probes);
		};

		let ty = self.reflection.create_subtype(original, &name)?;
		for (capability, &source) in table {
			for message in self.reflection.capability_messages(capability) {
				if let Some(imp) = self.reflection.get_implementation(source, &message) {
					self.reflection.set_implementation(ty, &message, imp)?;
				}
			}
		}
		tracing::debug!(%name, ?ty, "grafted type synthesized");
		Ok(ty)
	}

	fn name_of(&self, ty: TypeDescriptor) -> String {
		self.reflection
			.type_name(ty)
			.map(|n| n.to_string())
			.unwrap_or_else(|| format!("{ty:?}"))
	}
}
