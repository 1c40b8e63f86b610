//! In-process type table implementing [`Reflection`].
//!
//! # Role
//!
//! Holds an arena of type records and a capability catalog behind one
//! `RwLock`. Every instance type is created together with a meta type that
//! carries its class-side implementations.
//!
//! # Invariants
//!
//! - Records are never removed; a [`TypeDescriptor`] stays valid for the
//!   lifetime of the table.
//! - Declared capability sets only grow.
//! - Implementations are cloned out before invocation; no lock is held while
//!   user code runs.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::error::ReflectError;
use crate::ids::{Capability, MessageId, TypeDescriptor};
use crate::implementation::Implementation;
use crate::object::Object;
use crate::reflection::Reflection;

/// Name of the root type created by [`RuntimeTable::new`].
pub const ROOT_TYPE_NAME: &str = "Object";

struct TypeRecord {
	name: Arc<str>,
	parent: Option<TypeDescriptor>,
	/// Class-side companion; `None` on meta records.
	meta: Option<TypeDescriptor>,
	is_meta: bool,
	capabilities: Vec<Capability>,
	methods: HashMap<MessageId, Implementation>,
}

#[derive(Default)]
struct CapabilityRecord {
	messages: Vec<MessageId>,
	inherits: Vec<Capability>,
}

struct Tables {
	types: Vec<TypeRecord>,
	by_name: HashMap<Arc<str>, TypeDescriptor>,
	capabilities: HashMap<Capability, CapabilityRecord>,
}

impl Tables {
	fn record(&self, ty: TypeDescriptor) -> Result<&TypeRecord, ReflectError> {
		self.types.get(ty.index()).ok_or(ReflectError::UnknownType(ty))
	}

	fn record_mut(&mut self, ty: TypeDescriptor) -> Result<&mut TypeRecord, ReflectError> {
		self.types.get_mut(ty.index()).ok_or(ReflectError::UnknownType(ty))
	}

	fn find_implementation(&self, ty: TypeDescriptor, message: &MessageId) -> Option<&Implementation> {
		let mut cursor = Some(ty);
		while let Some(current) = cursor {
			let record = self.types.get(current.index())?;
			if let Some(imp) = record.methods.get(message) {
				return Some(imp);
			}
			cursor = record.parent;
		}
		None
	}

	/// Returns true if `have` is `want` or inherits it.
	fn capability_satisfies(&self, have: &Capability, want: &Capability) -> bool {
		let mut visited: HashSet<&Capability> = HashSet::default();
		let mut stack = vec![have];
		while let Some(cap) = stack.pop() {
			if cap == want {
				return true;
			}
			if !visited.insert(cap) {
				continue;
			}
			if let Some(record) = self.capabilities.get(cap) {
				stack.extend(record.inherits.iter());
			}
		}
		false
	}

	/// Messages of `capability` and every capability it inherits, in
	/// declaration order, without duplicates.
	fn collect_messages(&self, capability: &Capability) -> Vec<MessageId> {
		let mut visited: HashSet<&Capability> = HashSet::default();
		let mut seen: HashSet<&MessageId> = HashSet::default();
		let mut out = Vec::new();
		let mut stack = vec![capability];
		while let Some(cap) = stack.pop() {
			if !visited.insert(cap) {
				continue;
			}
			let Some(record) = self.capabilities.get(cap) else {
				continue;
			};
			for message in &record.messages {
				if seen.insert(message) {
					out.push(message.clone());
				}
			}
			stack.extend(record.inherits.iter().rev());
		}
		out
	}

	fn push_record(&mut self, record: TypeRecord) -> TypeDescriptor {
		let ty = TypeDescriptor::from_u32(self.types.len() as u32);
		self.types.push(record);
		ty
	}
}

/// In-process reflection runtime.
pub struct RuntimeTable {
	tables: RwLock<Tables>,
	root: TypeDescriptor,
}

impl Default for RuntimeTable {
	fn default() -> Self {
		Self::new()
	}
}

impl RuntimeTable {
	/// Creates a table whose root type is named [`ROOT_TYPE_NAME`].
	pub fn new() -> Self {
		Self::with_root_name(ROOT_TYPE_NAME)
	}

	/// Creates a table with a custom root type name.
	pub fn with_root_name(name: &str) -> Self {
		let mut tables = Tables {
			types: Vec::new(),
			by_name: HashMap::default(),
			capabilities: HashMap::default(),
		};
		let name: Arc<str> = Arc::from(name);
		let root = tables.push_record(TypeRecord {
			name: name.clone(),
			parent: None,
			meta: None,
			is_meta: false,
			capabilities: Vec::new(),
			methods: HashMap::default(),
		});
		// The root meta type inherits from the root instance type.
		let root_meta = tables.push_record(TypeRecord {
			name: meta_name(&name),
			parent: Some(root),
			meta: None,
			is_meta: true,
			capabilities: Vec::new(),
			methods: HashMap::default(),
		});
		tables.types[root.index()].meta = Some(root_meta);
		tables.by_name.insert(name, root);

		Self {
			tables: RwLock::new(tables),
			root,
		}
	}

	/// Defines (or redefines) a capability's messages and inherited
	/// capabilities.
	pub fn define_capability(
		&self,
		capability: Capability,
		messages: impl IntoIterator<Item = MessageId>,
		inherits: impl IntoIterator<Item = Capability>,
	) {
		let record = CapabilityRecord {
			messages: messages.into_iter().collect(),
			inherits: inherits.into_iter().collect(),
		};
		tracing::debug!(capability = %capability, messages = record.messages.len(), "capability defined");
		self.tables.write().capabilities.insert(capability, record);
	}

	/// Returns the number of instance types, root included.
	pub fn len(&self) -> usize {
		self.tables.read().by_name.len()
	}

	/// Returns true if only the root type exists.
	pub fn is_empty(&self) -> bool {
		self.len() <= 1
	}
}

fn meta_name(name: &str) -> Arc<str> {
	Arc::from(format!("{name}.meta"))
}

impl Reflection for RuntimeTable {
	fn root_type(&self) -> TypeDescriptor {
		self.root
	}

	fn set_type(&self, object: &Object, ty: TypeDescriptor) -> Result<(), ReflectError> {
		let tables = self.tables.read();
		if tables.record(ty)?.is_meta {
			return Err(ReflectError::UnknownType(ty));
		}
		object.retarget(ty);
		Ok(())
	}

	fn type_name(&self, ty: TypeDescriptor) -> Option<Arc<str>> {
		self.tables.read().types.get(ty.index()).map(|r| r.name.clone())
	}

	fn lookup_type(&self, name: &str) -> Option<TypeDescriptor> {
		self.tables.read().by_name.get(name).copied()
	}

	fn parent(&self, ty: TypeDescriptor) -> Option<TypeDescriptor> {
		self.tables.read().types.get(ty.index())?.parent
	}

	fn is_meta(&self, ty: TypeDescriptor) -> bool {
		self.tables.read().types.get(ty.index()).is_some_and(|r| r.is_meta)
	}

	fn meta_type(&self, ty: TypeDescriptor) -> Option<TypeDescriptor> {
		self.tables.read().types.get(ty.index())?.meta
	}

	fn implements(&self, ty: TypeDescriptor, message: &MessageId) -> bool {
		self.tables.read().find_implementation(ty, message).is_some()
	}

	fn owns_implementation(&self, ty: TypeDescriptor, message: &MessageId) -> bool {
		self.tables
			.read()
			.types
			.get(ty.index())
			.is_some_and(|r| r.methods.contains_key(message))
	}

	fn belongs_to(&self, message: &MessageId, capability: &Capability) -> bool {
		let tables = self.tables.read();
		let mut visited: HashSet<&Capability> = HashSet::default();
		let mut stack = vec![capability];
		while let Some(cap) = stack.pop() {
			if !visited.insert(cap) {
				continue;
			}
			let Some(record) = tables.capabilities.get(cap) else {
				continue;
			};
			if record.messages.contains(message) {
				return true;
			}
			stack.extend(record.inherits.iter());
		}
		false
	}

	fn capability_messages(&self, capability: &Capability) -> Vec<MessageId> {
		self.tables.read().collect_messages(capability)
	}

	fn declared_capabilities(&self, ty: TypeDescriptor) -> Vec<Capability> {
		self.tables
			.read()
			.types
			.get(ty.index())
			.map(|r| r.capabilities.clone())
			.unwrap_or_default()
	}

	fn conforms_to(&self, ty: TypeDescriptor, capability: &Capability) -> bool {
		let tables = self.tables.read();
		let mut cursor = Some(ty);
		while let Some(current) = cursor {
			let Some(record) = tables.types.get(current.index()) else {
				return false;
			};
			if record
				.capabilities
				.iter()
				.any(|have| tables.capability_satisfies(have, capability))
			{
				return true;
			}
			cursor = record.parent;
		}
		false
	}

	fn create_subtype(&self, parent: TypeDescriptor, name: &str) -> Result<TypeDescriptor, ReflectError> {
		if name.is_empty() {
			return Err(ReflectError::InvalidName(name.to_string()));
		}
		let mut tables = self.tables.write();
		let parent_record = tables.record(parent)?;
		if parent_record.is_meta {
			return Err(ReflectError::UnknownType(parent));
		}
		let parent_meta = parent_record.meta;
		if tables.by_name.contains_key(name) {
			return Err(ReflectError::DuplicateTypeName(name.to_string()));
		}

		let name: Arc<str> = Arc::from(name);
		let ty = tables.push_record(TypeRecord {
			name: name.clone(),
			parent: Some(parent),
			meta: None,
			is_meta: false,
			capabilities: Vec::new(),
			methods: HashMap::default(),
		});
		let meta = tables.push_record(TypeRecord {
			name: meta_name(&name),
			parent: parent_meta,
			meta: None,
			is_meta: true,
			capabilities: Vec::new(),
			methods: HashMap::default(),
		});
		tables.types[ty.index()].meta = Some(meta);
		tables.by_name.insert(name.clone(), ty);
		drop(tables);

		tracing::debug!(name = %name, ?parent, ?ty, "type registered");
		Ok(ty)
	}

	fn add_capability(&self, ty: TypeDescriptor, capability: &Capability) -> Result<(), ReflectError> {
		let mut tables = self.tables.write();
		let record = tables.record_mut(ty)?;
		if !record.capabilities.contains(capability) {
			record.capabilities.push(capability.clone());
		}
		Ok(())
	}

	fn get_implementation(&self, ty: TypeDescriptor, message: &MessageId) -> Option<Implementation> {
		self.tables.read().find_implementation(ty, message).cloned()
	}

	fn add_implementation(
		&self,
		ty: TypeDescriptor,
		message: &MessageId,
		imp: Implementation,
	) -> Result<bool, ReflectError> {
		let mut tables = self.tables.write();
		let record = tables.record_mut(ty)?;
		if record.methods.contains_key(message) {
			return Ok(false);
		}
		record.methods.insert(message.clone(), imp);
		Ok(true)
	}

	fn replace_implementation(
		&self,
		ty: TypeDescriptor,
		message: &MessageId,
		imp: Implementation,
	) -> Result<Option<Implementation>, ReflectError> {
		let mut tables = self.tables.write();
		let record = tables.record_mut(ty)?;
		Ok(record.methods.insert(message.clone(), imp))
	}

	fn exchange_implementations(
		&self,
		ty: TypeDescriptor,
		a: &MessageId,
		b: &MessageId,
	) -> Result<(), ReflectError> {
		let mut tables = self.tables.write();
		let missing = |tables: &Tables, message: &MessageId| ReflectError::MissingImplementation {
			type_name: tables
				.types
				.get(ty.index())
				.map(|r| r.name.to_string())
				.unwrap_or_default(),
			message: message.clone(),
		};
		let imp_a = tables
			.find_implementation(ty, a)
			.cloned()
			.ok_or_else(|| missing(&*tables, a))?;
		let imp_b = tables
			.find_implementation(ty, b)
			.cloned()
			.ok_or_else(|| missing(&*tables, b))?;

		let record = tables.record_mut(ty)?;
		record.methods.insert(a.clone(), imp_b);
		record.methods.insert(b.clone(), imp_a);
		Ok(())
	}
}

#[cfg(test)]
mod tests;
