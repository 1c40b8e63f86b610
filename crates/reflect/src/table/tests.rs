use pretty_assertions::assert_eq;

use super::*;
use crate::{SendError, Value};

fn label(text: &'static str) -> Implementation {
	Implementation::new(text, move |_, _| Value::from(text))
}

fn msg(name: &str) -> MessageId {
	MessageId::new(name)
}

#[test]
fn subtypes_inherit_implementations() {
	let table = RuntimeTable::new();
	let base = table.create_subtype(table.root_type(), "Base").unwrap();
	let derived = table.create_subtype(base, "Derived").unwrap();
	table.add_implementation(base, &msg("greet"), label("base")).unwrap();

	assert!(table.implements(derived, &msg("greet")));
	assert!(!table.owns_implementation(derived, &msg("greet")));
	assert!(table.is_subtype_of(derived, base));
	assert!(!table.is_subtype_of(base, derived));
	assert_eq!(table.parent(derived), Some(base));
	assert_eq!(table.lookup_type("Derived"), Some(derived));
	assert_eq!(table.len(), 3);
}

#[test]
fn duplicate_type_names_are_rejected() {
	let table = RuntimeTable::new();
	table.create_subtype(table.root_type(), "Thing").unwrap();
	let err = table.create_subtype(table.root_type(), "Thing").unwrap_err();
	assert_eq!(err, ReflectError::DuplicateTypeName("Thing".into()));
}

#[test]
fn meta_types_mirror_the_hierarchy() {
	let table = RuntimeTable::new();
	let base = table.create_subtype(table.root_type(), "Base").unwrap();
	let derived = table.create_subtype(base, "Derived").unwrap();

	let base_meta = table.meta_type(base).unwrap();
	let derived_meta = table.meta_type(derived).unwrap();
	assert!(table.is_meta(derived_meta));
	assert_eq!(table.parent(derived_meta), Some(base_meta));
	assert_eq!(table.meta_type(derived_meta), None);
	assert_eq!(table.lookup_type("Derived.meta"), None);
	assert!(table.create_subtype(derived_meta, "Nope").is_err());
}

#[test]
fn add_implementation_does_not_overwrite() {
	let table = RuntimeTable::new();
	let ty = table.create_subtype(table.root_type(), "T").unwrap();
	let first = label("first");
	assert!(table.add_implementation(ty, &msg("m"), first.clone()).unwrap());
	assert!(!table.add_implementation(ty, &msg("m"), label("second")).unwrap());
	assert_eq!(table.get_implementation(ty, &msg("m")), Some(first.clone()));

	let previous = table.replace_implementation(ty, &msg("m"), label("third")).unwrap();
	assert_eq!(previous, Some(first));
}

#[test]
fn exchange_swaps_owned_and_inherited() {
	let table = RuntimeTable::new();
	let base = table.create_subtype(table.root_type(), "Base").unwrap();
	let derived = table.create_subtype(base, "Derived").unwrap();
	table.add_implementation(base, &msg("a"), label("A")).unwrap();
	table.add_implementation(derived, &msg("b"), label("B")).unwrap();

	table.exchange_implementations(derived, &msg("a"), &msg("b")).unwrap();

	let obj = Object::new(derived);
	assert_eq!(table.send(&obj, &msg("a"), &[]).unwrap(), Value::from("B"));
	assert_eq!(table.send(&obj, &msg("b"), &[]).unwrap(), Value::from("A"));
	// The parent keeps its own implementation.
	let base_obj = Object::new(base);
	assert_eq!(table.send(&base_obj, &msg("a"), &[]).unwrap(), Value::from("A"));
}

#[test]
fn exchange_requires_both_messages() {
	let table = RuntimeTable::new();
	let ty = table.create_subtype(table.root_type(), "T").unwrap();
	table.add_implementation(ty, &msg("a"), label("A")).unwrap();
	let err = table.exchange_implementations(ty, &msg("a"), &msg("missing")).unwrap_err();
	assert!(matches!(err, ReflectError::MissingImplementation { .. }));
}

#[test]
fn capability_inheritance_drives_membership_and_conformance() {
	let table = RuntimeTable::new();
	let scroll = Capability::new("ScrollDelegate");
	let table_delegate = Capability::new("TableDelegate");
	table.define_capability(scroll.clone(), [msg("didScroll")], []);
	table.define_capability(table_delegate.clone(), [msg("didSelect")], [scroll.clone()]);

	assert!(table.belongs_to(&msg("didScroll"), &table_delegate));
	assert!(table.belongs_to(&msg("didSelect"), &table_delegate));
	assert!(!table.belongs_to(&msg("didSelect"), &scroll));
	assert_eq!(
		table.capability_messages(&table_delegate),
		vec![msg("didSelect"), msg("didScroll")]
	);

	let base = table.create_subtype(table.root_type(), "Controller").unwrap();
	let derived = table.create_subtype(base, "ListController").unwrap();
	table.add_capability(base, &table_delegate).unwrap();
	assert!(table.conforms_to(derived, &scroll));
	assert!(table.declared_capabilities(derived).is_empty());
	assert_eq!(table.declared_capabilities(base), vec![table_delegate]);
}

#[test]
fn send_reports_unrecognized_messages() {
	let table = RuntimeTable::new();
	let ty = table.create_subtype(table.root_type(), "Quiet").unwrap();
	let obj = Object::new(ty);
	let err = table.send(&obj, &msg("speak"), &[]).unwrap_err();
	assert_eq!(
		err,
		SendError::Unrecognized {
			type_name: "Quiet".into(),
			message: msg("speak"),
		}
	);
}

#[test]
fn set_type_retargets_objects() {
	let table = RuntimeTable::new();
	let a = table.create_subtype(table.root_type(), "A").unwrap();
	let b = table.create_subtype(a, "B").unwrap();
	let obj = Object::with_payload(a, 7_i64);
	table.set_type(&obj, b).unwrap();
	assert_eq!(table.type_of(&obj), b);
	assert_eq!(obj.payload::<i64>(), Some(&7));
	assert!(table.set_type(&obj, table.meta_type(b).unwrap()).is_err());
}
