//! Shared fixtures for unit tests.

use std::sync::Arc;

use relay_reflect::{Capability, Handle, Implementation, MessageId, Object, Reflection, RuntimeTable, TypeDescriptor, Value};

use crate::config::DispatchConfig;
use crate::context::Interception;

pub(crate) fn cap(name: &str) -> Capability {
	Capability::new(name)
}

pub(crate) fn msg(name: &str) -> MessageId {
	MessageId::new(name)
}

/// A runtime with three capabilities:
///
/// - `Scrolling`: `didScroll`, `didZoom`
/// - `Selection`: `didSelect`
/// - `Table`: `rowCount`, inheriting `Scrolling`
pub(crate) struct Fixture {
	pub table: Arc<RuntimeTable>,
	pub ctx: Interception,
}

impl Fixture {
	pub fn new() -> Self {
		Self::with_config(DispatchConfig::default())
	}

	pub fn with_config(config: DispatchConfig) -> Self {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
		let table = Arc::new(RuntimeTable::new());
		table.define_capability(cap("Scrolling"), [msg("didScroll"), msg("didZoom")], []);
		table.define_capability(cap("Selection"), [msg("didSelect")], []);
		table.define_capability(cap("Table"), [msg("rowCount")], [cap("Scrolling")]);
		let ctx = Interception::new(table.clone(), config).unwrap();
		Self { table, ctx }
	}

	/// Registers `name` under the root type, implementing each message by
	/// returning `"{name}.{message}"`.
	pub fn handler_type(&self, name: &str, messages: &[&str]) -> TypeDescriptor {
		let ty = self.table.create_subtype(self.table.root_type(), name).unwrap();
		for message in messages {
			self.table
				.add_implementation(ty, &msg(message), labelled(name, message))
				.unwrap();
		}
		ty
	}

	pub fn handler(&self, ty: TypeDescriptor) -> Handle {
		Object::new(ty)
	}
}

/// An implementation returning `"{owner}.{message}"`.
pub(crate) fn labelled(owner: &str, message: &str) -> Implementation {
	let reply: Arc<str> = Arc::from(format!("{owner}.{message}"));
	Implementation::new(format!("{owner}.{message}"), move |_, _| Value::Str(reply.clone()))
}

/// Sends `message` through the reflection service and returns the string
/// reply.
pub(crate) fn reply(table: &RuntimeTable, receiver: &Handle, message: &str) -> String {
	let value = table.send(receiver, &msg(message), &[]).unwrap();
	value.as_str().unwrap_or_default().to_string()
}
