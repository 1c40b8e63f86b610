//! Runtime type reflection model for dynamic message dispatch.
//!
//! Types are dense [`TypeDescriptor`]s with one parent, a set of declared
//! [`Capability`]s and a table of [`Implementation`]s keyed by [`MessageId`].
//! The [`Reflection`] trait is the seam the interception layer is written
//! against; [`RuntimeTable`] is the in-process implementation.

pub mod error;
pub mod ids;
pub mod implementation;
pub mod object;
pub mod reflection;
pub mod table;
pub mod value;

pub use error::{ReflectError, SendError};
pub use ids::{Capability, MessageId, TypeDescriptor};
pub use implementation::Implementation;
pub use object::{Handle, Object};
pub use reflection::Reflection;
pub use table::RuntimeTable;
pub use value::Value;
