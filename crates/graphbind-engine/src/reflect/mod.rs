//! Introspection over host and graph types
//!
//! Hosts without native reflection describe their types as
//! [`TypeDef`](graphbind_sdk::TypeDef)s and register them here; the dispatcher
//! only ever talks to the [`MemberProvider`] trait.

mod builtins;
mod handle;
mod registry;

pub use builtins::{list_definition, ARRAY_DEF, STRING_DEF};
pub use handle::{MemberHandle, MemberKind};
pub use registry::{create_standard_registry, MemberProvider, TypeRegistry, TypeRegistryBuilder};
