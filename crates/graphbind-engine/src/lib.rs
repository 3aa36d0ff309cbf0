//! Graphbind Engine
//!
//! Dynamic member resolution and invocation for node-graph programs:
//! - **Type tokens**: serializable type encodings and their decoding (`token` module)
//! - **Cast oracle**: memoized cast compatibility and value coercion (`cast` module)
//! - **Reflection**: type registry and member lookup (`reflect` module)
//! - **Descriptors**: serializable member references with get/set/invoke (`reference` module)
//! - **Flow/debug bridge**: flow activation and instrumentation hooks
//!
//! # Example
//!
//! ```rust,ignore
//! use graphbind_engine::{BindContext, Engine, MemberRef};
//! use graphbind_sdk::{Type, Value, VariableScope};
//!
//! let engine = Engine::standard();
//! let ctx = BindContext::new(&engine, &graph);
//!
//! let mut health = MemberRef::variable(VariableScope::Instance, "health", &Type::I32);
//! health.set(&ctx, Value::I32(90))?;
//! assert_eq!(health.get(&ctx)?, Value::I32(90));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Type registry and member introspection
pub mod reflect;

/// Serializable type tokens
pub mod token;

/// Cast compatibility and coercion
pub mod cast;

/// Member reference descriptors and their dispatcher
pub mod reference;

pub mod debug;
pub mod defaults;
pub mod diagnostics;
mod engine;
pub mod flow;
pub mod invocation;
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use cast::{coerce, CastCache};
pub use debug::{global_recorder, DebugEvent, DebugHooks, DebugRecord, DebugRecorder, NoopHooks};
pub use diagnostics::{validate, Diagnostic, ErrorRegistry};
pub use engine::{BindContext, Engine};
pub use invocation::{InitEntry, Initializer, MultiArgInvocation};
pub use options::EngineOptions;
pub use reference::{
    Instance, MemberRef, PersistedInstance, PersistedRef, SegmentItem, TargetKind, ValueBlob,
};
pub use reflect::{create_standard_registry, MemberHandle, MemberKind, MemberProvider, TypeRegistry};
pub use token::{decode, DecodeScope, GenericScope, TypeCache, TypeToken};

// Re-export the SDK so hosts need a single dependency
pub use graphbind_sdk;
