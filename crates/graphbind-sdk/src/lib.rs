//! Graphbind SDK - host-facing model for the graphbind engine
//!
//! This crate holds what a host and an owning graph need to talk to the
//! engine without depending on it: dynamic values, the type model and its
//! introspectable definitions, the error taxonomy, and the capability traits
//! a graph implements.
//!
//! # Example
//!
//! ```ignore
//! use graphbind_sdk::{FieldInfo, Type, TypeDef};
//!
//! let vector = TypeDef::structure("Vector3")
//!     .field(FieldInfo::new("x", Type::F32))
//!     .field(FieldInfo::new("y", Type::F32))
//!     .field(FieldInfo::new("z", Type::F32))
//!     .build();
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod flow;
pub mod host;
pub mod typedef;
pub mod types;
pub mod value;

pub use error::{BindError, BindResult};
pub use flow::{FlowHandle, FlowState};
pub use host::{
    FlowOutcome, FlowPort, FunctionContainer, GenericParameterContainer, GraphHost, NoHost,
    NodeAccessor, NodeId, ParameterContainer, PropertyContainer, SlotTable, VariableContainer,
    VariableScope,
};
pub use typedef::{
    AssetRef, ConstructorInfo, ConversionDirection, ConversionInfo, EventInfo, FieldInfo,
    IndexerInfo, MethodInfo, ParamInfo, PropertyInfo, TypeDef, TypeDefBuilder, TypeDefId,
    TypeDefKind, TypeOrigin,
};
pub use types::{CompositeType, ParamMode, ParamSig, Primitive, Signature, Type, SELF_TYPE_NAME};
pub use value::{ArrayRef, Callable, EnumValue, ObjectRef, StructValue, Value};
