//! Capabilities the engine consumes from the graph that owns a descriptor
//!
//! The engine never knows what a "graph" is. It asks its owner for a small set
//! of optional capabilities, each queryable by name or signature. A capability
//! the owner does not provide surfaces as
//! [`BindError::MissingCapability`](crate::error::BindError::MissingCapability)
//! when a descriptor needs it.
//!
//! Capabilities take `&self`: graphs run single-threaded and re-entrantly, so
//! implementations keep their state behind `RefCell` or similar.

use std::cell::RefCell;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{BindError, BindResult};
use crate::flow::FlowHandle;
use crate::types::{Signature, Type};
use crate::value::Value;

/// Identity of a node inside its owning graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Which variable table a variable kind addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableScope {
    /// Per graph instance
    Instance,
    /// Per running function
    Local,
    /// Shared across a group of graphs
    Group,
}

impl VariableScope {
    /// Lowercase label
    pub fn label(self) -> &'static str {
        match self {
            VariableScope::Instance => "instance",
            VariableScope::Local => "local",
            VariableScope::Group => "group",
        }
    }
}

/// Entry point of a flow activation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlowPort {
    /// The node's default entry
    Entry,
    /// A named flow input
    Input(String),
    /// A named extended (dynamically added) flow input
    Extended(String),
}

/// Result of activating a flow node
#[derive(Debug, Clone)]
pub enum FlowOutcome {
    /// Ran to completion inside the call
    Finished,
    /// Will finish later; the handle resolves when it does
    Suspended(FlowHandle),
}

impl FlowOutcome {
    /// Whether the activation completed synchronously
    pub fn is_finished(&self) -> bool {
        match self {
            FlowOutcome::Finished => true,
            FlowOutcome::Suspended(handle) => handle.is_finished(),
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Named variables of one scope
pub trait VariableContainer {
    /// Declared type, `None` if the variable does not exist
    fn variable_type(&self, name: &str) -> Option<Type>;

    /// Current value
    fn get_variable(&self, name: &str) -> BindResult<Value>;

    /// Replace the value
    fn set_variable(&self, name: &str, value: Value) -> BindResult<()>;
}

/// Parameters of the running function or graph
pub trait ParameterContainer {
    /// Declared type, `None` if the parameter does not exist
    fn parameter_type(&self, name: &str) -> Option<Type>;

    /// Current value
    fn get_parameter(&self, name: &str) -> BindResult<Value>;

    /// Replace the value (by-reference and output parameters)
    fn set_parameter(&self, name: &str, value: Value) -> BindResult<()>;
}

/// Generic-type parameters bound by the owner
pub trait GenericParameterContainer {
    /// Bound type of a generic parameter
    fn generic_parameter(&self, name: &str) -> Option<Type>;
}

/// Graph-defined functions
pub trait FunctionContainer {
    /// Signature of the overload whose parameter types are exactly `params`,
    /// or of the only overload when `params` is empty
    fn find_function(&self, name: &str, params: &[Type]) -> Option<Signature>;

    /// Call the overload selected by `params`
    fn call_function(&self, name: &str, params: &[Type], args: &mut [Value]) -> BindResult<Value>;
}

/// Computed properties declared by the graph
pub trait PropertyContainer {
    /// Declared type, `None` if the property does not exist
    fn property_type(&self, name: &str) -> Option<Type>;

    /// Whether the property has a setter
    fn can_set_property(&self, name: &str) -> bool;

    /// Run the getter
    fn get_property(&self, name: &str) -> BindResult<Value>;

    /// Run the setter
    fn set_property(&self, name: &str, value: Value) -> BindResult<()>;
}

/// Access to other nodes of the owning graph
pub trait NodeAccessor {
    /// Type of the value a value node produces
    fn node_value_type(&self, node: NodeId) -> Option<Type>;

    /// Pull the value a value node produces
    fn node_value(&self, node: NodeId) -> BindResult<Value>;

    /// Declared type of a node field
    fn field_type(&self, node: NodeId, field: &str) -> Option<Type>;

    /// Read a node field
    fn get_field(&self, node: NodeId, field: &str) -> BindResult<Value>;

    /// Write a node field
    fn set_field(&self, node: NodeId, field: &str, value: Value) -> BindResult<()>;

    /// Type of a named output port
    fn output_type(&self, node: NodeId, port: &str) -> Option<Type>;

    /// Value currently held by a named output port
    fn output_value(&self, node: NodeId, port: &str) -> BindResult<Value>;

    /// Transfer control into a flow node
    fn activate(&self, node: NodeId, port: &FlowPort) -> BindResult<FlowOutcome>;
}

/// Owner of a set of descriptors
///
/// Every capability is optional and defaults to absent.
pub trait GraphHost {
    /// The graph's own instance, for `self` targets
    fn self_value(&self) -> Option<Value> {
        None
    }

    /// Variables of a scope
    fn variables(&self, _scope: VariableScope) -> Option<&dyn VariableContainer> {
        None
    }

    /// Parameters
    fn parameters(&self) -> Option<&dyn ParameterContainer> {
        None
    }

    /// Generic-type parameter bindings
    fn generic_parameters(&self) -> Option<&dyn GenericParameterContainer> {
        None
    }

    /// Graph-defined functions
    fn functions(&self) -> Option<&dyn FunctionContainer> {
        None
    }

    /// Computed properties
    fn properties(&self) -> Option<&dyn PropertyContainer> {
        None
    }

    /// Other nodes
    fn nodes(&self) -> Option<&dyn NodeAccessor> {
        None
    }
}

/// Owner that provides no capabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHost;

impl GraphHost for NoHost {}

/// In-memory typed slots usable as a variable or parameter container
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: RefCell<FxHashMap<String, (Type, Value)>>,
}

impl SlotTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or redeclare) a slot
    pub fn declare(&self, name: &str, ty: Type, value: Value) {
        self.slots.borrow_mut().insert(name.to_string(), (ty, value));
    }

    /// Builder form of [`SlotTable::declare`]
    pub fn with(self, name: &str, ty: Type, value: Value) -> Self {
        self.declare(name, ty, value);
        self
    }

    fn ty(&self, name: &str) -> Option<Type> {
        self.slots.borrow().get(name).map(|(ty, _)| ty.clone())
    }

    fn get(&self, what: &'static str, name: &str) -> BindResult<Value> {
        self.slots
            .borrow()
            .get(name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| BindError::UnknownName {
                what,
                name: name.to_string(),
            })
    }

    fn set(&self, what: &'static str, name: &str, value: Value) -> BindResult<()> {
        match self.slots.borrow_mut().get_mut(name) {
            Some(slot) => {
                slot.1 = value;
                Ok(())
            }
            None => Err(BindError::UnknownName {
                what,
                name: name.to_string(),
            }),
        }
    }
}

impl VariableContainer for SlotTable {
    fn variable_type(&self, name: &str) -> Option<Type> {
        self.ty(name)
    }

    fn get_variable(&self, name: &str) -> BindResult<Value> {
        self.get("variable", name)
    }

    fn set_variable(&self, name: &str, value: Value) -> BindResult<()> {
        self.set("variable", name, value)
    }
}

impl ParameterContainer for SlotTable {
    fn parameter_type(&self, name: &str) -> Option<Type> {
        self.ty(name)
    }

    fn get_parameter(&self, name: &str) -> BindResult<Value> {
        self.get("parameter", name)
    }

    fn set_parameter(&self, name: &str, value: Value) -> BindResult<()> {
        self.set("parameter", name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_table_rejects_undeclared_names() {
        let table = SlotTable::new().with("score", Type::I32, Value::I32(1));

        assert_eq!(table.get_variable("score").unwrap(), Value::I32(1));
        table.set_variable("score", Value::I32(4)).unwrap();
        assert_eq!(table.get_variable("score").unwrap(), Value::I32(4));

        let err = table.set_variable("lives", Value::I32(3)).unwrap_err();
        assert!(matches!(err, BindError::UnknownName { what: "variable", .. }));
    }

    #[test]
    fn test_no_host_provides_nothing() {
        let host = NoHost;
        assert!(host.self_value().is_none());
        assert!(host.variables(VariableScope::Local).is_none());
        assert!(host.nodes().is_none());
    }
}
