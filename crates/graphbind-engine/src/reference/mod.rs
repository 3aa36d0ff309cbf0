//! Member reference descriptors
//!
//! A [`MemberRef`] is the serializable value a graph stores in place of a
//! compiled reference. It names a [`TargetKind`], a dotted path whose first
//! segment is the *start* (a type, variable, parameter, node port, ...) and
//! whose remaining segments walk members, plus per-segment type arguments
//! that pick overloads and instantiate generic methods.
//!
//! Resolution turns the path into [`MemberHandle`]s once and keeps them in a
//! single cached state; every mutator drops that state through
//! [`MemberRef::invalidate`].

mod dispatch;
mod display;
mod factory;
mod persist;
mod resolve;

use std::sync::Arc;

use graphbind_sdk::{AssetRef, BindError, BindResult, NodeId, Signature, Type, Value, VariableScope};
use serde::{Deserialize, Serialize};

use crate::reflect::MemberHandle;
use crate::token::TypeToken;

pub use persist::{PersistedInstance, PersistedRef, ValueBlob};

/// What a descriptor addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    /// Nothing assigned
    #[default]
    None,
    /// The null literal of a declared type
    NullConstant,
    /// A literal value carried by the descriptor
    InlineValue,
    /// The owning graph's own instance
    #[serde(rename = "self")]
    SelfValue,
    /// A host type, or its static members
    StaticType,
    /// Field
    Field,
    /// Property
    Property,
    /// Method
    Method,
    /// Constructor (final segment `ctor`)
    Constructor,
    /// Event
    Event,
    /// Variable of the graph instance
    InstanceVariable,
    /// Variable shared by a group of graphs
    GroupVariable,
    /// Variable of the running function
    LocalVariable,
    /// Graph-defined function
    Function,
    /// Graph-defined computed property
    ComputedProperty,
    /// Construction of a graph type
    GraphConstructor,
    /// Indexer (final segment `[]`)
    Indexer,
    /// Parameter of the running function
    Parameter,
    /// Generic-type parameter, optionally array-wrapped (`T[]`)
    GenericParameter,
    /// A graph-defined type, or its static members
    GraphType,
    /// Control transfer into a node's entry
    FlowNode,
    /// The value a node produces
    ValueNode,
    /// A field of another node
    NodeField,
    /// One element of a node's collection field (`field[index]`)
    NodeFieldElement,
    /// Control transfer into a named flow input
    FlowInput,
    /// Control transfer into a named extended flow input
    FlowInputExtended,
    /// The value held by a node's output port
    NodeOutputValue,
}

impl TargetKind {
    /// Host member kinds resolved through the introspection provider
    pub fn is_member(self) -> bool {
        matches!(
            self,
            TargetKind::Field
                | TargetKind::Property
                | TargetKind::Method
                | TargetKind::Constructor
                | TargetKind::Event
                | TargetKind::Indexer
        )
    }

    /// Variable scope of a variable kind
    pub fn variable_scope(self) -> Option<VariableScope> {
        match self {
            TargetKind::InstanceVariable => Some(VariableScope::Instance),
            TargetKind::GroupVariable => Some(VariableScope::Group),
            TargetKind::LocalVariable => Some(VariableScope::Local),
            _ => None,
        }
    }

    /// Whether this is a variable kind
    pub fn is_variable(self) -> bool {
        self.variable_scope().is_some()
    }

    /// Kinds that address another node of the owning graph
    pub fn is_node(self) -> bool {
        matches!(
            self,
            TargetKind::FlowNode
                | TargetKind::ValueNode
                | TargetKind::NodeField
                | TargetKind::NodeFieldElement
                | TargetKind::FlowInput
                | TargetKind::FlowInputExtended
                | TargetKind::NodeOutputValue
        )
    }

    /// Control-transfer kinds; never gettable
    pub fn is_flow(self) -> bool {
        matches!(
            self,
            TargetKind::FlowNode | TargetKind::FlowInput | TargetKind::FlowInputExtended
        )
    }

    /// Kinds whose start segment is a type rather than a value
    pub fn is_type_only(self) -> bool {
        matches!(
            self,
            TargetKind::StaticType | TargetKind::GraphType | TargetKind::GenericParameter
        )
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            TargetKind::None => "none",
            TargetKind::NullConstant => "null constant",
            TargetKind::InlineValue => "inline value",
            TargetKind::SelfValue => "self",
            TargetKind::StaticType => "type",
            TargetKind::Field => "field",
            TargetKind::Property => "property",
            TargetKind::Method => "method",
            TargetKind::Constructor => "constructor",
            TargetKind::Event => "event",
            TargetKind::InstanceVariable => "instance variable",
            TargetKind::GroupVariable => "group variable",
            TargetKind::LocalVariable => "local variable",
            TargetKind::Function => "function",
            TargetKind::ComputedProperty => "computed property",
            TargetKind::GraphConstructor => "graph constructor",
            TargetKind::Indexer => "indexer",
            TargetKind::Parameter => "parameter",
            TargetKind::GenericParameter => "generic parameter",
            TargetKind::GraphType => "graph type",
            TargetKind::FlowNode => "flow node",
            TargetKind::ValueNode => "value node",
            TargetKind::NodeField => "node field",
            TargetKind::NodeFieldElement => "node field element",
            TargetKind::FlowInput => "flow input",
            TargetKind::FlowInputExtended => "extended flow input",
            TargetKind::NodeOutputValue => "node output",
        }
    }
}

/// Type arguments of one path segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentItem {
    /// Method-level generic arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_args: Vec<TypeToken>,
    /// Parameter types selecting an overload; `#n` names refer to
    /// `generic_args[n]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_types: Option<Vec<TypeToken>>,
}

impl SegmentItem {
    /// Item selecting an overload by parameter types
    pub fn params(param_types: Vec<TypeToken>) -> Self {
        Self {
            generic_args: Vec::new(),
            param_types: Some(param_types),
        }
    }
}

/// What the start segment is applied to
#[derive(Debug, Clone, Default)]
pub enum Instance {
    /// Nothing
    #[default]
    None,
    /// A concrete value
    Value(Value),
    /// Another descriptor, evaluated first
    Ref(Box<MemberRef>),
    /// A node of the owning graph
    Node(NodeId),
}

/// Cached outcome of resolution
#[derive(Debug)]
pub(crate) struct ResolvedState {
    /// Type of the start segment
    pub(crate) root_type: Type,
    /// One handle per member segment (`path[1..]`)
    pub(crate) handles: Vec<MemberHandle>,
    /// Parameter types and signature of a function start segment
    pub(crate) function: Option<(Vec<Type>, Signature)>,
    /// Constructor of a graph-constructor start segment
    pub(crate) constructor: Option<MemberHandle>,
}

/// Serializable reference to something a graph reads, writes or calls
#[derive(Debug, Clone, Default)]
pub struct MemberRef {
    kind: TargetKind,
    path: Vec<String>,
    items: Vec<Option<SegmentItem>>,
    start_type: Option<TypeToken>,
    target_type: Option<TypeToken>,
    is_static: bool,
    instance: Instance,
    external_refs: Vec<AssetRef>,
    resolved: Option<Arc<ResolvedState>>,
}

impl MemberRef {
    /// Target kind
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Path segments; the first is the start segment
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Path as a single dotted string
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }

    /// Per-segment type arguments, parallel to the path
    pub fn items(&self) -> &[Option<SegmentItem>] {
        &self.items
    }

    /// Encoded type of the start segment
    pub fn start_type(&self) -> Option<&TypeToken> {
        self.start_type.as_ref()
    }

    /// Encoded type of the final target, as recorded at authoring time
    pub fn target_type_token(&self) -> Option<&TypeToken> {
        self.target_type.as_ref()
    }

    /// Whether the start segment is a type rather than an instance
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// What the start segment is applied to
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Assets referenced by `@n` tokens
    pub fn external_refs(&self) -> &[AssetRef] {
        &self.external_refs
    }

    /// Whether a resolution is cached
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Cached member handles, if resolved
    pub fn resolved_handles(&self) -> Option<&[MemberHandle]> {
        self.resolved.as_deref().map(|state| state.handles.as_slice())
    }

    /// Whether a kind and a path are assigned
    pub fn is_assigned(&self) -> bool {
        self.kind != TargetKind::None && !self.path.is_empty()
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    /// Drop the cached resolution
    pub fn invalidate(&mut self) {
        self.resolved = None;
    }

    /// Change the target kind
    pub fn retarget(&mut self, kind: TargetKind) {
        self.kind = kind;
        self.invalidate();
    }

    /// Rename one path segment
    pub fn rename_segment(&mut self, index: usize, name: &str) -> BindResult<()> {
        let segment = self.path.get_mut(index).ok_or_else(|| {
            BindError::Argument(format!("segment {} out of range", index))
        })?;
        *segment = name.to_string();
        self.invalidate();
        Ok(())
    }

    /// Replace the type arguments of one segment
    pub fn set_item(&mut self, index: usize, item: Option<SegmentItem>) -> BindResult<()> {
        self.normalize();
        let slot = self.items.get_mut(index).ok_or_else(|| {
            BindError::Argument(format!("segment {} out of range", index))
        })?;
        *slot = item;
        self.invalidate();
        Ok(())
    }

    /// Replace what the start segment is applied to
    pub fn set_instance(&mut self, instance: Instance) {
        self.instance = instance;
        self.invalidate();
    }

    /// Mark the start segment static or instance
    pub fn set_static(&mut self, is_static: bool) {
        self.is_static = is_static;
        self.invalidate();
    }

    /// Append a member segment resolved by name only
    pub fn push_segment(&mut self, name: &str, item: Option<SegmentItem>) {
        self.normalize();
        self.path.push(name.to_string());
        self.items.push(item);
        self.invalidate();
    }

    /// Builder form of [`MemberRef::push_segment`]
    pub fn then_named(mut self, name: &str) -> Self {
        self.push_segment(name, None);
        self
    }

    /// One item slot per segment
    pub(crate) fn normalize(&mut self) {
        self.items.resize(self.path.len(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(TargetKind::Method.is_member());
        assert!(TargetKind::LocalVariable.is_variable());
        assert_eq!(TargetKind::GroupVariable.variable_scope(), Some(VariableScope::Group));
        assert!(TargetKind::FlowInputExtended.is_flow());
        assert!(TargetKind::FlowInputExtended.is_node());
        assert!(!TargetKind::ValueNode.is_flow());
        assert!(TargetKind::GenericParameter.is_type_only());
    }

    #[test]
    fn test_kind_serialized_names() {
        assert_eq!(serde_json::to_string(&TargetKind::SelfValue).unwrap(), "\"self\"");
        assert_eq!(
            serde_json::to_string(&TargetKind::NodeFieldElement).unwrap(),
            "\"node-field-element\""
        );
    }

    #[test]
    fn test_mutators_invalidate_and_normalize() {
        let mut r = MemberRef::default();
        r.retarget(TargetKind::Field);
        r.push_segment("player", None);
        r.push_segment("health", None);
        assert_eq!(r.items().len(), 2);
        assert_eq!(r.dotted_path(), "player.health");

        r.rename_segment(1, "armor").unwrap();
        assert_eq!(r.path()[1], "armor");
        assert!(r.rename_segment(5, "x").is_err());
        assert!(!r.is_resolved());
    }
}
