//! Descriptor factories
//!
//! Each factory fills in the path, the per-segment type arguments and the
//! type tokens, so resolving the result needs nothing from the authoring
//! side.

use graphbind_sdk::{NodeId, Signature, Type, Value, VariableScope};

use super::resolve::INDEXER_SEGMENT;
use super::{Instance, MemberRef, SegmentItem, TargetKind};
use crate::defaults::CONSTRUCTOR_SEGMENT;
use crate::reflect::{MemberHandle, MemberKind};
use crate::token::TypeToken;

/// Start segment of instance member chains built from handles
const INSTANCE_START: &str = "target";

impl MemberRef {
    /// Unassigned descriptor
    pub fn none() -> Self {
        Self::default()
    }

    fn with_path(kind: TargetKind, path: &[&str]) -> Self {
        Self {
            kind,
            path: path.iter().map(|s| s.to_string()).collect(),
            items: vec![None; path.len()],
            ..Self::default()
        }
    }

    fn encode(&mut self, ty: &Type) -> TypeToken {
        TypeToken::encode(ty, &mut self.external_refs)
    }

    fn with_start_type(mut self, ty: &Type) -> Self {
        self.start_type = Some(self.encode(ty));
        self
    }

    fn with_target_type(mut self, ty: &Type) -> Self {
        self.target_type = Some(self.encode(ty));
        self
    }

    // ========================================================================
    // Constants and types
    // ========================================================================

    /// The null literal of type `ty`
    pub fn null_constant(ty: &Type) -> Self {
        Self::with_path(TargetKind::NullConstant, &["null"]).with_target_type(ty)
    }

    /// A literal value; null literals need [`MemberRef::inline_typed`]
    pub fn inline_value(value: Value) -> Self {
        let ty = value.type_of();
        Self::inline_typed(value, &ty)
    }

    /// A literal value of an explicit type
    pub fn inline_typed(value: Value, ty: &Type) -> Self {
        let mut r = Self::with_path(TargetKind::InlineValue, &["value"])
            .with_start_type(ty)
            .with_target_type(ty);
        r.instance = Instance::Value(value);
        r
    }

    /// The owning graph's instance, of type `ty`
    pub fn self_value(ty: &Type) -> Self {
        Self::with_path(TargetKind::SelfValue, &["self"])
            .with_start_type(ty)
            .with_target_type(ty)
    }

    /// A type as a value; graph-defined types get the graph-type kind
    pub fn static_type(ty: &Type) -> Self {
        let kind = if ty.is_dynamic() {
            TargetKind::GraphType
        } else {
            TargetKind::StaticType
        };
        let name = ty.to_string();
        let mut r = Self::with_path(kind, &[&name]).with_start_type(ty);
        r.is_static = true;
        r.target_type = Some(TypeToken::named("type"));
        r
    }

    /// A generic-type parameter, array-wrapped `rank` times
    pub fn generic_parameter(name: &str, rank: usize) -> Self {
        let segment = format!("{}{}", name, "[]".repeat(rank));
        let mut r = Self::with_path(TargetKind::GenericParameter, &[&segment]);
        r.is_static = true;
        r
    }

    // ========================================================================
    // Host members
    // ========================================================================

    /// A single member; static members start at their declaring type
    pub fn member(handle: &MemberHandle, instance: Instance) -> Self {
        if handle.is_static() {
            Self::static_member_chain(handle.declaring_type(), std::slice::from_ref(handle))
        } else {
            Self::member_chain(
                INSTANCE_START,
                handle.declaring_type(),
                instance,
                std::slice::from_ref(handle),
            )
        }
    }

    /// A chain of instance members starting at a value of `root_type`
    pub fn member_chain(
        start: &str,
        root_type: &Type,
        instance: Instance,
        handles: &[MemberHandle],
    ) -> Self {
        let mut r = Self::with_path(TargetKind::Field, &[start]).with_start_type(root_type);
        r.instance = instance;
        handles.iter().fold(r, |r, h| r.then(h))
    }

    /// A chain starting at a static member of `owner`
    pub fn static_member_chain(owner: &Type, handles: &[MemberHandle]) -> Self {
        let name = owner.to_string();
        let mut r = Self::with_path(TargetKind::StaticType, &[&name]).with_start_type(owner);
        r.is_static = true;
        handles.iter().fold(r, |r, h| r.then(h))
    }

    /// The constructor of `ty` taking `params`
    pub fn constructor(ty: &Type, params: &[Type]) -> Self {
        let name = ty.to_string();
        let mut r = Self::with_path(TargetKind::Constructor, &[&name, CONSTRUCTOR_SEGMENT])
            .with_start_type(ty)
            .with_target_type(ty);
        r.is_static = true;
        let tokens = params.iter().map(|p| r.encode(p)).collect();
        r.items[1] = Some(SegmentItem::params(tokens));
        r
    }

    /// Append the member `handle` as the next segment.
    ///
    /// Member-kind descriptors take the handle's kind; roots such as
    /// variables keep theirs and become deep accesses.
    pub fn then(mut self, handle: &MemberHandle) -> Self {
        let item = self.segment_item(handle);
        self.normalize();
        self.path.push(handle.name().to_string());
        self.items.push(item);
        if self.kind.is_member() || (self.kind.is_type_only() && self.is_static) {
            self.kind = member_kind(handle.kind());
        }
        let target = handle.member_type();
        self.target_type = Some(self.encode(&target));
        self.invalidate();
        self
    }

    /// Append an indexer segment
    pub fn then_index(mut self) -> Self {
        self.push_segment(INDEXER_SEGMENT, None);
        if self.kind.is_member() {
            self.kind = TargetKind::Indexer;
        }
        self
    }

    fn segment_item(&mut self, handle: &MemberHandle) -> Option<SegmentItem> {
        if !matches!(handle.kind(), MemberKind::Method | MemberKind::Constructor) {
            return None;
        }
        let generic_args = handle.generic_args().to_vec();
        let sig = handle.signature()?;
        let param_types = sig
            .params
            .iter()
            .map(|p| TypeToken::encode_in_segment(&p.ty, &generic_args, &mut self.external_refs))
            .collect();
        let generic_args = generic_args.iter().map(|g| self.encode(g)).collect();
        Some(SegmentItem {
            generic_args,
            param_types: Some(param_types),
        })
    }

    // ========================================================================
    // Graph members
    // ========================================================================

    /// A variable of `scope`
    pub fn variable(scope: VariableScope, name: &str, ty: &Type) -> Self {
        let kind = match scope {
            VariableScope::Instance => TargetKind::InstanceVariable,
            VariableScope::Local => TargetKind::LocalVariable,
            VariableScope::Group => TargetKind::GroupVariable,
        };
        Self::with_path(kind, &[name])
            .with_start_type(ty)
            .with_target_type(ty)
    }

    /// A parameter of the running function
    pub fn parameter(name: &str, ty: &Type) -> Self {
        Self::with_path(TargetKind::Parameter, &[name])
            .with_start_type(ty)
            .with_target_type(ty)
    }

    /// A graph-defined function with signature `sig`
    pub fn function(name: &str, sig: &Signature) -> Self {
        let mut r = Self::with_path(TargetKind::Function, &[name]).with_target_type(&sig.ret);
        let tokens = sig.params.iter().map(|p| r.encode(&p.ty)).collect();
        r.items[0] = Some(SegmentItem::params(tokens));
        r
    }

    /// A graph-defined computed property
    pub fn computed_property(name: &str, ty: &Type) -> Self {
        Self::with_path(TargetKind::ComputedProperty, &[name])
            .with_start_type(ty)
            .with_target_type(ty)
    }

    /// Construction of the graph type `ty` through the constructor taking
    /// exactly `params` (a default instance when no constructor matches and
    /// `params` is empty)
    pub fn graph_constructor(ty: &Type, params: &[Type]) -> Self {
        let name = ty.to_string();
        let mut r = Self::with_path(TargetKind::GraphConstructor, &[&name])
            .with_start_type(ty)
            .with_target_type(ty);
        let tokens = params.iter().map(|p| r.encode(p)).collect();
        r.items[0] = Some(SegmentItem::params(tokens));
        r
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn on_node(kind: TargetKind, node: NodeId, start: &str) -> Self {
        let mut r = Self::with_path(kind, &[start]);
        r.instance = Instance::Node(node);
        r
    }

    /// Control transfer into `node`
    pub fn flow_node(node: NodeId) -> Self {
        Self::on_node(TargetKind::FlowNode, node, "entry")
    }

    /// Control transfer into a named flow input of `node`
    pub fn flow_input(node: NodeId, port: &str) -> Self {
        Self::on_node(TargetKind::FlowInput, node, port)
    }

    /// Control transfer into a named extended flow input of `node`
    pub fn flow_input_extended(node: NodeId, port: &str) -> Self {
        Self::on_node(TargetKind::FlowInputExtended, node, port)
    }

    /// The value `node` produces
    pub fn value_node(node: NodeId, ty: &Type) -> Self {
        Self::on_node(TargetKind::ValueNode, node, "value").with_target_type(ty)
    }

    /// A field of `node`
    pub fn node_field(node: NodeId, field: &str, ty: &Type) -> Self {
        Self::on_node(TargetKind::NodeField, node, field)
            .with_start_type(ty)
            .with_target_type(ty)
    }

    /// Element `index` of a collection field of `node`
    pub fn node_field_element(node: NodeId, field: &str, index: usize, element: &Type) -> Self {
        let segment = format!("{}[{}]", field, index);
        Self::on_node(TargetKind::NodeFieldElement, node, &segment).with_target_type(element)
    }

    /// The value held by output `port` of `node`
    pub fn node_output(node: NodeId, port: &str, ty: &Type) -> Self {
        Self::on_node(TargetKind::NodeOutputValue, node, port).with_target_type(ty)
    }
}

fn member_kind(kind: MemberKind) -> TargetKind {
    match kind {
        MemberKind::Event => TargetKind::Event,
        MemberKind::Field => TargetKind::Field,
        MemberKind::Property => TargetKind::Property,
        MemberKind::Method => TargetKind::Method,
        MemberKind::Constructor => TargetKind::Constructor,
        MemberKind::Indexer => TargetKind::Indexer,
    }
}
