use std::sync::Arc;

use graphbind_sdk::{
    BindError, BindResult, FunctionContainer, NodeAccessor, NodeId, ParameterContainer,
    PropertyContainer, Type, VariableContainer,
};
use tracing::{debug, warn};

use super::{Instance, MemberRef, ResolvedState, TargetKind};
use crate::defaults::CONSTRUCTOR_SEGMENT;
use crate::engine::BindContext;
use crate::reflect::{MemberHandle, MemberProvider};
use crate::token::{decode, TypeToken};

/// Segment name addressing an indexer
pub(crate) const INDEXER_SEGMENT: &str = "[]";

impl MemberRef {
    /// Resolve the path into member handles, reusing the cached resolution.
    ///
    /// With strict options an unresolvable segment fails with
    /// [`BindError::MissingMember`] naming the full path; otherwise the
    /// failure is logged and an empty slice returned.
    pub fn resolve(&mut self, ctx: &BindContext<'_>) -> BindResult<&[MemberHandle]> {
        match self.state(ctx) {
            Ok(_) => Ok(self.resolved_handles().unwrap_or(&[])),
            Err(err)
                if !ctx.engine.options().strict
                    && (err.is_missing_member() || matches!(err, BindError::MissingType(_))) =>
            {
                warn!(target: "graphbind", path = %self.dotted_path(), error = %err, "lenient resolution failed");
                Ok(&[])
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve without failing; an empty slice means nothing resolved
    pub fn try_resolve(&mut self, ctx: &BindContext<'_>) -> &[MemberHandle] {
        if self.state(ctx).is_ok() {
            self.resolved_handles().unwrap_or(&[])
        } else {
            &[]
        }
    }

    /// Resolve and report why it failed, if it did
    pub fn diagnose(&mut self, ctx: &BindContext<'_>) -> Option<BindError> {
        self.state(ctx).err()
    }

    pub(crate) fn state(&mut self, ctx: &BindContext<'_>) -> BindResult<Arc<ResolvedState>> {
        if let Some(state) = &self.resolved {
            return Ok(state.clone());
        }
        if !self.is_assigned() {
            return Err(BindError::Unassigned);
        }
        self.normalize();

        let function = if self.kind == TargetKind::Function {
            Some(self.function_signature(ctx)?)
        } else {
            None
        };
        let root_type = match &function {
            Some((_, sig)) => sig.ret.clone(),
            None => self.root_type(ctx)?,
        };
        let constructor = if self.kind == TargetKind::GraphConstructor {
            let (_, params) = self.segment_types(ctx, 0)?;
            ctx.engine
                .registry()
                .find_constructor(&root_type, params.as_deref())
        } else {
            None
        };
        let handles = self.resolve_chain(ctx, &root_type)?;

        debug!(
            target: "graphbind",
            path = %self.dotted_path(),
            kind = self.kind.label(),
            root = %root_type,
            handles = handles.len(),
            "descriptor resolved"
        );
        let state = Arc::new(ResolvedState {
            root_type,
            handles,
            function,
            constructor,
        });
        self.resolved = Some(state.clone());
        Ok(state)
    }

    // ========================================================================
    // Start segment
    // ========================================================================

    fn root_type(&mut self, ctx: &BindContext<'_>) -> BindResult<Type> {
        let start = self.path[0].clone();
        let declared = self.start_type.as_ref().map(|t| self.decode(ctx, t, &[]));

        match self.kind {
            TargetKind::None => Err(BindError::Unassigned),
            TargetKind::NullConstant => Ok(self
                .target_type
                .as_ref()
                .map(|t| self.decode(ctx, t, &[]))
                .unwrap_or(Type::OBJECT)),
            TargetKind::InlineValue => Ok(declared.unwrap_or_else(|| match &self.instance {
                Instance::Value(v) => v.type_of(),
                _ => Type::OBJECT,
            })),
            TargetKind::SelfValue => match declared {
                Some(ty) => known(ty),
                None => ctx
                    .host
                    .self_value()
                    .map(|v| v.type_of())
                    .ok_or(BindError::MissingCapability("self value")),
            },
            TargetKind::StaticType | TargetKind::GraphType | TargetKind::GraphConstructor => {
                known(declared.ok_or_else(|| BindError::MissingType(start.clone()))?)
            }
            TargetKind::GenericParameter => {
                let (name, rank) = split_rank(&start);
                let bound = ctx
                    .generics
                    .lookup(name)
                    .cloned()
                    .or_else(|| {
                        ctx.host
                            .generic_parameters()
                            .and_then(|g| g.generic_parameter(name))
                    })
                    .ok_or_else(|| BindError::UnknownName {
                        what: "generic parameter",
                        name: name.to_string(),
                    })?;
                Ok((0..rank).fold(bound, |ty, _| Type::array_of(ty)))
            }
            TargetKind::Field
            | TargetKind::Property
            | TargetKind::Method
            | TargetKind::Constructor
            | TargetKind::Event
            | TargetKind::Indexer => {
                if self.is_static {
                    return known(declared.ok_or_else(|| BindError::MissingType(start.clone()))?);
                }
                if let Some(ty) = declared {
                    return known(ty);
                }
                match &mut self.instance {
                    Instance::Value(v) => Ok(v.type_of()),
                    Instance::Ref(inner) => inner.target_type(ctx),
                    Instance::Node(id) => Ok(nodes(ctx)?.node_value_type(*id).unwrap_or(Type::OBJECT)),
                    Instance::None => Ok(Type::OBJECT),
                }
            }
            TargetKind::InstanceVariable | TargetKind::GroupVariable | TargetKind::LocalVariable => {
                variables(ctx, self.kind)?
                    .variable_type(&start)
                    .or(declared)
                    .ok_or(BindError::UnknownName {
                        what: "variable",
                        name: start,
                    })
            }
            TargetKind::Parameter => parameters(ctx)?
                .parameter_type(&start)
                .or(declared)
                .ok_or(BindError::UnknownName {
                    what: "parameter",
                    name: start,
                }),
            TargetKind::ComputedProperty => properties(ctx)?
                .property_type(&start)
                .or(declared)
                .ok_or(BindError::UnknownName {
                    what: "property",
                    name: start,
                }),
            // Flow targets produce nothing
            TargetKind::FlowNode | TargetKind::FlowInput | TargetKind::FlowInputExtended => {
                Ok(Type::VOID)
            }
            TargetKind::ValueNode => {
                let id = self.node_id()?;
                Ok(nodes(ctx)?.node_value_type(id).or(declared).unwrap_or(Type::OBJECT))
            }
            TargetKind::NodeField => {
                let id = self.node_id()?;
                nodes(ctx)?
                    .field_type(id, &start)
                    .or(declared)
                    .ok_or(BindError::UnknownName {
                        what: "node field",
                        name: start,
                    })
            }
            TargetKind::NodeFieldElement => {
                let id = self.node_id()?;
                let (field, _) = split_element(&start)?;
                let container = nodes(ctx)?.field_type(id, field).ok_or_else(|| {
                    BindError::UnknownName {
                        what: "node field",
                        name: field.to_string(),
                    }
                })?;
                match ctx.engine.registry().find_indexer(&container) {
                    Some(indexer) => Ok(indexer.member_type()),
                    None => declared.ok_or_else(|| BindError::MissingMember {
                        path: self.dotted_path(),
                        searched: container.to_string(),
                    }),
                }
            }
            TargetKind::NodeOutputValue => {
                let id = self.node_id()?;
                nodes(ctx)?
                    .output_type(id, &start)
                    .or(declared)
                    .ok_or(BindError::UnknownName {
                        what: "output port",
                        name: start,
                    })
            }
            TargetKind::Function => unreachable_kind(self.kind),
        }
    }

    fn function_signature(
        &self,
        ctx: &BindContext<'_>,
    ) -> BindResult<(Vec<Type>, graphbind_sdk::Signature)> {
        let name = &self.path[0];
        let (_, params) = self.segment_types(ctx, 0)?;
        let params = params.unwrap_or_default();
        let sig = functions(ctx)?
            .find_function(name, &params)
            .ok_or_else(|| BindError::UnknownName {
                what: "function",
                name: name.clone(),
            })?;
        Ok((params, sig))
    }

    // ========================================================================
    // Member chain
    // ========================================================================

    fn resolve_chain(&self, ctx: &BindContext<'_>, root: &Type) -> BindResult<Vec<MemberHandle>> {
        let provider: &dyn MemberProvider = ctx.engine.registry();
        let last = self.path.len() - 1;
        let mut owner = root.clone();
        let mut handles = Vec::with_capacity(last);

        for index in 1..=last {
            let name = &self.path[index];
            let (generic_args, params) = self.segment_types(ctx, index)?;
            let found = find_member(
                provider,
                &owner,
                name,
                params.as_deref(),
                &generic_args,
                index == last,
            );
            let Some(handle) = found else {
                return Err(BindError::MissingMember {
                    path: self.dotted_path(),
                    searched: owner.to_string(),
                });
            };
            owner = handle.member_type();
            handles.push(handle);
        }
        Ok(handles)
    }

    /// Decoded generic arguments and parameter types of one segment
    fn segment_types(
        &self,
        ctx: &BindContext<'_>,
        index: usize,
    ) -> BindResult<(Vec<Type>, Option<Vec<Type>>)> {
        let Some(Some(item)) = self.items.get(index) else {
            return Ok((Vec::new(), None));
        };
        let generic_args: Vec<Type> = item
            .generic_args
            .iter()
            .map(|t| self.decode(ctx, t, &[]))
            .collect();
        let params = item.param_types.as_ref().map(|tokens| {
            tokens
                .iter()
                .map(|t| self.decode(ctx, t, &generic_args))
                .collect::<Vec<_>>()
        });
        if let Some(missing) = generic_args
            .iter()
            .chain(params.iter().flatten())
            .find(|t| t.is_missing())
        {
            return Err(BindError::MissingType(missing_name(missing)));
        }
        Ok((generic_args, params))
    }

    pub(crate) fn decode(&self, ctx: &BindContext<'_>, token: &TypeToken, siblings: &[Type]) -> Type {
        decode(token, &ctx.decode_scope(&self.external_refs).with_siblings(siblings))
    }

    pub(crate) fn node_id(&self) -> BindResult<NodeId> {
        match self.instance {
            Instance::Node(id) => Ok(id),
            _ => Err(BindError::Argument(format!(
                "{} '{}' has no node",
                self.kind.label(),
                self.dotted_path()
            ))),
        }
    }
}

/// Event, field, property, method; then an indexer or, on the final
/// segment only, a constructor
fn find_member(
    provider: &dyn MemberProvider,
    owner: &Type,
    name: &str,
    params: Option<&[Type]>,
    generic_args: &[Type],
    is_last: bool,
) -> Option<MemberHandle> {
    if name == INDEXER_SEGMENT {
        return provider.find_indexer(owner);
    }
    provider
        .find_event(owner, name)
        .or_else(|| provider.find_field(owner, name))
        .or_else(|| provider.find_property(owner, name))
        .or_else(|| provider.find_method(owner, name, params, generic_args))
        .or_else(|| {
            (is_last && name == CONSTRUCTOR_SEGMENT)
                .then(|| provider.find_constructor(owner, params))
                .flatten()
        })
}

fn known(ty: Type) -> BindResult<Type> {
    match ty {
        Type::Missing(name) => Err(BindError::MissingType(name.to_string())),
        ty => Ok(ty),
    }
}

fn missing_name(ty: &Type) -> String {
    match ty {
        Type::Missing(name) => name.to_string(),
        other => other.to_string(),
    }
}

fn unreachable_kind(kind: TargetKind) -> BindResult<Type> {
    Err(BindError::unsupported("resolve", format!("{} start segment", kind.label())))
}

/// `T[][]` -> (`T`, 2)
pub(crate) fn split_rank(segment: &str) -> (&str, usize) {
    let mut name = segment;
    let mut rank = 0;
    while let Some(inner) = name.strip_suffix("[]") {
        name = inner;
        rank += 1;
    }
    (name, rank)
}

/// `items[3]` -> (`items`, 3)
pub(crate) fn split_element(segment: &str) -> BindResult<(&str, usize)> {
    let malformed = || BindError::Argument(format!("expected 'field[index]', got '{}'", segment));
    let (field, rest) = segment.split_once('[').ok_or_else(malformed)?;
    let index = rest
        .strip_suffix(']')
        .and_then(|i| i.trim().parse::<usize>().ok())
        .ok_or_else(malformed)?;
    Ok((field, index))
}

// ============================================================================
// Owner capabilities
// ============================================================================

pub(crate) fn variables<'a>(
    ctx: &BindContext<'a>,
    kind: TargetKind,
) -> BindResult<&'a dyn VariableContainer> {
    let scope = kind
        .variable_scope()
        .ok_or_else(|| BindError::unsupported("read variables of", kind.label()))?;
    ctx.host
        .variables(scope)
        .ok_or(BindError::MissingCapability("variables"))
}

pub(crate) fn parameters<'a>(ctx: &BindContext<'a>) -> BindResult<&'a dyn ParameterContainer> {
    ctx.host
        .parameters()
        .ok_or(BindError::MissingCapability("parameters"))
}

pub(crate) fn properties<'a>(ctx: &BindContext<'a>) -> BindResult<&'a dyn PropertyContainer> {
    ctx.host
        .properties()
        .ok_or(BindError::MissingCapability("properties"))
}

pub(crate) fn functions<'a>(ctx: &BindContext<'a>) -> BindResult<&'a dyn FunctionContainer> {
    ctx.host
        .functions()
        .ok_or(BindError::MissingCapability("functions"))
}

pub(crate) fn nodes<'a>(ctx: &BindContext<'a>) -> BindResult<&'a dyn NodeAccessor> {
    ctx.host.nodes().ok_or(BindError::MissingCapability("nodes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rank() {
        assert_eq!(split_rank("T"), ("T", 0));
        assert_eq!(split_rank("T[][]"), ("T", 2));
    }

    #[test]
    fn test_split_element() {
        assert_eq!(split_element("items[3]").unwrap(), ("items", 3));
        assert!(split_element("items").is_err());
        assert!(split_element("items[-1]").is_err());
    }
}
