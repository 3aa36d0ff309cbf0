//! Get, set and invoke
//!
//! Every operation evaluates the start segment (the *root*), replays the
//! member chain up to the final handle, and applies the operation there.
//! Value-typed links are copies, so after a mutating set or invoke the
//! last-but-one receiver is written back into its own container when the
//! final member is declared on a value type. A struct root reached by that
//! write is stored back into wherever the root came from.

use graphbind_sdk::{BindError, BindResult, NodeId, ParamMode, Signature, Type, Value};
use tracing::trace;

use super::resolve::{functions, nodes, parameters, properties, split_element, variables};
use super::{Instance, MemberRef, ResolvedState, TargetKind};
use crate::debug::DebugHooks;
use crate::engine::BindContext;
use crate::reflect::{MemberKind, MemberProvider};

impl MemberRef {
    /// Read the target
    pub fn get(&mut self, ctx: &BindContext<'_>) -> BindResult<Value> {
        self.get_at(ctx, 0)
    }

    /// Write the target, coercing `value` to its type
    pub fn set(&mut self, ctx: &BindContext<'_>, value: Value) -> BindResult<()> {
        self.set_at(ctx, value, 0)
    }

    /// Call the target. By-reference and output arguments are written back
    /// into `args`.
    pub fn invoke(&mut self, ctx: &BindContext<'_>, args: &mut [Value]) -> BindResult<Value> {
        self.invoke_at(ctx, args, 0)
    }

    /// Whether [`MemberRef::get`] is defined for the target
    pub fn can_get(&mut self, ctx: &BindContext<'_>) -> bool {
        if !self.is_assigned() || self.kind.is_flow() {
            return false;
        }
        let Ok(state) = self.state(ctx) else {
            return false;
        };
        match state.handles.last() {
            Some(last) => last.can_read(),
            None => match &state.function {
                Some((_, sig)) => sig.params.is_empty(),
                None => true,
            },
        }
    }

    /// Whether [`MemberRef::set`] is defined for the target
    pub fn can_set(&mut self, ctx: &BindContext<'_>) -> bool {
        if !self.is_assigned() || self.kind.is_flow() || self.kind == TargetKind::NullConstant {
            return false;
        }
        let Ok(state) = self.state(ctx) else {
            return false;
        };
        match state.handles.last() {
            Some(last) => last.can_write(),
            None => self.root_settable(ctx),
        }
    }

    /// Type produced by [`MemberRef::get`]
    pub fn target_type(&mut self, ctx: &BindContext<'_>) -> BindResult<Type> {
        if self.kind.is_flow() {
            return Ok(Type::VOID);
        }
        let state = self.state(ctx)?;
        Ok(match state.handles.last() {
            Some(last) => last.member_type(),
            None if self.kind.is_type_only() => Type::TYPE,
            None => state.root_type.clone(),
        })
    }

    /// Call shape of the target, when it is callable.
    ///
    /// A root holding a function value reports the function's shape, taken
    /// from its declared type or else from the value itself.
    pub fn signature(&mut self, ctx: &BindContext<'_>) -> BindResult<Option<Signature>> {
        let state = self.state(ctx)?;
        Ok(match state.handles.last() {
            Some(last) => last
                .signature()
                .or_else(|| last.member_type().signature().map(|sig| (*sig).clone())),
            None => match (&state.function, &state.constructor) {
                (Some((_, sig)), _) => Some(sig.clone()),
                (None, Some(ctor)) => ctor.signature(),
                (None, None) if self.kind.is_type_only() || self.kind.is_flow() => None,
                (None, None) => match state.root_type.signature() {
                    Some(sig) => Some((*sig).clone()),
                    None => match self.root_value(ctx, &state, 0) {
                        Ok(Value::Function(f)) => Some((**f.signature()).clone()),
                        _ => None,
                    },
                },
            },
        })
    }

    /// Whether invoking the target writes arguments back
    pub fn has_by_ref(&mut self, ctx: &BindContext<'_>) -> BindResult<bool> {
        Ok(self
            .signature(ctx)?
            .is_some_and(|sig| sig.has_by_ref()))
    }

    // ========================================================================
    // Operations
    // ========================================================================

    fn get_at(&mut self, ctx: &BindContext<'_>, depth: usize) -> BindResult<Value> {
        self.check_depth(ctx, depth)?;
        if self.kind.is_flow() {
            return Err(BindError::unsupported(
                "get",
                format!("{} '{}'", self.kind.label(), self.dotted_path()),
            ));
        }
        let state = self.state(ctx)?;
        let value = match state.handles.split_last() {
            None => self.root_value(ctx, &state, depth)?,
            Some((last, _)) => {
                let mut chain = self.receivers(ctx, &state, depth)?;
                let receiver = chain.last_mut().ok_or(BindError::Unassigned)?;
                last.read(receiver)?
            }
        };
        self.emit(ctx, |hooks, node, slot| hooks.on_get(node, slot, &value));
        Ok(value)
    }

    pub(crate) fn set_at(
        &mut self,
        ctx: &BindContext<'_>,
        value: Value,
        depth: usize,
    ) -> BindResult<()> {
        self.check_depth(ctx, depth)?;
        if self.kind.is_flow() || (self.kind.is_type_only() && self.path.len() == 1) {
            return Err(BindError::unsupported(
                "set",
                format!("{} '{}'", self.kind.label(), self.dotted_path()),
            ));
        }
        let state = self.state(ctx)?;
        let Some(last) = state.handles.last() else {
            let value = ctx.engine.coerce(value, &state.root_type)?;
            self.set_root(ctx, value.clone(), depth)?;
            self.emit(ctx, |hooks, node, slot| hooks.on_set(node, slot, &value));
            return Ok(());
        };

        let expected = last.member_type();
        if !last.can_write() {
            return Err(BindError::unsupported(
                "set",
                format!("{} '{}'", last.kind_label(), self.dotted_path()),
            ));
        }
        // Events take handlers of their delegate shape
        let value = ctx.engine.coerce(value, &expected)?;
        let mut chain = self.receivers(ctx, &state, depth)?;
        let receiver = chain.last_mut().ok_or(BindError::Unassigned)?;
        last.write(receiver, value.clone())?;
        self.write_back(ctx, &state, chain, depth)?;
        self.emit(ctx, |hooks, node, slot| hooks.on_set(node, slot, &value));
        Ok(())
    }

    pub(crate) fn invoke_at(
        &mut self,
        ctx: &BindContext<'_>,
        args: &mut [Value],
        depth: usize,
    ) -> BindResult<Value> {
        self.check_depth(ctx, depth)?;
        if self.kind.is_flow() {
            return Err(BindError::unsupported(
                "invoke",
                format!("{} '{}' outside flow activation", self.kind.label(), self.dotted_path()),
            ));
        }
        let state = self.state(ctx)?;
        let result = match state.handles.last() {
            None => self.invoke_root(ctx, &state, args, depth)?,
            Some(last) => {
                let sig = last.signature();
                let mut call_args = coerce_args(
                    ctx,
                    sig.as_ref(),
                    args,
                    last.kind() == MemberKind::Indexer,
                )?;
                let mut chain = self.receivers(ctx, &state, depth)?;
                let receiver = chain.last_mut().ok_or(BindError::Unassigned)?;
                let result = last.call(receiver, &mut call_args)?;
                copy_back(sig.as_ref(), args, call_args);
                if !last.is_static() {
                    self.write_back(ctx, &state, chain, depth)?;
                }
                result
            }
        };
        self.emit(ctx, |hooks, node, slot| hooks.on_invoke(node, slot, &result));
        Ok(result)
    }

    // ========================================================================
    // Chain replay
    // ========================================================================

    /// Receiver of every handle: `chain[i]` is what `handles[i]` applies to.
    /// Zero-argument methods met on the way are invoked.
    fn receivers(
        &mut self,
        ctx: &BindContext<'_>,
        state: &ResolvedState,
        depth: usize,
    ) -> BindResult<Vec<Value>> {
        let mut chain = Vec::with_capacity(state.handles.len());
        let mut current = self.root_value(ctx, state, depth)?;
        if let Some((_, links)) = state.handles.split_last() {
            for link in links {
                let next = link.read(&mut current)?;
                chain.push(current);
                current = next;
            }
        }
        chain.push(current);
        Ok(chain)
    }

    fn write_back(
        &mut self,
        ctx: &BindContext<'_>,
        state: &ResolvedState,
        mut chain: Vec<Value>,
        depth: usize,
    ) -> BindResult<()> {
        let handles = &state.handles;
        let n = handles.len();
        let Some(last) = handles.last() else {
            return Ok(());
        };
        let mut root_touched = n == 1 && !last.is_static();

        if n >= 2 && !last.is_static() && last.declaring_type().is_value_type() {
            let link = &handles[n - 2];
            if link.can_write() {
                let parent = chain[n - 1].clone();
                link.write(&mut chain[n - 2], parent)?;
                root_touched = n == 2 && !link.is_static();
            } else {
                trace!(
                    target: "graphbind",
                    path = %self.dotted_path(),
                    link = link.name(),
                    "value-type link is not writable, write-back skipped"
                );
            }
        }

        if root_touched && matches!(chain[0], Value::Struct(_)) {
            let root = chain.swap_remove(0);
            self.store_root_back(ctx, root, depth)?;
        }
        Ok(())
    }

    // ========================================================================
    // Root
    // ========================================================================

    fn root_value(
        &mut self,
        ctx: &BindContext<'_>,
        state: &ResolvedState,
        depth: usize,
    ) -> BindResult<Value> {
        let start = self.path[0].as_str();
        match self.kind {
            TargetKind::None => Err(BindError::Unassigned),
            TargetKind::NullConstant => Ok(Value::Null),
            TargetKind::InlineValue => Ok(match &self.instance {
                Instance::Value(v) => v.clone(),
                _ => Value::Null,
            }),
            TargetKind::SelfValue => ctx
                .host
                .self_value()
                .ok_or(BindError::MissingCapability("self value")),
            TargetKind::StaticType | TargetKind::GraphType | TargetKind::GenericParameter => {
                Ok(Value::Type(state.root_type.clone()))
            }
            TargetKind::Field
            | TargetKind::Property
            | TargetKind::Method
            | TargetKind::Constructor
            | TargetKind::Event
            | TargetKind::Indexer => {
                if self.is_static {
                    return Ok(Value::Type(state.root_type.clone()));
                }
                match &mut self.instance {
                    Instance::Value(v) => Ok(v.clone()),
                    Instance::Ref(inner) => inner.get_at(ctx, depth + 1),
                    Instance::Node(id) => nodes(ctx)?.node_value(*id),
                    Instance::None => Err(BindError::NullReference(start.to_string())),
                }
            }
            TargetKind::InstanceVariable | TargetKind::GroupVariable | TargetKind::LocalVariable => {
                variables(ctx, self.kind)?.get_variable(start)
            }
            TargetKind::Function => {
                let (params, sig) = state
                    .function
                    .as_ref()
                    .ok_or(BindError::MissingCapability("functions"))?;
                if !sig.params.is_empty() {
                    return Err(BindError::unsupported(
                        "get",
                        format!("function '{}' with parameters without invoking it", start),
                    ));
                }
                functions(ctx)?.call_function(start, params, &mut [])
            }
            TargetKind::ComputedProperty => properties(ctx)?.get_property(start),
            TargetKind::GraphConstructor => self.construct(state, &mut []),
            TargetKind::Parameter => parameters(ctx)?.get_parameter(start),
            TargetKind::ValueNode => nodes(ctx)?.node_value(self.node_id()?),
            TargetKind::NodeField => nodes(ctx)?.get_field(self.node_id()?, start),
            TargetKind::NodeFieldElement => {
                let (field, index) = split_element(start)?;
                let mut container = nodes(ctx)?.get_field(self.node_id()?, field)?;
                let indexer = ctx
                    .engine
                    .registry()
                    .find_indexer(&container.type_of())
                    .ok_or_else(|| BindError::unsupported("index", container.type_of().to_string()))?;
                indexer.call(&mut container, &mut [element_key(index)?])
            }
            TargetKind::NodeOutputValue => nodes(ctx)?.output_value(self.node_id()?, start),
            TargetKind::FlowNode | TargetKind::FlowInput | TargetKind::FlowInputExtended => {
                Err(BindError::unsupported("get", self.kind.label()))
            }
        }
    }

    fn root_settable(&mut self, ctx: &BindContext<'_>) -> bool {
        let start = self.path[0].as_str();
        match self.kind {
            TargetKind::InlineValue => true,
            TargetKind::InstanceVariable | TargetKind::GroupVariable | TargetKind::LocalVariable => {
                variables(ctx, self.kind).is_ok()
            }
            TargetKind::Parameter => ctx.host.parameters().is_some(),
            TargetKind::ComputedProperty => {
                ctx.host.properties().is_some_and(|p| p.can_set_property(start))
            }
            TargetKind::NodeField | TargetKind::NodeFieldElement => ctx.host.nodes().is_some(),
            kind if kind.is_member() && !self.is_static => match &mut self.instance {
                Instance::Value(_) => true,
                Instance::Ref(inner) => inner.can_set(ctx),
                _ => false,
            },
            _ => false,
        }
    }

    /// Replace the root itself (a single-segment set)
    fn set_root(&mut self, ctx: &BindContext<'_>, value: Value, depth: usize) -> BindResult<()> {
        if !self.store_root(ctx, value, depth)? {
            return Err(BindError::unsupported(
                "set",
                format!("{} '{}'", self.kind.label(), self.dotted_path()),
            ));
        }
        Ok(())
    }

    /// Store a mutated struct root; roots without a home are left alone
    fn store_root_back(&mut self, ctx: &BindContext<'_>, root: Value, depth: usize) -> BindResult<()> {
        if !self.store_root(ctx, root, depth)? {
            trace!(
                target: "graphbind",
                path = %self.dotted_path(),
                kind = self.kind.label(),
                "root has no storage, store-back skipped"
            );
        }
        Ok(())
    }

    /// Write `value` where the root came from; false when the root kind has
    /// no storage
    fn store_root(&mut self, ctx: &BindContext<'_>, value: Value, depth: usize) -> BindResult<bool> {
        let start = self.path[0].clone();
        match self.kind {
            TargetKind::InlineValue => {
                // Keeps the cached resolution: the root type is unchanged.
                self.instance = Instance::Value(value);
            }
            TargetKind::InstanceVariable | TargetKind::GroupVariable | TargetKind::LocalVariable => {
                variables(ctx, self.kind)?.set_variable(&start, value)?;
            }
            TargetKind::Parameter => parameters(ctx)?.set_parameter(&start, value)?,
            TargetKind::ComputedProperty => {
                let props = properties(ctx)?;
                if !props.can_set_property(&start) {
                    return Ok(false);
                }
                props.set_property(&start, value)?;
            }
            TargetKind::NodeField => nodes(ctx)?.set_field(self.node_id()?, &start, value)?,
            TargetKind::NodeFieldElement => {
                let id = self.node_id()?;
                let (field, index) = split_element(&start)?;
                let accessor = nodes(ctx)?;
                let mut container = accessor.get_field(id, field)?;
                let indexer = ctx
                    .engine
                    .registry()
                    .find_indexer(&container.type_of())
                    .ok_or_else(|| BindError::unsupported("index", container.type_of().to_string()))?;
                indexer.call(&mut container, &mut [element_key(index)?, value])?;
                if matches!(container, Value::Struct(_)) {
                    accessor.set_field(id, field, container)?;
                }
            }
            kind if kind.is_member() && !self.is_static => match &mut self.instance {
                Instance::Value(slot) => *slot = value,
                Instance::Ref(inner) => {
                    if !inner.can_set(ctx) {
                        return Ok(false);
                    }
                    inner.set_at(ctx, value, depth + 1)?;
                }
                _ => return Ok(false),
            },
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn invoke_root(
        &mut self,
        ctx: &BindContext<'_>,
        state: &ResolvedState,
        args: &mut [Value],
        depth: usize,
    ) -> BindResult<Value> {
        match self.kind {
            TargetKind::Function => {
                let (params, sig) = state
                    .function
                    .as_ref()
                    .ok_or(BindError::MissingCapability("functions"))?;
                let mut call_args = coerce_args(ctx, Some(sig), args, false)?;
                let result = functions(ctx)?.call_function(&self.path[0], params, &mut call_args)?;
                copy_back(Some(sig), args, call_args);
                Ok(result)
            }
            TargetKind::GraphConstructor => {
                let sig = state.constructor.as_ref().and_then(|c| c.signature());
                let mut call_args = coerce_args(ctx, sig.as_ref(), args, false)?;
                let result = self.construct(state, &mut call_args)?;
                copy_back(sig.as_ref(), args, call_args);
                Ok(result)
            }
            _ => match self.root_value(ctx, state, depth)? {
                Value::Function(f) => {
                    let sig = f.signature().clone();
                    let mut call_args = coerce_args(ctx, Some(&*sig), args, false)?;
                    let result = f.call(&mut call_args)?;
                    copy_back(Some(&*sig), args, call_args);
                    Ok(result)
                }
                other => Err(BindError::unsupported(
                    "invoke",
                    format!("{} '{}' holding {}", self.kind.label(), self.dotted_path(), other.type_of()),
                )),
            },
        }
    }

    fn construct(&self, state: &ResolvedState, args: &mut [Value]) -> BindResult<Value> {
        match &state.constructor {
            Some(ctor) => ctor.call(&mut Value::Null, args),
            None if args.is_empty() => Value::instantiate(&state.root_type),
            None => Err(BindError::Argument(format!(
                "{} has no constructor taking {} argument(s)",
                state.root_type,
                args.len()
            ))),
        }
    }

    // ========================================================================
    // Instrumentation
    // ========================================================================

    fn check_depth(&self, ctx: &BindContext<'_>, depth: usize) -> BindResult<()> {
        if depth > ctx.engine.options().max_chain_depth {
            return Err(BindError::Argument(format!(
                "instance chain of '{}' deeper than {}",
                self.dotted_path(),
                ctx.engine.options().max_chain_depth
            )));
        }
        Ok(())
    }

    pub(crate) fn emit(
        &self,
        ctx: &BindContext<'_>,
        report: impl FnOnce(&dyn DebugHooks, NodeId, &str),
    ) {
        if !ctx.engine.options().instrument {
            return;
        }
        let node = match self.instance {
            Instance::Node(id) => Some(id),
            _ => ctx.node,
        };
        if let Some(node) = node {
            report(&**ctx.engine.hooks(), node, &self.dotted_path());
        }
    }
}

/// Coerce call arguments to a signature. Indexers take their keys and an
/// optional trailing value of the item type; output arguments that are still
/// null start from the parameter's default.
fn coerce_args(
    ctx: &BindContext<'_>,
    sig: Option<&Signature>,
    args: &[Value],
    indexer: bool,
) -> BindResult<Vec<Value>> {
    let Some(sig) = sig else {
        return Ok(args.to_vec());
    };
    let keys = sig.params.len();
    let arity_ok = args.len() == keys || (indexer && args.len() == keys + 1);
    if !arity_ok {
        return Err(BindError::Argument(format!(
            "{} expects {} argument(s), got {}",
            sig,
            keys,
            args.len()
        )));
    }
    args.iter()
        .enumerate()
        .map(|(i, arg)| match sig.params.get(i) {
            Some(param) if param.mode == ParamMode::Out && arg.is_null() => {
                Ok(Value::default_for(&param.ty))
            }
            Some(param) => ctx.engine.coerce(arg.clone(), &param.ty),
            None => ctx.engine.coerce(arg.clone(), &sig.ret),
        })
        .collect()
}

/// Copy by-reference and output arguments back to the caller
fn element_key(index: usize) -> BindResult<Value> {
    i32::try_from(index)
        .map(Value::I32)
        .map_err(|_| BindError::Argument(format!("element index {} out of range", index)))
}

fn copy_back(sig: Option<&Signature>, args: &mut [Value], call_args: Vec<Value>) {
    let Some(sig) = sig else { return };
    for ((param, arg), value) in sig.params.iter().zip(args.iter_mut()).zip(call_args) {
        if param.mode.is_by_ref() {
            *arg = value;
        }
    }
}
