//! Shared fixtures: a small scene of host types and an in-memory graph owner

#![allow(dead_code)]

use std::cell::RefCell;

use graphbind_engine::{create_standard_registry, Engine, EngineOptions};
use graphbind_sdk::{
    BindError, BindResult, EventInfo, FieldInfo, FlowHandle, FlowOutcome, FlowPort,
    FunctionContainer, GenericParameterContainer, GraphHost, IndexerInfo, MethodInfo, NodeAccessor,
    NodeId, ParamInfo, ParamMode, ParamSig, ParameterContainer, PropertyContainer, PropertyInfo,
    Signature, SlotTable, Type, TypeDef, Value, VariableContainer, VariableScope,
};
use rustc_hash::FxHashMap;

/// Host types registered by [`scene`]
pub struct Scene {
    pub engine: Engine,
    pub vector: Type,
    pub player: Type,
    pub inventory: Type,
}

pub fn damage_handler() -> Signature {
    Signature::new(vec![Type::I32], Type::VOID)
}

/// `Vector3` (struct), `Player` (class) and `Inventory` (class with an indexer)
pub fn scene(options: EngineOptions) -> Scene {
    let registry = create_standard_registry();
    let vector = registry.register(
        TypeDef::structure("Vector3")
            .field(FieldInfo::new("x", Type::F32))
            .field(FieldInfo::new("y", Type::F32))
            .field(FieldInfo::new("z", Type::F32))
            .build(),
    );
    let player = registry.register(
        TypeDef::class("Player")
            .field(FieldInfo::new("position", vector.clone()))
            .field(FieldInfo::new("name", Type::STRING))
            .field(FieldInfo::new("health", Type::I32))
            .property(
                PropertyInfo::new("Alive", Type::BOOL).getter(|receiver| {
                    let health = receiver
                        .as_object()
                        .and_then(|o| o.field("health"))
                        .and_then(|v| v.as_i64())
                        .unwrap_or(0);
                    Ok(Value::Bool(health > 0))
                }),
            )
            .method(
                MethodInfo::new("Heal", Type::I32, |receiver, _, args| {
                    let obj = receiver
                        .as_object()
                        .ok_or_else(|| BindError::NullReference("Player".to_string()))?;
                    let health = obj.field("health").and_then(|v| v.as_i64()).unwrap_or(0);
                    let amount = args[0].as_i64().unwrap_or(0);
                    let healed = (health + amount) as i32;
                    obj.set_field("health", Value::I32(healed));
                    Ok(Value::I32(healed))
                })
                .param(ParamInfo::new("amount", Type::I32)),
            )
            .method(
                MethodInfo::new("TryParse", Type::BOOL, |_, _, args| {
                    match args[0].as_str().and_then(|s| s.parse::<i32>().ok()) {
                        Some(n) => {
                            args[1] = Value::I32(n);
                            Ok(Value::Bool(true))
                        }
                        None => Ok(Value::Bool(false)),
                    }
                })
                .param(ParamInfo::new("text", Type::STRING))
                .param(ParamInfo::new("result", Type::I32).out())
                .as_static(),
            )
            .event(EventInfo::new("Damaged", Type::function(damage_handler())))
            .build(),
    );
    let inventory = registry.register(
        TypeDef::class("Inventory")
            .field(FieldInfo::new("slots", Type::array_of(Type::STRING)))
            .indexer(
                IndexerInfo::new(vec![Type::I32], Type::STRING, |receiver, keys| {
                    let slots = slots_of(receiver)?;
                    let index = keys[0].as_index().unwrap_or(usize::MAX);
                    slots
                        .get(index)
                        .ok_or_else(|| BindError::Argument(format!("no slot {}", index)))
                })
                .setter(|receiver, keys, value| {
                    let slots = slots_of(receiver)?;
                    let index = keys[0].as_index().unwrap_or(usize::MAX);
                    if slots.set(index, value) {
                        Ok(())
                    } else {
                        Err(BindError::Argument(format!("no slot {}", index)))
                    }
                }),
            )
            .build(),
    );
    Scene {
        engine: Engine::new(registry).with_options(options),
        vector,
        player,
        inventory,
    }
}

fn slots_of(receiver: &Value) -> BindResult<graphbind_sdk::ArrayRef> {
    match receiver.as_object().and_then(|o| o.field("slots")) {
        Some(Value::Array(slots)) => Ok(slots),
        _ => Err(BindError::NullReference("slots".to_string())),
    }
}

/// Fresh `Player` with the given health
pub fn new_player(scene: &Scene, health: i32) -> Value {
    let player = Value::instantiate(&scene.player).unwrap();
    if let Value::Object(obj) = &player {
        obj.set_field("health", Value::I32(health));
        obj.set_field("name", Value::from("hero"));
    }
    player
}

// ============================================================================
// Graph owner
// ============================================================================

/// Graph functions: `Divide(i32, i32, out i32) -> i32` and `Answer() -> i32`
#[derive(Default)]
pub struct Functions;

impl Functions {
    fn divide() -> Signature {
        Signature {
            params: vec![
                ParamSig::new(Type::I32),
                ParamSig::new(Type::I32),
                ParamSig::with_mode(Type::I32, ParamMode::Out),
            ],
            ret: Type::I32,
        }
    }
}

impl FunctionContainer for Functions {
    fn find_function(&self, name: &str, params: &[Type]) -> Option<Signature> {
        let sig = match name {
            "Divide" => Self::divide(),
            "Answer" => Signature::new(Vec::new(), Type::I32),
            _ => return None,
        };
        (params.is_empty() || sig.param_types() == params).then_some(sig)
    }

    fn call_function(&self, name: &str, _params: &[Type], args: &mut [Value]) -> BindResult<Value> {
        match name {
            "Divide" => {
                let a = args[0].as_i64().unwrap_or(0) as i32;
                let b = args[1].as_i64().unwrap_or(0) as i32;
                if b == 0 {
                    return Err(BindError::Argument("division by zero".to_string()));
                }
                args[2] = Value::I32(a % b);
                Ok(Value::I32(a / b))
            }
            "Answer" => Ok(Value::I32(42)),
            other => Err(BindError::UnknownName {
                what: "function",
                name: other.to_string(),
            }),
        }
    }
}

/// Computed property `Doubled` over the variable `score`
pub struct Properties {
    pub variables: SlotTable,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            variables: SlotTable::new().with("score", Type::I32, Value::I32(0)),
        }
    }
}

impl PropertyContainer for Properties {
    fn property_type(&self, name: &str) -> Option<Type> {
        (name == "Doubled").then_some(Type::I32)
    }

    fn can_set_property(&self, name: &str) -> bool {
        name == "Doubled"
    }

    fn get_property(&self, _name: &str) -> BindResult<Value> {
        let score = self.variables.get_variable("score")?.as_i64().unwrap_or(0);
        Ok(Value::I32((score * 2) as i32))
    }

    fn set_property(&self, _name: &str, value: Value) -> BindResult<()> {
        let doubled = value.as_i64().unwrap_or(0);
        self.variables.set_variable("score", Value::I32((doubled / 2) as i32))
    }
}

/// Nodes keyed by id: produced values, fields, output ports and flow
/// activations
#[derive(Default)]
pub struct Nodes {
    pub values: RefCell<FxHashMap<NodeId, (Type, Value)>>,
    pub fields: RefCell<FxHashMap<(NodeId, String), (Type, Value)>>,
    pub outputs: RefCell<FxHashMap<(NodeId, String), (Type, Value)>>,
    pub activations: RefCell<Vec<(NodeId, FlowPort)>>,
    pub pending: RefCell<FxHashMap<NodeId, FlowHandle>>,
}

impl Nodes {
    pub fn with_field(self, node: NodeId, field: &str, ty: Type, value: Value) -> Self {
        self.fields
            .borrow_mut()
            .insert((node, field.to_string()), (ty, value));
        self
    }

    pub fn with_output(self, node: NodeId, port: &str, ty: Type, value: Value) -> Self {
        self.outputs
            .borrow_mut()
            .insert((node, port.to_string()), (ty, value));
        self
    }

    pub fn with_value(self, node: NodeId, ty: Type, value: Value) -> Self {
        self.values.borrow_mut().insert(node, (ty, value));
        self
    }

    /// Activations of `node` suspend until the returned handle finishes
    pub fn suspend_on(&self, node: NodeId) -> FlowHandle {
        let handle = FlowHandle::new();
        self.pending.borrow_mut().insert(node, handle.clone());
        handle
    }
}

fn unknown(what: &'static str, name: impl Into<String>) -> BindError {
    BindError::UnknownName {
        what,
        name: name.into(),
    }
}

impl NodeAccessor for Nodes {
    fn node_value_type(&self, node: NodeId) -> Option<Type> {
        self.values.borrow().get(&node).map(|(ty, _)| ty.clone())
    }

    fn node_value(&self, node: NodeId) -> BindResult<Value> {
        self.values
            .borrow()
            .get(&node)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| unknown("node", node.0.to_string()))
    }

    fn field_type(&self, node: NodeId, field: &str) -> Option<Type> {
        self.fields
            .borrow()
            .get(&(node, field.to_string()))
            .map(|(ty, _)| ty.clone())
    }

    fn get_field(&self, node: NodeId, field: &str) -> BindResult<Value> {
        self.fields
            .borrow()
            .get(&(node, field.to_string()))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| unknown("node field", field))
    }

    fn set_field(&self, node: NodeId, field: &str, value: Value) -> BindResult<()> {
        match self.fields.borrow_mut().get_mut(&(node, field.to_string())) {
            Some(slot) => {
                slot.1 = value;
                Ok(())
            }
            None => Err(unknown("node field", field)),
        }
    }

    fn output_type(&self, node: NodeId, port: &str) -> Option<Type> {
        self.outputs
            .borrow()
            .get(&(node, port.to_string()))
            .map(|(ty, _)| ty.clone())
    }

    fn output_value(&self, node: NodeId, port: &str) -> BindResult<Value> {
        self.outputs
            .borrow()
            .get(&(node, port.to_string()))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| unknown("output port", port))
    }

    fn activate(&self, node: NodeId, port: &FlowPort) -> BindResult<FlowOutcome> {
        self.activations.borrow_mut().push((node, port.clone()));
        match self.pending.borrow().get(&node) {
            Some(handle) => {
                handle.activate();
                handle.suspend();
                Ok(FlowOutcome::Suspended(handle.clone()))
            }
            None => Ok(FlowOutcome::Finished),
        }
    }
}

/// Graph owner with every capability
pub struct TestGraph {
    pub this: Option<Value>,
    pub instance: SlotTable,
    pub group: SlotTable,
    pub locals: SlotTable,
    pub params: SlotTable,
    pub generics: Generics,
    pub functions: Functions,
    pub properties: Properties,
    pub nodes: Nodes,
}

impl Default for TestGraph {
    fn default() -> Self {
        Self {
            this: None,
            instance: SlotTable::new(),
            group: SlotTable::new(),
            locals: SlotTable::new(),
            params: SlotTable::new(),
            generics: Generics::default(),
            functions: Functions,
            properties: Properties::default(),
            nodes: Nodes::default(),
        }
    }
}

/// Generic-type parameters bound by the graph
#[derive(Default)]
pub struct Generics(pub FxHashMap<String, Type>);

impl GenericParameterContainer for Generics {
    fn generic_parameter(&self, name: &str) -> Option<Type> {
        self.0.get(name).cloned()
    }
}

impl GraphHost for TestGraph {
    fn self_value(&self) -> Option<Value> {
        self.this.clone()
    }

    fn variables(&self, scope: VariableScope) -> Option<&dyn VariableContainer> {
        Some(match scope {
            VariableScope::Instance => &self.instance,
            VariableScope::Group => &self.group,
            VariableScope::Local => &self.locals,
        })
    }

    fn parameters(&self) -> Option<&dyn ParameterContainer> {
        Some(&self.params)
    }

    fn generic_parameters(&self) -> Option<&dyn GenericParameterContainer> {
        Some(&self.generics)
    }

    fn functions(&self) -> Option<&dyn FunctionContainer> {
        Some(&self.functions)
    }

    fn properties(&self) -> Option<&dyn PropertyContainer> {
        Some(&self.properties)
    }

    fn nodes(&self) -> Option<&dyn NodeAccessor> {
        Some(&self.nodes)
    }
}
