//! Type definitions and their members
//!
//! A [`TypeDef`] is the introspectable description of a host type or of a
//! graph-defined type: fields, properties, methods, constructors, events, an
//! optional indexer and user conversion operators. Member bodies are plain
//! closures so hosts without native reflection can populate a registry by
//! hand or from generated code.
//!
//! Member signatures may mention the declaring type's generic parameters and
//! the [`SELF_TYPE_NAME`](crate::types::SELF_TYPE_NAME) placeholder; both are
//! bound by [`TypeDef::bind_member_type`] against a concrete owner type.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{BindError, BindResult};
use crate::types::{ParamMode, ParamSig, Signature, Type, SELF_TYPE_NAME};
use crate::value::{Callable, EnumValue, Value};

static NEXT_TYPE_DEF_ID: AtomicU64 = AtomicU64::new(1);

/// Field/property getter body
pub type GetterFn = Arc<dyn Fn(&Value) -> BindResult<Value> + Send + Sync>;
/// Field/property setter body; may mutate a struct receiver in place
pub type SetterFn = Arc<dyn Fn(&mut Value, Value) -> BindResult<()> + Send + Sync>;
/// Method body: receiver (`Null` for static), generic arguments, arguments
pub type MethodFn =
    Arc<dyn Fn(&mut Value, &[Type], &mut [Value]) -> BindResult<Value> + Send + Sync>;
/// Constructor body: constructed type, arguments
pub type ConstructorFn = Arc<dyn Fn(&Type, &mut [Value]) -> BindResult<Value> + Send + Sync>;
/// User conversion operator body
pub type ConvertFn = Arc<dyn Fn(Value) -> BindResult<Value> + Send + Sync>;
/// Indexer read body
pub type IndexGetFn = Arc<dyn Fn(&Value, &[Value]) -> BindResult<Value> + Send + Sync>;
/// Indexer write body
pub type IndexSetFn = Arc<dyn Fn(&mut Value, &[Value], Value) -> BindResult<()> + Send + Sync>;

/// Unique identity of a type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDefId(u64);

impl TypeDefId {
    fn next() -> Self {
        TypeDefId(NEXT_TYPE_DEF_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Reference to the asset that defines a graph type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetRef {
    /// Stable asset identifier
    pub id: String,
    /// Display name of the defined type
    pub name: String,
}

impl AssetRef {
    /// Create an asset reference
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Where a definition comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeOrigin {
    /// Known ahead of time
    Host,
    /// Exists only because a loaded asset defines it
    Graph(AssetRef),
}

/// Shape of a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDefKind {
    /// Reference type
    Class,
    /// Value type
    Struct,
    /// Interface
    Interface,
    /// Enumeration (value type)
    Enum,
    /// Named function shape
    Delegate,
}

// ============================================================================
// Members
// ============================================================================

enum FieldStorage {
    /// Stored in the receiver's named slot
    Slot,
    /// Owned by the definition
    Static(Arc<Mutex<Value>>),
    /// Computed by host code
    Native {
        get: GetterFn,
        set: Option<SetterFn>,
    },
}

/// Field description
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: Type,
    /// Whether the field belongs to the type rather than an instance
    pub is_static: bool,
    /// Whether writes are rejected
    pub is_readonly: bool,
    /// Initial value for new instances
    pub initial: Option<Value>,
    storage: FieldStorage,
}

impl FieldInfo {
    /// Instance field stored in the receiver
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            is_static: false,
            is_readonly: false,
            initial: None,
            storage: FieldStorage::Slot,
        }
    }

    /// Field computed by host code
    pub fn native(name: impl Into<String>, ty: Type, get: GetterFn, set: Option<SetterFn>) -> Self {
        Self {
            name: name.into(),
            ty,
            is_static: false,
            is_readonly: set.is_none(),
            initial: None,
            storage: FieldStorage::Native { get, set },
        }
    }

    /// Move storage onto the definition
    pub fn as_static(mut self) -> Self {
        let value = self
            .initial
            .clone()
            .unwrap_or_else(|| Value::default_for(&self.ty));
        self.is_static = true;
        if !matches!(self.storage, FieldStorage::Native { .. }) {
            self.storage = FieldStorage::Static(Arc::new(Mutex::new(value)));
        }
        self
    }

    /// Reject writes
    pub fn readonly(mut self) -> Self {
        self.is_readonly = true;
        self
    }

    /// Initial value (also the current value of a static field)
    pub fn with_initial(mut self, value: Value) -> Self {
        if let FieldStorage::Static(slot) = &self.storage {
            *slot.lock() = value.clone();
        }
        self.initial = Some(value);
        self
    }

    fn enum_variant(name: &str, raw: i64, owner: Weak<TypeDef>) -> Self {
        let get: GetterFn = Arc::new(move |_| {
            let def = owner
                .upgrade()
                .ok_or_else(|| BindError::Host("enum definition dropped".to_string()))?;
            Ok(Value::Enum(EnumValue::new(Type::from_def(def), raw)))
        });
        let mut field = FieldInfo::native(name, Type::self_type(), get, None);
        field.is_static = true;
        field
    }

    /// Read the field from `receiver` (ignored for static fields)
    pub fn get(&self, receiver: &Value) -> BindResult<Value> {
        match &self.storage {
            FieldStorage::Static(slot) => Ok(slot.lock().clone()),
            FieldStorage::Native { get, .. } => get(receiver),
            FieldStorage::Slot => match receiver {
                Value::Object(obj) => Ok(obj
                    .field(&self.name)
                    .unwrap_or_else(|| self.fresh_value())),
                Value::Struct(s) => Ok(s
                    .fields
                    .get(&self.name)
                    .cloned()
                    .unwrap_or_else(|| self.fresh_value())),
                Value::Null => Err(BindError::NullReference(self.name.clone())),
                other => Err(BindError::Argument(format!(
                    "{} has no field '{}'",
                    other.type_of(),
                    self.name
                ))),
            },
        }
    }

    /// Write the field on `receiver`; struct receivers are mutated in place
    pub fn set(&self, receiver: &mut Value, value: Value) -> BindResult<()> {
        if self.is_readonly {
            return Err(BindError::unsupported(
                "set",
                format!("readonly field '{}'", self.name),
            ));
        }
        match &self.storage {
            FieldStorage::Static(slot) => {
                *slot.lock() = value;
                Ok(())
            }
            FieldStorage::Native { set: Some(set), .. } => set(receiver, value),
            FieldStorage::Native { set: None, .. } => Err(BindError::unsupported(
                "set",
                format!("field '{}' without setter", self.name),
            )),
            FieldStorage::Slot => match receiver {
                Value::Object(obj) => {
                    obj.set_field(&self.name, value);
                    Ok(())
                }
                Value::Struct(s) => {
                    s.fields.insert(self.name.clone(), value);
                    Ok(())
                }
                Value::Null => Err(BindError::NullReference(self.name.clone())),
                other => Err(BindError::Argument(format!(
                    "{} has no field '{}'",
                    other.type_of(),
                    self.name
                ))),
            },
        }
    }

    /// Whether the field lives in the receiver's slots
    pub fn is_slot(&self) -> bool {
        matches!(self.storage, FieldStorage::Slot)
    }

    fn fresh_value(&self) -> Value {
        self.initial
            .clone()
            .unwrap_or_else(|| Value::default_for(&self.ty))
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .field("is_readonly", &self.is_readonly)
            .finish()
    }
}

/// Property description
pub struct PropertyInfo {
    /// Property name
    pub name: String,
    /// Declared type
    pub ty: Type,
    /// Whether the property belongs to the type
    pub is_static: bool,
    getter: Option<GetterFn>,
    setter: Option<SetterFn>,
}

impl PropertyInfo {
    /// Property without accessors
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            is_static: false,
            getter: None,
            setter: None,
        }
    }

    /// Attach a getter
    pub fn getter(mut self, get: impl Fn(&Value) -> BindResult<Value> + Send + Sync + 'static) -> Self {
        self.getter = Some(Arc::new(get));
        self
    }

    /// Attach a setter
    pub fn setter(
        mut self,
        set: impl Fn(&mut Value, Value) -> BindResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(set));
        self
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Whether a getter exists
    pub fn can_read(&self) -> bool {
        self.getter.is_some()
    }

    /// Whether a setter exists
    pub fn can_write(&self) -> bool {
        self.setter.is_some()
    }

    /// Read through the getter
    pub fn get(&self, receiver: &Value) -> BindResult<Value> {
        match &self.getter {
            Some(get) => get(receiver),
            None => Err(BindError::unsupported(
                "get",
                format!("write-only property '{}'", self.name),
            )),
        }
    }

    /// Write through the setter
    pub fn set(&self, receiver: &mut Value, value: Value) -> BindResult<()> {
        match &self.setter {
            Some(set) => set(receiver, value),
            None => Err(BindError::unsupported(
                "set",
                format!("read-only property '{}'", self.name),
            )),
        }
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .field("can_read", &self.can_read())
            .field("can_write", &self.can_write())
            .finish()
    }
}

/// Parameter description
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: Type,
    /// Passing mode
    pub mode: ParamMode,
}

impl ParamInfo {
    /// By-value parameter
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            mode: ParamMode::In,
        }
    }

    /// By-reference parameter
    pub fn by_ref(mut self) -> Self {
        self.mode = ParamMode::Ref;
        self
    }

    /// Output parameter
    pub fn out(mut self) -> Self {
        self.mode = ParamMode::Out;
        self
    }
}

fn signature_of(params: &[ParamInfo], ret: Type) -> Signature {
    Signature {
        params: params
            .iter()
            .map(|p| ParamSig::with_mode(p.ty.clone(), p.mode))
            .collect(),
        ret,
    }
}

/// Method description
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Method-level generic parameters
    pub generic_params: Vec<Arc<str>>,
    /// Parameters in order
    pub params: Vec<ParamInfo>,
    /// Return type
    pub ret: Type,
    /// Whether the method belongs to the type
    pub is_static: bool,
    body: MethodFn,
}

impl MethodInfo {
    /// Method with a body and no parameters
    pub fn new(
        name: impl Into<String>,
        ret: Type,
        body: impl Fn(&mut Value, &[Type], &mut [Value]) -> BindResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            params: Vec::new(),
            ret,
            is_static: false,
            body: Arc::new(body),
        }
    }

    /// Append a parameter
    pub fn param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    /// Declare method-level generic parameters
    pub fn generic(mut self, names: &[&str]) -> Self {
        self.generic_params = names.iter().map(|n| Arc::from(*n)).collect();
        self
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Declared signature (unsubstituted)
    pub fn signature(&self) -> Signature {
        signature_of(&self.params, self.ret.clone())
    }

    /// Whether any parameter is by-reference or output
    pub fn has_by_ref(&self) -> bool {
        self.params.iter().any(|p| p.mode.is_by_ref())
    }

    /// Run the body
    pub fn invoke(
        &self,
        receiver: &mut Value,
        generic_args: &[Type],
        args: &mut [Value],
    ) -> BindResult<Value> {
        if args.len() != self.params.len() {
            return Err(BindError::Argument(format!(
                "'{}' expects {} argument(s), got {}",
                self.name,
                self.params.len(),
                args.len()
            )));
        }
        (self.body)(receiver, generic_args, args)
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("generic_params", &self.generic_params)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// Constructor description
pub struct ConstructorInfo {
    /// Parameters in order
    pub params: Vec<ParamInfo>,
    body: ConstructorFn,
}

impl ConstructorInfo {
    /// Constructor with a body and no parameters
    pub fn new(body: impl Fn(&Type, &mut [Value]) -> BindResult<Value> + Send + Sync + 'static) -> Self {
        Self {
            params: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Append a parameter
    pub fn param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    /// Declared signature, returning the placeholder for the declaring type
    pub fn signature(&self) -> Signature {
        signature_of(&self.params, Type::self_type())
    }

    /// Whether any parameter is by-reference or output
    pub fn has_by_ref(&self) -> bool {
        self.params.iter().any(|p| p.mode.is_by_ref())
    }

    /// Run the body for the concrete type `ty`
    pub fn invoke(&self, ty: &Type, args: &mut [Value]) -> BindResult<Value> {
        if args.len() != self.params.len() {
            return Err(BindError::Argument(format!(
                "constructor of {} expects {} argument(s), got {}",
                ty,
                self.params.len(),
                args.len()
            )));
        }
        (self.body)(ty, args)
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("params", &self.params)
            .finish()
    }
}

/// Event description
pub struct EventInfo {
    /// Event name
    pub name: String,
    /// Handler (function/delegate) type
    pub handler: Type,
    /// Whether the event belongs to the type
    pub is_static: bool,
    static_handlers: Arc<Mutex<Vec<Callable>>>,
}

impl EventInfo {
    /// Instance event
    pub fn new(name: impl Into<String>, handler: Type) -> Self {
        Self {
            name: name.into(),
            handler,
            is_static: false,
            static_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Add a handler
    pub fn subscribe(&self, receiver: &Value, handler: Callable) -> BindResult<()> {
        if self.is_static {
            self.static_handlers.lock().push(handler);
            return Ok(());
        }
        match receiver {
            Value::Object(obj) => {
                obj.add_handler(&self.name, handler);
                Ok(())
            }
            Value::Null => Err(BindError::NullReference(self.name.clone())),
            other => Err(BindError::Argument(format!(
                "{} cannot hold event '{}'",
                other.type_of(),
                self.name
            ))),
        }
    }

    /// Current handlers
    pub fn handlers(&self, receiver: &Value) -> Vec<Callable> {
        if self.is_static {
            return self.static_handlers.lock().clone();
        }
        match receiver {
            Value::Object(obj) => obj.handlers(&self.name),
            _ => Vec::new(),
        }
    }

    /// Call every handler in subscription order, returning the last result
    pub fn raise(&self, receiver: &Value, args: &[Value]) -> BindResult<Value> {
        let mut last = Value::Null;
        for handler in self.handlers(receiver) {
            let mut call_args = args.to_vec();
            last = handler.call(&mut call_args)?;
        }
        Ok(last)
    }
}

impl fmt::Debug for EventInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventInfo")
            .field("name", &self.name)
            .field("handler", &self.handler)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// Indexer description
pub struct IndexerInfo {
    /// Index parameter types
    pub keys: Vec<Type>,
    /// Element type
    pub item: Type,
    get: IndexGetFn,
    set: Option<IndexSetFn>,
}

impl IndexerInfo {
    /// Read-only indexer
    pub fn new(
        keys: Vec<Type>,
        item: Type,
        get: impl Fn(&Value, &[Value]) -> BindResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            keys,
            item,
            get: Arc::new(get),
            set: None,
        }
    }

    /// Attach a write body
    pub fn setter(
        mut self,
        set: impl Fn(&mut Value, &[Value], Value) -> BindResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.set = Some(Arc::new(set));
        self
    }

    /// Whether writes are possible
    pub fn can_write(&self) -> bool {
        self.set.is_some()
    }

    /// Read an element
    pub fn get(&self, receiver: &Value, keys: &[Value]) -> BindResult<Value> {
        (self.get)(receiver, keys)
    }

    /// Write an element
    pub fn set(&self, receiver: &mut Value, keys: &[Value], value: Value) -> BindResult<()> {
        match &self.set {
            Some(set) => set(receiver, keys, value),
            None => Err(BindError::unsupported("set", "read-only indexer")),
        }
    }
}

impl fmt::Debug for IndexerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexerInfo")
            .field("keys", &self.keys)
            .field("item", &self.item)
            .field("can_write", &self.can_write())
            .finish()
    }
}

/// Direction of a user conversion operator relative to its declaring type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionDirection {
    /// `other -> Self`
    From,
    /// `Self -> other`
    Into,
}

/// User-defined conversion operator
pub struct ConversionInfo {
    /// Direction relative to the declaring type
    pub direction: ConversionDirection,
    /// The type on the other side of the conversion
    pub other: Type,
    /// Whether the operator is explicit only
    pub is_explicit: bool,
    convert: ConvertFn,
}

impl ConversionInfo {
    /// Implicit conversion
    pub fn implicit(
        direction: ConversionDirection,
        other: Type,
        convert: impl Fn(Value) -> BindResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            direction,
            other,
            is_explicit: false,
            convert: Arc::new(convert),
        }
    }

    /// Explicit conversion
    pub fn explicit(
        direction: ConversionDirection,
        other: Type,
        convert: impl Fn(Value) -> BindResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            is_explicit: true,
            ..Self::implicit(direction, other, convert)
        }
    }

    /// Run the operator
    pub fn convert(&self, value: Value) -> BindResult<Value> {
        (self.convert)(value)
    }
}

impl fmt::Debug for ConversionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionInfo")
            .field("direction", &self.direction)
            .field("other", &self.other)
            .field("is_explicit", &self.is_explicit)
            .finish()
    }
}

// ============================================================================
// Type definition
// ============================================================================

/// Introspectable description of a host or graph type
pub struct TypeDef {
    id: TypeDefId,
    name: String,
    kind: TypeDefKind,
    origin: TypeOrigin,
    base: Option<Type>,
    interfaces: Vec<Type>,
    generic_params: Vec<Arc<str>>,
    fields: Vec<Arc<FieldInfo>>,
    field_indices: FxHashMap<String, usize>,
    properties: Vec<Arc<PropertyInfo>>,
    property_indices: FxHashMap<String, usize>,
    methods: Vec<Arc<MethodInfo>>,
    method_indices: FxHashMap<String, Vec<usize>>,
    constructors: Vec<Arc<ConstructorInfo>>,
    events: Vec<Arc<EventInfo>>,
    event_indices: FxHashMap<String, usize>,
    indexer: Option<Arc<IndexerInfo>>,
    conversions: Vec<Arc<ConversionInfo>>,
    variants: Vec<(String, i64)>,
    signature: Option<Arc<Signature>>,
}

impl TypeDef {
    /// Start a reference type
    pub fn class(name: &str) -> TypeDefBuilder {
        TypeDefBuilder::new(name, TypeDefKind::Class)
    }

    /// Start a value type
    pub fn structure(name: &str) -> TypeDefBuilder {
        TypeDefBuilder::new(name, TypeDefKind::Struct)
    }

    /// Start an interface
    pub fn interface(name: &str) -> TypeDefBuilder {
        TypeDefBuilder::new(name, TypeDefKind::Interface)
    }

    /// Start an enumeration
    pub fn enumeration(name: &str) -> TypeDefBuilder {
        TypeDefBuilder::new(name, TypeDefKind::Enum)
    }

    /// Start a named function shape
    pub fn delegate(name: &str, signature: Signature) -> TypeDefBuilder {
        let mut builder = TypeDefBuilder::new(name, TypeDefKind::Delegate);
        builder.signature = Some(Arc::new(signature));
        builder
    }

    /// Definition identity
    pub fn id(&self) -> TypeDefId {
        self.id
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Definition shape
    pub fn kind(&self) -> TypeDefKind {
        self.kind
    }

    /// Origin of the definition
    pub fn origin(&self) -> &TypeOrigin {
        &self.origin
    }

    /// Defining asset of a graph type
    pub fn asset(&self) -> Option<&AssetRef> {
        match &self.origin {
            TypeOrigin::Graph(asset) => Some(asset),
            TypeOrigin::Host => None,
        }
    }

    /// Whether a loaded asset defines this type
    pub fn is_graph(&self) -> bool {
        matches!(self.origin, TypeOrigin::Graph(_))
    }

    /// Copied on read
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeDefKind::Struct | TypeDefKind::Enum)
    }

    /// Base type
    pub fn base(&self) -> Option<&Type> {
        self.base.as_ref()
    }

    /// Directly implemented interfaces
    pub fn interfaces(&self) -> &[Type] {
        &self.interfaces
    }

    /// Type-level generic parameter names
    pub fn generic_params(&self) -> &[Arc<str>] {
        &self.generic_params
    }

    /// Declared field by name
    pub fn field(&self, name: &str) -> Option<&Arc<FieldInfo>> {
        self.field_indices.get(name).map(|&i| &self.fields[i])
    }

    /// Declared fields in order
    pub fn fields(&self) -> &[Arc<FieldInfo>] {
        &self.fields
    }

    /// Declared property by name
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyInfo>> {
        self.property_indices.get(name).map(|&i| &self.properties[i])
    }

    /// Declared properties in order
    pub fn properties(&self) -> &[Arc<PropertyInfo>] {
        &self.properties
    }

    /// Declared overloads of a method
    pub fn methods_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Arc<MethodInfo>> + 'a {
        self.method_indices
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.methods[i])
    }

    /// Declared methods in order
    pub fn methods(&self) -> &[Arc<MethodInfo>] {
        &self.methods
    }

    /// Declared constructors
    pub fn constructors(&self) -> &[Arc<ConstructorInfo>] {
        &self.constructors
    }

    /// Declared event by name
    pub fn event(&self, name: &str) -> Option<&Arc<EventInfo>> {
        self.event_indices.get(name).map(|&i| &self.events[i])
    }

    /// Declared events in order
    pub fn events(&self) -> &[Arc<EventInfo>] {
        &self.events
    }

    /// Indexer, if declared
    pub fn indexer(&self) -> Option<&Arc<IndexerInfo>> {
        self.indexer.as_ref()
    }

    /// User conversion operators
    pub fn conversions(&self) -> &[Arc<ConversionInfo>] {
        &self.conversions
    }

    /// Enumeration variants
    pub fn variants(&self) -> &[(String, i64)] {
        &self.variants
    }

    /// Name of the variant with raw value `raw`
    pub fn variant_name(&self, raw: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == raw)
            .map(|(n, _)| n.as_str())
    }

    /// Signature of a delegate definition
    pub fn delegate_signature(&self) -> Option<&Arc<Signature>> {
        self.signature.as_ref()
    }

    /// Bind the declaring type's generic parameters and the `Self`
    /// placeholder in a member type against the concrete `owner`.
    pub fn bind_member_type(owner: &Type, ty: &Type) -> Type {
        let Some(def) = owner.def() else {
            return ty.clone();
        };
        let mut params: Vec<Arc<str>> = def.generic_params().to_vec();
        let mut args: Vec<Type> = owner.generic_arguments().to_vec();
        params.truncate(args.len());
        params.push(Arc::from(SELF_TYPE_NAME));
        args.push(owner.clone());
        ty.substitute(&params, &args)
    }
}

impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDef {}

impl Hash for TypeDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Builder for [`TypeDef`]
pub struct TypeDefBuilder {
    name: String,
    kind: TypeDefKind,
    origin: TypeOrigin,
    base: Option<Type>,
    interfaces: Vec<Type>,
    generic_params: Vec<Arc<str>>,
    fields: Vec<FieldInfo>,
    properties: Vec<PropertyInfo>,
    methods: Vec<MethodInfo>,
    constructors: Vec<ConstructorInfo>,
    events: Vec<EventInfo>,
    indexer: Option<IndexerInfo>,
    conversions: Vec<ConversionInfo>,
    variants: Vec<(String, i64)>,
    signature: Option<Arc<Signature>>,
}

impl TypeDefBuilder {
    fn new(name: &str, kind: TypeDefKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            origin: TypeOrigin::Host,
            base: None,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            events: Vec::new(),
            indexer: None,
            conversions: Vec::new(),
            variants: Vec::new(),
            signature: None,
        }
    }

    /// Mark as defined by a graph asset
    pub fn graph_asset(mut self, id: &str, name: &str) -> Self {
        self.origin = TypeOrigin::Graph(AssetRef::new(id, name));
        self
    }

    /// Set the base type
    pub fn base(mut self, base: Type) -> Self {
        self.base = Some(base);
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: Type) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Declare type-level generic parameters
    pub fn generic_params(mut self, names: &[&str]) -> Self {
        self.generic_params = names.iter().map(|n| Arc::from(*n)).collect();
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a property
    pub fn property(mut self, property: PropertyInfo) -> Self {
        self.properties.push(property);
        self
    }

    /// Add a method (overloads share a name)
    pub fn method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a constructor
    pub fn constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Add an event
    pub fn event(mut self, event: EventInfo) -> Self {
        self.events.push(event);
        self
    }

    /// Set the indexer
    pub fn indexer(mut self, indexer: IndexerInfo) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Add a user conversion operator
    pub fn conversion(mut self, conversion: ConversionInfo) -> Self {
        self.conversions.push(conversion);
        self
    }

    /// Add an enumeration variant (exposed as a static readonly field)
    pub fn variant(mut self, name: &str, raw: i64) -> Self {
        self.variants.push((name.to_string(), raw));
        self
    }

    /// Finish the definition
    pub fn build(self) -> Arc<TypeDef> {
        let TypeDefBuilder {
            name,
            kind,
            origin,
            base,
            interfaces,
            generic_params,
            fields,
            properties,
            methods,
            constructors,
            events,
            indexer,
            conversions,
            variants,
            signature,
        } = self;

        Arc::new_cyclic(|weak: &Weak<TypeDef>| {
            let mut all_fields = fields;
            for (variant, raw) in &variants {
                all_fields.push(FieldInfo::enum_variant(variant, *raw, weak.clone()));
            }

            let field_indices = all_fields
                .iter()
                .enumerate()
                .map(|(i, f)| (f.name.clone(), i))
                .collect();
            let property_indices = properties
                .iter()
                .enumerate()
                .map(|(i, p)| (p.name.clone(), i))
                .collect();
            let mut method_indices: FxHashMap<String, Vec<usize>> = FxHashMap::default();
            for (i, m) in methods.iter().enumerate() {
                method_indices.entry(m.name.clone()).or_default().push(i);
            }
            let event_indices = events
                .iter()
                .enumerate()
                .map(|(i, e)| (e.name.clone(), i))
                .collect();

            TypeDef {
                id: TypeDefId::next(),
                name,
                kind,
                origin,
                base,
                interfaces,
                generic_params,
                fields: all_fields.into_iter().map(Arc::new).collect(),
                field_indices,
                properties: properties.into_iter().map(Arc::new).collect(),
                property_indices,
                methods: methods.into_iter().map(Arc::new).collect(),
                method_indices,
                constructors: constructors.into_iter().map(Arc::new).collect(),
                events: events.into_iter().map(Arc::new).collect(),
                event_indices,
                indexer: indexer.map(Arc::new),
                conversions: conversions.into_iter().map(Arc::new).collect(),
                variants,
                signature,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_indexes_members() {
        let def = TypeDef::class("Counter")
            .field(FieldInfo::new("count", Type::I32))
            .property(PropertyInfo::new("Label", Type::STRING).getter(|_| Ok(Value::from("c"))))
            .method(MethodInfo::new("Reset", Type::VOID, |_, _, _| Ok(Value::Null)))
            .method(
                MethodInfo::new("Reset", Type::VOID, |_, _, _| Ok(Value::Null))
                    .param(ParamInfo::new("to", Type::I32)),
            )
            .build();

        assert!(def.field("count").is_some());
        assert!(def.field("missing").is_none());
        assert!(def.property("Label").unwrap().can_read());
        assert_eq!(def.methods_named("Reset").count(), 2);
        assert_eq!(def.methods_named("Nope").count(), 0);
    }

    #[test]
    fn test_static_field_owns_storage() {
        let def = TypeDef::class("Config")
            .field(FieldInfo::new("limit", Type::I32).as_static().with_initial(Value::I32(3)))
            .build();
        let field = def.field("limit").unwrap();

        assert_eq!(field.get(&Value::Null).unwrap(), Value::I32(3));
        field.set(&mut Value::Null, Value::I32(9)).unwrap();
        assert_eq!(field.get(&Value::Null).unwrap(), Value::I32(9));
    }

    #[test]
    fn test_readonly_field_rejects_writes() {
        let field = FieldInfo::new("id", Type::I32).readonly();
        let mut receiver = Value::Null;
        let err = field.set(&mut receiver, Value::I32(1)).unwrap_err();
        assert!(matches!(err, BindError::Unsupported { .. }));
    }

    #[test]
    fn test_enum_variants_are_static_fields() {
        let def = TypeDef::enumeration("Color").variant("Red", 0).variant("Blue", 2).build();
        let blue = def.field("Blue").unwrap().get(&Value::Null).unwrap();

        match blue {
            Value::Enum(e) => {
                assert_eq!(e.raw, 2);
                assert_eq!(e.ty, Type::from_def(def.clone()));
            }
            other => panic!("expected enum, got {:?}", other),
        }
        assert_eq!(def.variant_name(2), Some("Blue"));
    }

    #[test]
    fn test_bind_member_type_substitutes_self_and_params() {
        let list = TypeDef::class("List").generic_params(&["T"]).build();
        let owner = Type::generic_of(list, vec![Type::STRING]);

        assert_eq!(TypeDef::bind_member_type(&owner, &Type::param("T")), Type::STRING);
        assert_eq!(TypeDef::bind_member_type(&owner, &Type::self_type()), owner);
    }
}
