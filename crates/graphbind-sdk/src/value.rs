//! Dynamic values
//!
//! Structs and enums are value types and are copied on every read. Objects,
//! arrays and functions are shared handles: cloning a `Value` holding one of
//! them clones the handle, not the data.
//!
//! Object and array cells are guarded by `parking_lot` mutexes so a value can
//! sit in a static slot of a [`TypeDef`](crate::typedef::TypeDef). Locks are
//! held only for the duration of a single slot read or write, never across a
//! call into host code.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{BindError, BindResult};
use crate::typedef::{TypeDef, TypeDefKind};
use crate::types::{Primitive, Signature, Type};

/// Value of an enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    /// Enumeration type
    pub ty: Type,
    /// Underlying integer
    pub raw: i64,
}

impl EnumValue {
    /// Create an enum value
    pub fn new(ty: Type, raw: i64) -> Self {
        Self { ty, raw }
    }
}

/// Value-type instance
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    /// Struct type
    pub ty: Type,
    /// Field slots
    pub fields: FxHashMap<String, Value>,
}

impl StructValue {
    /// Create a struct with explicit slots
    pub fn new(ty: Type, fields: FxHashMap<String, Value>) -> Self {
        Self { ty, fields }
    }
}

/// Reference-type instance data
#[derive(Debug)]
pub struct ObjectData {
    /// Runtime type
    pub ty: Type,
    /// Field slots
    pub fields: FxHashMap<String, Value>,
    handlers: FxHashMap<String, Vec<Callable>>,
}

/// Shared handle to a reference-type instance
#[derive(Clone)]
pub struct ObjectRef(Arc<Mutex<ObjectData>>);

impl ObjectRef {
    /// Allocate an object
    pub fn new(ty: Type, fields: FxHashMap<String, Value>) -> Self {
        ObjectRef(Arc::new(Mutex::new(ObjectData {
            ty,
            fields,
            handlers: FxHashMap::default(),
        })))
    }

    /// Runtime type
    pub fn ty(&self) -> Type {
        self.0.lock().ty.clone()
    }

    /// Read a slot
    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.lock().fields.get(name).cloned()
    }

    /// Write a slot
    pub fn set_field(&self, name: &str, value: Value) {
        self.0.lock().fields.insert(name.to_string(), value);
    }

    /// Subscribe a handler to a named event
    pub fn add_handler(&self, event: &str, handler: Callable) {
        self.0
            .lock()
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    /// Handlers subscribed to a named event
    pub fn handlers(&self, event: &str) -> Vec<Callable> {
        self.0
            .lock()
            .handlers
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} @ {:p})", self.ty(), Arc::as_ptr(&self.0))
    }
}

/// Array data
#[derive(Debug)]
pub struct ArrayData {
    /// Element type
    pub element: Type,
    /// Elements
    pub items: Vec<Value>,
}

/// Shared handle to an array
#[derive(Clone)]
pub struct ArrayRef(Arc<Mutex<ArrayData>>);

impl ArrayRef {
    /// Allocate an array
    pub fn new(element: Type, items: Vec<Value>) -> Self {
        ArrayRef(Arc::new(Mutex::new(ArrayData { element, items })))
    }

    /// Element type
    pub fn element(&self) -> Type {
        self.0.lock().element.clone()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.0.lock().items.len()
    }

    /// Whether the array has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an element
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.lock().items.get(index).cloned()
    }

    /// Write an element; false when out of range
    pub fn set(&self, index: usize, value: Value) -> bool {
        let mut data = self.0.lock();
        match data.items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Append an element
    pub fn push(&self, value: Value) {
        self.0.lock().items.push(value);
    }

    /// Snapshot of the elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.lock().items.clone()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.lock();
        write!(f, "ArrayRef({}[{}])", data.element, data.items.len())
    }
}

/// Function body shared by [`Callable`] handles
pub type CallableFn = Arc<dyn Fn(&mut [Value]) -> BindResult<Value> + Send + Sync>;

/// Function value with a known shape
#[derive(Clone)]
pub struct Callable {
    sig: Arc<Signature>,
    body: CallableFn,
}

impl Callable {
    /// Wrap a closure
    pub fn new(
        sig: Signature,
        body: impl Fn(&mut [Value]) -> BindResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            sig: Arc::new(sig),
            body: Arc::new(body),
        }
    }

    /// Wrap an existing shared body
    pub fn from_parts(sig: Arc<Signature>, body: CallableFn) -> Self {
        Self { sig, body }
    }

    /// Declared shape
    pub fn signature(&self) -> &Arc<Signature> {
        &self.sig
    }

    /// Call with exactly `signature().params.len()` arguments
    pub fn call(&self, args: &mut [Value]) -> BindResult<Value> {
        if args.len() != self.sig.params.len() {
            return Err(BindError::Argument(format!(
                "function {} called with {} argument(s)",
                self.sig,
                args.len()
            )));
        }
        (self.body)(args)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.sig)
    }
}

/// Dynamic value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent reference
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Unicode scalar
    Char(char),
    /// Signed byte
    I8(i8),
    /// Unsigned byte
    U8(u8),
    /// 16-bit signed
    I16(i16),
    /// 16-bit unsigned
    U16(u16),
    /// 32-bit signed
    I32(i32),
    /// 32-bit unsigned
    U32(u32),
    /// 64-bit signed
    I64(i64),
    /// 64-bit unsigned
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Pointer-width signed
    ISize(isize),
    /// Pointer-width unsigned
    USize(usize),
    /// String
    Str(Arc<str>),
    /// Enumeration value
    Enum(EnumValue),
    /// Value-type instance
    Struct(Box<StructValue>),
    /// Reference-type instance
    Object(ObjectRef),
    /// Array
    Array(ArrayRef),
    /// A type used as a value
    Type(Type),
    /// Function
    Function(Callable),
}

enum Num {
    Int(i128),
    Float(f64),
}

impl Value {
    /// Runtime type of the value (`object` for null)
    pub fn type_of(&self) -> Type {
        match self {
            Value::Null => Type::OBJECT,
            Value::Bool(_) => Primitive::Bool.into(),
            Value::Char(_) => Primitive::Char.into(),
            Value::I8(_) => Primitive::I8.into(),
            Value::U8(_) => Primitive::U8.into(),
            Value::I16(_) => Primitive::I16.into(),
            Value::U16(_) => Primitive::U16.into(),
            Value::I32(_) => Primitive::I32.into(),
            Value::U32(_) => Primitive::U32.into(),
            Value::I64(_) => Primitive::I64.into(),
            Value::U64(_) => Primitive::U64.into(),
            Value::F32(_) => Primitive::F32.into(),
            Value::F64(_) => Primitive::F64.into(),
            Value::ISize(_) => Primitive::ISize.into(),
            Value::USize(_) => Primitive::USize.into(),
            Value::Str(_) => Type::STRING,
            Value::Enum(e) => e.ty.clone(),
            Value::Struct(s) => s.ty.clone(),
            Value::Object(obj) => obj.ty(),
            Value::Array(arr) => Type::array_of(arr.element()),
            Value::Type(_) => Type::TYPE,
            Value::Function(f) => Type::Function(f.signature().clone()),
        }
    }

    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Zero value of a type: numeric zero, `false`, a default struct, the
    /// first enum variant, or null for references
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Primitive(p) => match p {
                Primitive::Bool => Value::Bool(false),
                Primitive::Char => Value::Char('\0'),
                Primitive::I8 => Value::I8(0),
                Primitive::U8 => Value::U8(0),
                Primitive::I16 => Value::I16(0),
                Primitive::U16 => Value::U16(0),
                Primitive::I32 => Value::I32(0),
                Primitive::U32 => Value::U32(0),
                Primitive::I64 => Value::I64(0),
                Primitive::U64 => Value::U64(0),
                Primitive::F32 => Value::F32(0.0),
                Primitive::F64 => Value::F64(0.0),
                Primitive::ISize => Value::ISize(0),
                Primitive::USize => Value::USize(0),
                Primitive::String | Primitive::Object | Primitive::Void | Primitive::Type => {
                    Value::Null
                }
            },
            _ => match ty.def() {
                Some(def) if def.kind() == TypeDefKind::Struct => {
                    Value::Struct(Box::new(StructValue::new(ty.clone(), default_slots(def, ty))))
                }
                Some(def) if def.kind() == TypeDefKind::Enum => {
                    let raw = def.variants().first().map(|(_, v)| *v).unwrap_or(0);
                    Value::Enum(EnumValue::new(ty.clone(), raw))
                }
                _ => Value::Null,
            },
        }
    }

    /// Default-construct an instance without running a constructor body
    pub fn instantiate(ty: &Type) -> BindResult<Value> {
        if let Some(element) = ty.element_type() {
            return Ok(Value::Array(ArrayRef::new(element.clone(), Vec::new())));
        }
        let Some(def) = ty.def() else {
            return Ok(Value::default_for(ty));
        };
        match def.kind() {
            TypeDefKind::Class => Ok(Value::Object(ObjectRef::new(
                ty.clone(),
                default_slots(def, ty),
            ))),
            TypeDefKind::Struct | TypeDefKind::Enum => Ok(Value::default_for(ty)),
            TypeDefKind::Interface | TypeDefKind::Delegate => Err(BindError::unsupported(
                "instantiate",
                format!("abstract type {}", ty),
            )),
        }
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload of any integral variant (including chars and enums)
    pub fn as_i64(&self) -> Option<i64> {
        if let Value::Enum(e) = self {
            return Some(e.raw);
        }
        match self.num()? {
            Num::Int(i) => i64::try_from(i).ok(),
            Num::Float(_) => None,
        }
    }

    /// Numeric payload as a double
    pub fn as_f64(&self) -> Option<f64> {
        match self.num()? {
            Num::Int(i) => Some(i as f64),
            Num::Float(f) => Some(f),
        }
    }

    /// Non-negative integer payload, for indices
    pub fn as_index(&self) -> Option<usize> {
        self.as_i64().and_then(|i| usize::try_from(i).ok())
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    /// Type payload
    pub fn as_type(&self) -> Option<&Type> {
        match self {
            Value::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Object payload
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Array payload
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Function payload
    pub fn as_function(&self) -> Option<&Callable> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    fn num(&self) -> Option<Num> {
        Some(match self {
            Value::Char(c) => Num::Int(*c as i128),
            Value::I8(v) => Num::Int(*v as i128),
            Value::U8(v) => Num::Int(*v as i128),
            Value::I16(v) => Num::Int(*v as i128),
            Value::U16(v) => Num::Int(*v as i128),
            Value::I32(v) => Num::Int(*v as i128),
            Value::U32(v) => Num::Int(*v as i128),
            Value::I64(v) => Num::Int(*v as i128),
            Value::U64(v) => Num::Int(*v as i128),
            Value::ISize(v) => Num::Int(*v as i128),
            Value::USize(v) => Num::Int(*v as i128),
            Value::F32(v) => Num::Float(*v as f64),
            Value::F64(v) => Num::Float(*v),
            _ => return None,
        })
    }

    /// Convert a numeric (or char) value to another numeric primitive.
    ///
    /// Integral targets truncate floats. Returns `None` when the value does
    /// not fit the target.
    pub fn convert_numeric(&self, to: Primitive) -> Option<Value> {
        let num = self.num()?;
        let int = match num {
            Num::Int(i) => Some(i),
            Num::Float(f) if f.is_finite() => Some(f.trunc() as i128),
            Num::Float(_) => None,
        };
        let float = match num {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        };
        Some(match to {
            Primitive::Char => Value::Char(u32::try_from(int?).ok().and_then(char::from_u32)?),
            Primitive::I8 => Value::I8(i8::try_from(int?).ok()?),
            Primitive::U8 => Value::U8(u8::try_from(int?).ok()?),
            Primitive::I16 => Value::I16(i16::try_from(int?).ok()?),
            Primitive::U16 => Value::U16(u16::try_from(int?).ok()?),
            Primitive::I32 => Value::I32(i32::try_from(int?).ok()?),
            Primitive::U32 => Value::U32(u32::try_from(int?).ok()?),
            Primitive::I64 => Value::I64(i64::try_from(int?).ok()?),
            Primitive::U64 => Value::U64(u64::try_from(int?).ok()?),
            Primitive::ISize => Value::ISize(isize::try_from(int?).ok()?),
            Primitive::USize => Value::USize(usize::try_from(int?).ok()?),
            Primitive::F32 => Value::F32(float as f32),
            Primitive::F64 => Value::F64(float),
            _ => return None,
        })
    }
}

fn default_slots(def: &TypeDef, ty: &Type) -> FxHashMap<String, Value> {
    def.fields()
        .iter()
        .filter(|f| !f.is_static && f.is_slot())
        .map(|f| {
            let value = f
                .initial
                .clone()
                .unwrap_or_else(|| Value::default_for(&TypeDef::bind_member_type(ty, &f.ty)));
            (f.name.clone(), value)
        })
        .collect()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::ISize(a), Value::ISize(b)) => a == b,
            (Value::USize(a), Value::USize(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "'{}'", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::ISize(v) => write!(f, "{}", v),
            Value::USize(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Enum(e) => match e.ty.def().and_then(|d| d.variant_name(e.raw)) {
                Some(name) => write!(f, "{}.{}", e.ty, name),
                None => write!(f, "{}({})", e.ty, e.raw),
            },
            Value::Struct(s) => write!(f, "{} {{ .. }}", s.ty),
            Value::Object(o) => write!(f, "{} {{ .. }}", o.ty()),
            Value::Array(a) => write!(f, "{}[{}]", a.element(), a.len()),
            Value::Type(t) => write!(f, "{}", t),
            Value::Function(c) => write!(f, "{}", c.signature()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<Type> for Value {
    fn from(v: Type) -> Self {
        Value::Type(v)
    }
}

impl From<Callable> for Value {
    fn from(v: Callable) -> Self {
        Value::Function(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typedef::FieldInfo;

    #[test]
    fn test_numeric_conversion_widens() {
        assert_eq!(Value::I32(7).convert_numeric(Primitive::I64), Some(Value::I64(7)));
        assert_eq!(Value::U8(3).convert_numeric(Primitive::F64), Some(Value::F64(3.0)));
        assert_eq!(Value::Char('A').convert_numeric(Primitive::I32), Some(Value::I32(65)));
        assert_eq!(Value::Bool(true).convert_numeric(Primitive::I32), None);
        assert_eq!(Value::I32(-5).convert_numeric(Primitive::U64), None);
        assert_eq!(Value::I64(300).convert_numeric(Primitive::U8), None);
        assert_eq!(Value::I8(-1).convert_numeric(Primitive::I64), Some(Value::I64(-1)));
    }

    #[test]
    fn test_struct_default_fills_slots() {
        let def = TypeDef::structure("Vector2")
            .field(FieldInfo::new("x", Type::F32))
            .field(FieldInfo::new("y", Type::F32))
            .build();
        let ty = Type::from_def(def);

        match Value::default_for(&ty) {
            Value::Struct(s) => {
                assert_eq!(s.fields.get("x"), Some(&Value::F32(0.0)));
                assert_eq!(s.fields.len(), 2);
            }
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let def = TypeDef::class("Node").build();
        let ty = Type::from_def(def);
        let a = Value::instantiate(&ty).unwrap();
        let b = Value::instantiate(&ty).unwrap();

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_struct_copies_are_independent() {
        let def = TypeDef::structure("Point")
            .field(FieldInfo::new("x", Type::I32))
            .build();
        let saved = Value::default_for(&Type::from_def(def.clone()));
        let mut copy = saved.clone();
        def.field("x").unwrap().set(&mut copy, Value::I32(5)).unwrap();

        assert_eq!(def.field("x").unwrap().get(&saved).unwrap(), Value::I32(0));
        assert_eq!(def.field("x").unwrap().get(&copy).unwrap(), Value::I32(5));
    }

    #[test]
    fn test_callable_checks_arity() {
        let f = Callable::new(Signature::new(vec![Type::I32], Type::I32), |args| {
            Ok(args[0].clone())
        });
        assert!(f.call(&mut []).is_err());
        assert_eq!(f.call(&mut [Value::I32(4)]).unwrap(), Value::I32(4));
    }
}
