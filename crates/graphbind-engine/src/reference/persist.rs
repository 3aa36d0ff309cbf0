//! Persisted form of descriptors
//!
//! Saving happens in two stages: [`MemberRef::to_persisted`] lowers the
//! descriptor to plain serde data (dropping the cached resolution), and
//! [`MemberRef::to_json`] writes that data out. Loading reverses both and
//! leaves the descriptor unresolved.
//!
//! Inline values are stored as [`ValueBlob`]s. Reference-typed values
//! (objects and functions) have no persisted form.

use std::collections::BTreeMap;

use graphbind_sdk::{
    AssetRef, ArrayRef, BindError, BindResult, EnumValue, NodeId, StructValue, Value,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{Instance, MemberRef, SegmentItem, TargetKind};
use crate::engine::Engine;
use crate::token::{decode, DecodeScope, TypeToken};

/// Serializable literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ValueBlob {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// Character
    Char(char),
    /// 8-bit signed
    I8(i8),
    /// 8-bit unsigned
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
    /// Pointer-sized signed
    ISize(i64),
    /// Pointer-sized unsigned
    USize(u64),
    /// String
    Str(String),
    /// Enumeration value
    Enum {
        /// Enumeration type
        ty: TypeToken,
        /// Underlying integer
        raw: i64,
    },
    /// Value-type instance
    Struct {
        /// Struct type
        ty: TypeToken,
        /// Field slots, ordered for stable output
        fields: BTreeMap<String, ValueBlob>,
    },
    /// Array snapshot
    Array {
        /// Element type
        element: TypeToken,
        /// Elements
        items: Vec<ValueBlob>,
    },
    /// Type value
    Type(TypeToken),
}

impl ValueBlob {
    /// Lower `value`, appending graph-type assets to `refs`
    pub fn encode(value: &Value, refs: &mut Vec<AssetRef>) -> BindResult<Self> {
        Ok(match value {
            Value::Null => ValueBlob::Null,
            Value::Bool(v) => ValueBlob::Bool(*v),
            Value::Char(v) => ValueBlob::Char(*v),
            Value::I8(v) => ValueBlob::I8(*v),
            Value::U8(v) => ValueBlob::U8(*v),
            Value::I16(v) => ValueBlob::I16(*v),
            Value::U16(v) => ValueBlob::U16(*v),
            Value::I32(v) => ValueBlob::I32(*v),
            Value::U32(v) => ValueBlob::U32(*v),
            Value::I64(v) => ValueBlob::I64(*v),
            Value::U64(v) => ValueBlob::U64(*v),
            Value::F32(v) => ValueBlob::F32(*v),
            Value::F64(v) => ValueBlob::F64(*v),
            Value::ISize(v) => ValueBlob::ISize(*v as i64),
            Value::USize(v) => ValueBlob::USize(*v as u64),
            Value::Str(s) => ValueBlob::Str(s.to_string()),
            Value::Enum(e) => ValueBlob::Enum {
                ty: TypeToken::encode(&e.ty, refs),
                raw: e.raw,
            },
            Value::Struct(s) => {
                let ty = TypeToken::encode(&s.ty, refs);
                let mut fields = BTreeMap::new();
                for (name, field) in &s.fields {
                    fields.insert(name.clone(), Self::encode(field, refs)?);
                }
                ValueBlob::Struct { ty, fields }
            }
            Value::Array(a) => {
                let element = TypeToken::encode(&a.element(), refs);
                let items = a
                    .to_vec()
                    .iter()
                    .map(|item| Self::encode(item, refs))
                    .collect::<BindResult<Vec<_>>>()?;
                ValueBlob::Array { element, items }
            }
            Value::Type(t) => ValueBlob::Type(TypeToken::encode(t, refs)),
            Value::Object(o) => {
                return Err(BindError::Serialization(format!(
                    "object of type {} has no persisted form",
                    o.ty()
                )))
            }
            Value::Function(c) => {
                return Err(BindError::Serialization(format!(
                    "function {} has no persisted form",
                    c.signature()
                )))
            }
        })
    }

    /// Rebuild the value; types that no longer exist decode as missing
    pub fn decode(&self, scope: &DecodeScope<'_>) -> BindResult<Value> {
        Ok(match self {
            ValueBlob::Null => Value::Null,
            ValueBlob::Bool(v) => Value::Bool(*v),
            ValueBlob::Char(v) => Value::Char(*v),
            ValueBlob::I8(v) => Value::I8(*v),
            ValueBlob::U8(v) => Value::U8(*v),
            ValueBlob::I16(v) => Value::I16(*v),
            ValueBlob::U16(v) => Value::U16(*v),
            ValueBlob::I32(v) => Value::I32(*v),
            ValueBlob::U32(v) => Value::U32(*v),
            ValueBlob::I64(v) => Value::I64(*v),
            ValueBlob::U64(v) => Value::U64(*v),
            ValueBlob::F32(v) => Value::F32(*v),
            ValueBlob::F64(v) => Value::F64(*v),
            ValueBlob::ISize(v) => Value::ISize(
                isize::try_from(*v).map_err(|e| BindError::Serialization(e.to_string()))?,
            ),
            ValueBlob::USize(v) => Value::USize(
                usize::try_from(*v).map_err(|e| BindError::Serialization(e.to_string()))?,
            ),
            ValueBlob::Str(s) => Value::from(s.as_str()),
            ValueBlob::Enum { ty, raw } => Value::Enum(EnumValue::new(decode(ty, scope), *raw)),
            ValueBlob::Struct { ty, fields } => {
                let mut slots = FxHashMap::default();
                for (name, field) in fields {
                    slots.insert(name.clone(), field.decode(scope)?);
                }
                Value::Struct(Box::new(StructValue::new(decode(ty, scope), slots)))
            }
            ValueBlob::Array { element, items } => {
                let items = items
                    .iter()
                    .map(|item| item.decode(scope))
                    .collect::<BindResult<Vec<_>>>()?;
                Value::Array(ArrayRef::new(decode(element, scope), items))
            }
            ValueBlob::Type(t) => Value::Type(decode(t, scope)),
        })
    }
}

/// Persisted [`Instance`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum PersistedInstance {
    /// Nothing
    #[default]
    None,
    /// Literal value
    Value(ValueBlob),
    /// Nested descriptor
    Ref(Box<PersistedRef>),
    /// Node of the owning graph
    Node(NodeId),
}

/// Persisted [`MemberRef`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedRef {
    /// Target kind
    pub kind: TargetKind,
    /// Dotted path
    #[serde(default)]
    pub path: String,
    /// Start segment is a type
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
    /// Per-segment type arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Option<SegmentItem>>,
    /// Encoded start type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_type: Option<TypeToken>,
    /// Encoded target type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<TypeToken>,
    /// What the start segment is applied to
    #[serde(default)]
    pub instance: PersistedInstance,
    /// Assets referenced by `@n` tokens
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_refs: Vec<AssetRef>,
}

impl MemberRef {
    /// Lower to persisted data. Object and function inline values fail
    /// with [`BindError::Serialization`].
    pub fn to_persisted(&self) -> BindResult<PersistedRef> {
        let mut external_refs = self.external_refs.clone();
        let instance = match &self.instance {
            Instance::None => PersistedInstance::None,
            Instance::Value(v) => PersistedInstance::Value(ValueBlob::encode(v, &mut external_refs)?),
            Instance::Ref(inner) => PersistedInstance::Ref(Box::new(inner.to_persisted()?)),
            Instance::Node(id) => PersistedInstance::Node(*id),
        };
        let mut items = self.items.clone();
        items.resize(self.path.len(), None);
        // Trailing empty items carry nothing
        while items.last().is_some_and(|i| i.is_none()) {
            items.pop();
        }
        Ok(PersistedRef {
            kind: self.kind,
            path: self.dotted_path(),
            is_static: self.is_static,
            items,
            start_type: self.start_type.clone(),
            target_type: self.target_type.clone(),
            instance,
            external_refs,
        })
    }

    /// Rebuild from persisted data; the result is unresolved
    pub fn from_persisted(persisted: &PersistedRef, engine: &Engine) -> BindResult<Self> {
        let instance = match &persisted.instance {
            PersistedInstance::None => Instance::None,
            PersistedInstance::Value(blob) => {
                let scope = DecodeScope::new(engine.registry(), engine.types())
                    .with_refs(&persisted.external_refs);
                Instance::Value(blob.decode(&scope)?)
            }
            PersistedInstance::Ref(inner) => {
                Instance::Ref(Box::new(Self::from_persisted(inner, engine)?))
            }
            PersistedInstance::Node(id) => Instance::Node(*id),
        };
        let path: Vec<String> = if persisted.path.is_empty() {
            Vec::new()
        } else {
            split_path(&persisted.path)
        };
        let mut r = MemberRef {
            kind: persisted.kind,
            path,
            items: persisted.items.clone(),
            start_type: persisted.start_type.clone(),
            target_type: persisted.target_type.clone(),
            is_static: persisted.is_static,
            instance,
            external_refs: persisted.external_refs.clone(),
            resolved: None,
        };
        r.normalize();
        Ok(r)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> BindResult<String> {
        serde_json::to_string(&self.to_persisted()?)
            .map_err(|e| BindError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str, engine: &Engine) -> BindResult<Self> {
        let persisted: PersistedRef =
            serde_json::from_str(json).map_err(|e| BindError::Serialization(e.to_string()))?;
        Self::from_persisted(&persisted, engine)
    }
}

/// Split a dotted path. Dots inside type arguments (`List<a.b>`) or
/// element indices are not separators.
fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in path.chars() {
        match c {
            '<' | '[' | '(' => depth += 1,
            '>' | ']' | ')' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                segments.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    segments.push(current);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::{ObjectRef, Type, TypeDef, VariableScope};

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(split_path("List<a.B>.Count"), vec!["List<a.B>", "Count"]);
        assert_eq!(split_path("items[2]"), vec!["items[2]"]);
    }

    #[test]
    fn test_round_trip_keeps_fields() {
        let engine = Engine::standard();
        let enemy = Type::from_def(TypeDef::class("Enemy").graph_asset("a-7", "Enemy").build());
        let saved = MemberRef::variable(VariableScope::Instance, "target", &enemy).then_named("health");

        let json = saved.to_json().unwrap();
        let loaded = MemberRef::from_json(&json, &engine).unwrap();

        assert_eq!(loaded.kind(), TargetKind::InstanceVariable);
        assert_eq!(loaded.path(), saved.path());
        assert_eq!(loaded.start_type(), saved.start_type());
        assert_eq!(loaded.external_refs(), saved.external_refs());
        assert!(!loaded.is_resolved());
        assert_eq!(loaded.to_persisted().unwrap(), saved.to_persisted().unwrap());
    }

    #[test]
    fn test_inline_values_persist() {
        let engine = Engine::standard();
        let r = MemberRef::inline_value(Value::from("hello"));
        let loaded = MemberRef::from_json(&r.to_json().unwrap(), &engine).unwrap();
        match loaded.instance() {
            Instance::Value(v) => assert_eq!(v, &Value::from("hello")),
            other => panic!("unexpected instance {:?}", other),
        }
    }

    #[test]
    fn test_objects_have_no_persisted_form() {
        let object = Value::Object(ObjectRef::new(Type::OBJECT, Default::default()));
        let r = MemberRef::inline_typed(object, &Type::OBJECT);
        assert!(matches!(r.to_json(), Err(BindError::Serialization(_))));
    }

    #[test]
    fn test_value_blob_json_shape() {
        let blob = ValueBlob::encode(&Value::I32(5), &mut Vec::new()).unwrap();
        assert_eq!(
            serde_json::to_string(&blob).unwrap(),
            r#"{"type":"i32","value":5}"#
        );
    }
}
