//! Built-in definitions: array and string members, and the `List<T>` collection

use std::sync::Arc;

use graphbind_sdk::{
    ArrayRef, BindError, BindResult, ConstructorInfo, IndexerInfo, MethodInfo, ObjectRef,
    ParamInfo, PropertyInfo, Type, TypeDef, Value,
};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Members every array exposes (`Length` and an `i32` indexer), declared
/// over the element parameter `T`
pub static ARRAY_DEF: Lazy<Arc<TypeDef>> = Lazy::new(|| {
    TypeDef::class("Array")
        .generic_params(&["T"])
        .property(PropertyInfo::new("Length", Type::I32).getter(|receiver| {
            Ok(Value::I32(array_of(receiver)?.len() as i32))
        }))
        .indexer(
            IndexerInfo::new(vec![Type::I32], Type::param("T"), |receiver, keys| {
                let array = array_of(receiver)?;
                let index = index_key(keys)?;
                array.get(index).ok_or_else(|| out_of_range(index, array.len()))
            })
            .setter(|receiver, keys, value| {
                let array = array_of(receiver)?;
                let index = index_key(keys)?;
                if array.set(index, value) {
                    Ok(())
                } else {
                    Err(out_of_range(index, array.len()))
                }
            }),
        )
        .build()
});

/// Members of `string` (`Length` and a read-only `char` indexer)
pub static STRING_DEF: Lazy<Arc<TypeDef>> = Lazy::new(|| {
    TypeDef::class("string")
        .property(PropertyInfo::new("Length", Type::I32).getter(|receiver| {
            Ok(Value::I32(string_of(receiver)?.chars().count() as i32))
        }))
        .indexer(IndexerInfo::new(
            vec![Type::I32],
            graphbind_sdk::Primitive::Char.into(),
            |receiver, keys| {
                let s = string_of(receiver)?;
                let index = index_key(keys)?;
                s.chars()
                    .nth(index)
                    .map(Value::Char)
                    .ok_or_else(|| out_of_range(index, s.chars().count()))
            },
        ))
        .build()
});

const LIST_ITEMS: &str = "items";

/// Growable collection `List<T>` backed by a shared array
pub fn list_definition() -> Arc<TypeDef> {
    TypeDef::class("List")
        .generic_params(&["T"])
        .constructor(ConstructorInfo::new(|ty, _| {
            let element = ty.generic_arguments().first().cloned().unwrap_or(Type::OBJECT);
            let mut fields = FxHashMap::default();
            fields.insert(
                LIST_ITEMS.to_string(),
                Value::Array(ArrayRef::new(element, Vec::new())),
            );
            Ok(Value::Object(ObjectRef::new(ty.clone(), fields)))
        }))
        .method(
            MethodInfo::new("Add", Type::VOID, |receiver, _, args| {
                list_items(receiver)?.push(args[0].clone());
                Ok(Value::Null)
            })
            .param(ParamInfo::new("item", Type::param("T"))),
        )
        .method(MethodInfo::new("Clear", Type::VOID, |receiver, _, _| {
            let items = list_items(receiver)?;
            let element = items.element();
            if let Value::Object(obj) = receiver {
                obj.set_field(LIST_ITEMS, Value::Array(ArrayRef::new(element, Vec::new())));
            }
            Ok(Value::Null)
        }))
        .property(PropertyInfo::new("Count", Type::I32).getter(|receiver| {
            Ok(Value::I32(list_items(receiver)?.len() as i32))
        }))
        .indexer(
            IndexerInfo::new(vec![Type::I32], Type::param("T"), |receiver, keys| {
                let items = list_items(receiver)?;
                let index = index_key(keys)?;
                items.get(index).ok_or_else(|| out_of_range(index, items.len()))
            })
            .setter(|receiver, keys, value| {
                let items = list_items(receiver)?;
                let index = index_key(keys)?;
                if items.set(index, value) {
                    Ok(())
                } else {
                    Err(out_of_range(index, items.len()))
                }
            }),
        )
        .build()
}

fn array_of(receiver: &Value) -> BindResult<&ArrayRef> {
    match receiver {
        Value::Array(array) => Ok(array),
        Value::Null => Err(BindError::NullReference("array".to_string())),
        other => Err(BindError::invalid_cast(other.type_of(), "array")),
    }
}

fn string_of(receiver: &Value) -> BindResult<&str> {
    match receiver {
        Value::Str(s) => Ok(&**s),
        Value::Null => Err(BindError::NullReference("string".to_string())),
        other => Err(BindError::invalid_cast(other.type_of(), Type::STRING)),
    }
}

fn list_items(receiver: &Value) -> BindResult<ArrayRef> {
    match receiver {
        Value::Object(obj) => match obj.field(LIST_ITEMS) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(BindError::Host("list storage is missing".to_string())),
        },
        Value::Null => Err(BindError::NullReference("List".to_string())),
        other => Err(BindError::invalid_cast(other.type_of(), "List")),
    }
}

fn index_key(keys: &[Value]) -> BindResult<usize> {
    keys.first()
        .and_then(Value::as_index)
        .ok_or_else(|| BindError::Argument("index must be a non-negative integer".to_string()))
}

fn out_of_range(index: usize, len: usize) -> BindError {
    BindError::Argument(format!("index {} out of range for length {}", index, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_add_count_and_index() {
        let def = list_definition();
        let ty = Type::generic_of(def.clone(), vec![Type::I32]);
        let mut list = def.constructors()[0].invoke(&ty, &mut []).unwrap();

        let add = def.methods_named("Add").next().unwrap();
        add.invoke(&mut list, &[], &mut [Value::I32(7)]).unwrap();
        add.invoke(&mut list, &[], &mut [Value::I32(9)]).unwrap();

        assert_eq!(def.property("Count").unwrap().get(&list).unwrap(), Value::I32(2));
        let indexer = def.indexer().unwrap();
        assert_eq!(indexer.get(&list, &[Value::I32(1)]).unwrap(), Value::I32(9));
        assert!(indexer.get(&list, &[Value::I32(5)]).is_err());
    }

    #[test]
    fn test_array_length_and_indexer() {
        let array = Value::Array(ArrayRef::new(Type::I32, vec![Value::I32(1), Value::I32(2)]));
        assert_eq!(ARRAY_DEF.property("Length").unwrap().get(&array).unwrap(), Value::I32(2));

        let mut receiver = array.clone();
        ARRAY_DEF
            .indexer()
            .unwrap()
            .set(&mut receiver, &[Value::I32(0)], Value::I32(10))
            .unwrap();
        assert_eq!(array.as_array().unwrap().get(0), Some(Value::I32(10)));
    }
}
