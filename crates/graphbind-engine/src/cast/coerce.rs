//! Argument and value coercion

use std::sync::Arc;

use graphbind_sdk::{BindError, BindResult, Callable, Signature, Type, Value};
use tracing::trace;

use super::{find_conversion, is_assignable, CastCache};

/// Convert `value` to `expected`.
///
/// Function values are adapted to the expected delegate shape, wrapping them
/// in a trampoline when the shapes differ. Other values pass unchanged when
/// their runtime type already fits; otherwise numeric widening or a user
/// conversion operator is applied if the cast oracle allows it.
pub fn coerce(value: Value, expected: &Type, casts: &Arc<CastCache>) -> BindResult<Value> {
    if let Type::Missing(name) = expected {
        return Err(BindError::MissingType(name.to_string()));
    }
    if *expected == Type::OBJECT || *expected == Type::VOID || expected.has_params() {
        return Ok(value);
    }
    if value.is_null() {
        return if expected.is_value_type() {
            Err(BindError::invalid_cast("null", expected))
        } else {
            Ok(value)
        };
    }
    if let Value::Function(f) = value {
        return adapt_function(f, expected, casts);
    }

    let actual = value.type_of();
    if &actual == expected || is_assignable(&actual, expected) {
        return Ok(value);
    }
    if !casts.is_castable(&actual, expected, false) {
        return Err(BindError::invalid_cast(&actual, expected));
    }
    if let (Some(_), Some(target)) = (actual.primitive(), expected.primitive()) {
        return value
            .convert_numeric(target)
            .ok_or_else(|| BindError::invalid_cast(&actual, expected));
    }
    match find_conversion(&actual, expected, false) {
        Some(op) => {
            trace!(target: "graphbind", from = %actual, to = %expected, "user conversion");
            op.convert(value)
        }
        // Castable through an interface walk on a dynamically-defined type.
        None => Ok(value),
    }
}

fn adapt_function(f: Callable, expected: &Type, casts: &Arc<CastCache>) -> BindResult<Value> {
    let Some(target) = expected.signature() else {
        return Err(BindError::invalid_cast(Type::Function(f.signature().clone()), expected));
    };
    let inner = f.signature().clone();
    if *inner == *target {
        return Ok(Value::Function(f));
    }
    if !shapes_compatible(&inner, &target, casts) {
        return Err(BindError::invalid_cast(Type::Function(inner), expected));
    }

    trace!(target: "graphbind", from = %inner, to = %target, "function trampoline");
    let casts = casts.clone();
    let outer = target.clone();
    let trampoline = Callable::from_parts(
        target,
        Arc::new(move |args: &mut [Value]| {
            let mut inner_args = args
                .iter()
                .zip(&inner.params)
                .map(|(arg, param)| coerce(arg.clone(), &param.ty, &casts))
                .collect::<BindResult<Vec<_>>>()?;
            let result = f.call(&mut inner_args)?;
            for (i, param) in inner.params.iter().enumerate() {
                if param.mode.is_by_ref() {
                    args[i] = coerce(inner_args[i].clone(), &outer.params[i].ty, &casts)?;
                }
            }
            if outer.ret == Type::VOID {
                Ok(Value::Null)
            } else {
                coerce(result, &outer.ret, &casts)
            }
        }),
    );
    Ok(Value::Function(trampoline))
}

/// Same arity, same passing modes, each expected argument castable to the
/// inner parameter and the inner result castable to the expected result
fn shapes_compatible(inner: &Signature, outer: &Signature, casts: &CastCache) -> bool {
    inner.params.len() == outer.params.len()
        && inner
            .params
            .iter()
            .zip(&outer.params)
            .all(|(i, o)| i.mode == o.mode && casts.is_castable(&o.ty, &i.ty, false))
        && (outer.ret == Type::VOID || casts.is_castable(&inner.ret, &outer.ret, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::{ConversionDirection, ConversionInfo, TypeDef};

    fn casts() -> Arc<CastCache> {
        Arc::new(CastCache::new())
    }

    #[test]
    fn test_numeric_widening_converts_value() {
        assert_eq!(coerce(Value::I32(3), &Type::I64, &casts()).unwrap(), Value::I64(3));
        assert_eq!(coerce(Value::F32(1.5), &Type::F64, &casts()).unwrap(), Value::F64(1.5));
    }

    #[test]
    fn test_narrowing_is_rejected() {
        let err = coerce(Value::I64(3), &Type::I32, &casts()).unwrap_err();
        assert_eq!(err, BindError::invalid_cast("i64", "i32"));
    }

    #[test]
    fn test_signed_to_unsigned_widening_checks_range() {
        assert_eq!(coerce(Value::I32(5), &Type::U64, &casts()).unwrap(), Value::U64(5));
        let err = coerce(Value::I32(-5), &Type::U64, &casts()).unwrap_err();
        assert_eq!(err, BindError::invalid_cast("i32", "u64"));
        assert!(coerce(Value::I8(-1), &Type::U16, &casts()).is_err());
    }

    #[test]
    fn test_null_only_for_reference_types() {
        assert_eq!(coerce(Value::Null, &Type::STRING, &casts()).unwrap(), Value::Null);
        assert!(coerce(Value::Null, &Type::I32, &casts()).is_err());
    }

    #[test]
    fn test_user_operator_is_applied() {
        let celsius = TypeDef::structure("Celsius")
            .conversion(ConversionInfo::implicit(
                ConversionDirection::From,
                Type::F64,
                |v: Value| Ok(Value::F64(v.as_f64().unwrap_or_default() + 0.5)),
            ))
            .build();
        let celsius = Type::from_def(celsius);

        let out = coerce(Value::F64(1.0), &celsius, &casts()).unwrap();
        assert_eq!(out, Value::F64(1.5));
    }

    #[test]
    fn test_function_is_wrapped_in_trampoline() {
        let wide = Callable::new(Signature::new(vec![Type::I64], Type::I64), |args| {
            Ok(Value::I64(args[0].as_i64().unwrap_or_default() * 2))
        });
        let expected = Type::function(Signature::new(vec![Type::I32], Type::I64));

        let adapted = coerce(Value::Function(wide), &expected, &casts()).unwrap();
        let f = adapted.as_function().unwrap();
        assert_eq!(f.signature().params[0].ty, Type::I32);
        assert_eq!(f.call(&mut [Value::I32(21)]).unwrap(), Value::I64(42));
    }

    #[test]
    fn test_incompatible_function_is_rejected() {
        let f = Callable::new(Signature::new(vec![Type::STRING], Type::VOID), |_| Ok(Value::Null));
        let expected = Type::function(Signature::new(vec![Type::I32], Type::VOID));
        assert!(coerce(Value::Function(f), &expected, &casts()).is_err());
    }
}
