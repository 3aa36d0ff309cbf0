//! Cast-compatibility oracle
//!
//! `is_castable(from, to, allow_explicit)` answers in a fixed order:
//!
//! 1. identity, `object`, and host assignability (base chain and interfaces)
//! 2. dynamically-defined types: transitive interface walk, then base walk
//! 3. numeric primitives: strict widening by tier
//! 4. function and delegate types: identical return and parameter sequence
//! 5. user conversion operators on either side
//!
//! Widening is decided before operators so a user operator never shadows a
//! built-in conversion. Answers are memoized per `(from, to, allow_explicit)`.

mod coerce;

use std::sync::Arc;

use graphbind_sdk::{ConversionDirection, ConversionInfo, Primitive, Type, TypeDef};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::trace;

pub use coerce::coerce;

/// Memo of cast-compatibility answers
#[derive(Debug, Default)]
pub struct CastCache {
    memo: Mutex<FxHashMap<(Type, Type, bool), bool>>,
}

impl CastCache {
    /// Empty memo
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a value of `from` may be used where `to` is expected
    pub fn is_castable(&self, from: &Type, to: &Type, allow_explicit: bool) -> bool {
        let key = (from.clone(), to.clone(), allow_explicit);
        if let Some(&answer) = self.memo.lock().get(&key) {
            return answer;
        }
        // Computed outside the lock; racing threads compute the same answer.
        let answer = compute(from, to, allow_explicit);
        trace!(target: "graphbind", %from, %to, allow_explicit, answer, "cast check");
        self.memo.lock().insert(key, answer);
        answer
    }

    /// Forget every answer
    pub fn clear(&self) {
        self.memo.lock().clear();
    }

    /// Number of memoized answers
    pub fn len(&self) -> usize {
        self.memo.lock().len()
    }

    /// Whether nothing is memoized
    pub fn is_empty(&self) -> bool {
        self.memo.lock().is_empty()
    }
}

fn compute(from: &Type, to: &Type, allow_explicit: bool) -> bool {
    if from == to || *to == Type::OBJECT {
        return true;
    }
    if from.is_missing() || to.is_missing() {
        return false;
    }

    if from.is_dynamic() || to.is_dynamic() {
        if to.is_interface() {
            if implements(from, to) {
                return true;
            }
        } else if is_assignable(from, to) {
            return true;
        }
    } else if is_assignable(from, to) {
        return true;
    }

    if let (Some(f), Some(t)) = (from.primitive(), to.primitive()) {
        if f.is_numeric() || f == Primitive::Char || t.is_numeric() {
            return widens(f, t);
        }
    }

    if let (Some(f), Some(t)) = (from.signature(), to.signature()) {
        return f.ret == t.ret && f.params == t.params;
    }

    find_conversion(from, to, allow_explicit).is_some()
}

/// Strict widening: castable only from a lower tier to a higher one
pub fn widens(from: Primitive, to: Primitive) -> bool {
    match (from.widening_tier(), to.widening_tier()) {
        (Some(f), Some(t)) => f < t,
        _ => false,
    }
}

/// Base-chain walk, then transitive interfaces
pub(crate) fn is_assignable(from: &Type, to: &Type) -> bool {
    base_chain(from).iter().any(|t| t == to) || (to.is_interface() && implements(from, to))
}

fn base_chain(ty: &Type) -> Vec<Type> {
    let mut chain = vec![ty.clone()];
    let mut cursor = ty.clone();
    while let Some(base) = cursor.def().and_then(|d| d.base().cloned()) {
        let bound = TypeDef::bind_member_type(&cursor, &base);
        if chain.contains(&bound) {
            break;
        }
        chain.push(bound.clone());
        cursor = bound;
    }
    chain
}

fn implements(from: &Type, interface: &Type) -> bool {
    let mut stack = base_chain(from);
    let mut seen = Vec::new();
    while let Some(ty) = stack.pop() {
        if &ty == interface {
            return true;
        }
        if seen.contains(&ty) {
            continue;
        }
        if let Some(def) = ty.def() {
            stack.extend(
                def.interfaces()
                    .iter()
                    .map(|i| TypeDef::bind_member_type(&ty, i)),
            );
        }
        seen.push(ty);
    }
    false
}

/// User conversion operator turning `from` into `to`, searched on the source
/// definition (`Into`) and then on the target definition (`From`)
pub fn find_conversion(from: &Type, to: &Type, allow_explicit: bool) -> Option<Arc<ConversionInfo>> {
    let usable = |c: &Arc<ConversionInfo>| allow_explicit || !c.is_explicit;
    let on_source = from.def().and_then(|def| {
        def.conversions()
            .iter()
            .find(|c| {
                c.direction == ConversionDirection::Into
                    && &TypeDef::bind_member_type(from, &c.other) == to
                    && usable(c)
            })
            .cloned()
    });
    on_source.or_else(|| {
        to.def().and_then(|def| {
            def.conversions()
                .iter()
                .find(|c| {
                    c.direction == ConversionDirection::From
                        && &TypeDef::bind_member_type(to, &c.other) == from
                        && usable(c)
                })
                .cloned()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::{Signature, Value};

    #[test]
    fn test_widening_is_strict_by_tier() {
        let casts = CastCache::new();
        assert!(casts.is_castable(&Type::I32, &Type::I64, false));
        assert!(!casts.is_castable(&Type::I64, &Type::I32, false));
        assert!(casts.is_castable(&Primitive::U8.into(), &Type::F32, false));
        assert!(!casts.is_castable(&Type::I32, &Primitive::U32.into(), false));
        assert!(!casts.is_castable(&Type::BOOL, &Type::I32, true));
        assert!(!casts.is_castable(&Primitive::ISize.into(), &Type::I64, false));
    }

    #[test]
    fn test_identity_for_every_primitive() {
        let casts = CastCache::new();
        for p in Primitive::ALL {
            let ty: Type = p.into();
            assert!(casts.is_castable(&ty, &ty, false), "{} -> {}", ty, ty);
        }
    }

    #[test]
    fn test_identity_for_constructed_types() {
        let registry = crate::reflect::create_standard_registry();
        let list = registry.lookup("List").and_then(|t| t.def().cloned()).unwrap();
        let vector = Type::from_def(
            TypeDef::structure("Vector3")
                .field(graphbind_sdk::FieldInfo::new("x", Type::F32))
                .build(),
        );
        let enemy = Type::from_def(TypeDef::class("Enemy").graph_asset("a-2", "Enemy").build());
        let enemies = Type::generic_of(list.clone(), vec![enemy.clone()]);
        let handler = Type::function(Signature::new(vec![Type::I32, vector.clone()], Type::BOOL));
        let casts = CastCache::new();

        assert!(matches!(enemies, Type::Composite(_)));
        for ty in [vector, Type::array_of(enemy.clone()), enemies, handler] {
            assert!(casts.is_castable(&ty, &ty, false), "{} -> {}", ty, ty);
            assert!(casts.is_castable(&ty, &ty.clone(), true), "{} -> {}", ty, ty);
        }
        // Separately constructed composites over the same definitions
        let first = Type::generic_of(list.clone(), vec![enemy.clone()]);
        let second = Type::generic_of(list, vec![enemy]);
        assert!(casts.is_castable(&first, &second, false));
    }

    #[test]
    fn test_answers_are_memoized() {
        let casts = CastCache::new();
        casts.is_castable(&Type::I32, &Type::I64, false);
        casts.is_castable(&Type::I32, &Type::I64, false);
        casts.is_castable(&Type::I32, &Type::I64, true);
        assert_eq!(casts.len(), 2);
        casts.clear();
        assert!(casts.is_empty());
    }

    #[test]
    fn test_graph_type_assignable_through_base_and_interface() {
        let damageable = Type::from_def(TypeDef::interface("IDamageable").build());
        let actor = Type::from_def(TypeDef::class("Actor").implements(damageable.clone()).build());
        let enemy = Type::from_def(
            TypeDef::class("Enemy")
                .graph_asset("a-1", "Enemy")
                .base(actor.clone())
                .build(),
        );
        let casts = CastCache::new();

        assert!(casts.is_castable(&enemy, &actor, false));
        assert!(casts.is_castable(&enemy, &damageable, false));
        assert!(!casts.is_castable(&actor, &enemy, false));
    }

    #[test]
    fn test_function_shapes_must_match_exactly() {
        let casts = CastCache::new();
        let a = Type::function(Signature::new(vec![Type::I32], Type::VOID));
        let b = Type::function(Signature::new(vec![Type::I32], Type::VOID));
        let c = Type::function(Signature::new(vec![Type::I64], Type::VOID));
        assert!(casts.is_castable(&a, &b, false));
        assert!(!casts.is_castable(&a, &c, false));
    }

    #[test]
    fn test_user_operators_respect_explicitness() {
        let meters = TypeDef::structure("Meters")
            .conversion(ConversionInfo::implicit(ConversionDirection::Into, Type::F64, |v: Value| {
                Ok(v)
            }))
            .conversion(ConversionInfo::explicit(ConversionDirection::From, Type::F64, |v: Value| {
                Ok(v)
            }))
            .build();
        let meters = Type::from_def(meters);
        let casts = CastCache::new();

        assert!(casts.is_castable(&meters, &Type::F64, false));
        assert!(!casts.is_castable(&Type::F64, &meters, false));
        assert!(casts.is_castable(&Type::F64, &meters, true));
    }
}
