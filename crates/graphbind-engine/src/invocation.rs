//! Calls whose arguments are themselves descriptors
//!
//! A [`MultiArgInvocation`] evaluates each argument descriptor, calls the
//! target once, writes by-reference and output results back into the
//! argument descriptors that accept writes, and finally applies an optional
//! object initializer to the result.

use graphbind_sdk::{BindError, BindResult, ParamMode, Type, Value};
use tracing::trace;

use crate::engine::BindContext;
use crate::reference::MemberRef;
use crate::reflect::MemberProvider;

/// Method collection initializers call for each element
pub const COLLECTION_ADD: &str = "Add";

/// One initializer step
#[derive(Debug, Clone)]
pub enum InitEntry {
    /// Assign a field or property of the result
    Member {
        /// Field or property name
        name: String,
        /// Assigned value
        value: MemberRef,
    },
    /// Append an element through the result's `Add` method
    Element(MemberRef),
}

/// Assignments applied to a freshly produced value
#[derive(Debug, Clone, Default)]
pub struct Initializer {
    /// Steps, applied in order
    pub entries: Vec<InitEntry>,
}

impl Initializer {
    /// Empty initializer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member assignment
    pub fn member(mut self, name: &str, value: MemberRef) -> Self {
        self.entries.push(InitEntry::Member {
            name: name.to_string(),
            value,
        });
        self
    }

    /// Append a collection element
    pub fn element(mut self, value: MemberRef) -> Self {
        self.entries.push(InitEntry::Element(value));
        self
    }
}

/// A call with descriptor arguments
#[derive(Debug, Clone, Default)]
pub struct MultiArgInvocation {
    /// What is called
    pub target: MemberRef,
    /// One descriptor per parameter
    pub args: Vec<MemberRef>,
    /// Applied to the result
    pub initializer: Option<Initializer>,
}

impl MultiArgInvocation {
    /// Invocation of `target` with `args`
    pub fn new(target: MemberRef, args: Vec<MemberRef>) -> Self {
        Self {
            target,
            args,
            initializer: None,
        }
    }

    /// Attach an initializer
    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = Some(initializer);
        self
    }

    /// Evaluate the arguments, call the target and return its result
    pub fn get(&mut self, ctx: &BindContext<'_>) -> BindResult<Value> {
        let sig = self.target.signature(ctx)?;
        let modes: Vec<Option<(ParamMode, Type)>> = (0..self.args.len())
            .map(|i| {
                sig.as_ref()
                    .and_then(|s| s.params.get(i))
                    .map(|p| (p.mode, p.ty.clone()))
            })
            .collect();

        let mut values = Vec::with_capacity(self.args.len());
        for (arg, mode) in self.args.iter_mut().zip(&modes) {
            let value = match mode {
                Some((ParamMode::Out, ty)) => Value::default_for(ty),
                _ if !arg.is_assigned() => Value::Null,
                _ => arg.get(ctx)?,
            };
            values.push(value);
        }
        let before = values.clone();

        let mut result = self.target.invoke(ctx, &mut values)?;

        for (i, (arg, mode)) in self.args.iter_mut().zip(&modes).enumerate() {
            let by_ref = matches!(mode, Some((ParamMode::Ref | ParamMode::Out, _)));
            let is_out = matches!(mode, Some((ParamMode::Out, _)));
            if !by_ref || (values[i] == before[i] && !is_out) {
                continue;
            }
            if arg.can_set(ctx) {
                arg.set(ctx, values[i].clone())?;
            } else {
                trace!(
                    target: "graphbind",
                    arg = i,
                    path = %arg.dotted_path(),
                    "by-reference result dropped, argument is not settable"
                );
            }
        }

        if let Some(initializer) = &mut self.initializer {
            initializer.apply(ctx, &mut result)?;
        }
        Ok(result)
    }
}

impl Initializer {
    fn apply(&mut self, ctx: &BindContext<'_>, target: &mut Value) -> BindResult<()> {
        let provider: &dyn MemberProvider = ctx.engine.registry();
        let ty = target.type_of();
        for entry in &mut self.entries {
            match entry {
                InitEntry::Member { name, value } => {
                    let handle = provider
                        .find_field(&ty, name)
                        .or_else(|| provider.find_property(&ty, name))
                        .ok_or_else(|| BindError::MissingMember {
                            path: name.clone(),
                            searched: ty.to_string(),
                        })?;
                    let value = ctx.engine.coerce(value.get(ctx)?, &handle.member_type())?;
                    handle.write(target, value)?;
                }
                InitEntry::Element(value) => {
                    let add = provider
                        .find_method(&ty, COLLECTION_ADD, None, &[])
                        .ok_or_else(|| BindError::MissingMember {
                            path: COLLECTION_ADD.to_string(),
                            searched: ty.to_string(),
                        })?;
                    let mut args = [value.get(ctx)?];
                    if let Some(param) = add.signature().and_then(|s| s.params.first().cloned()) {
                        args[0] = ctx.engine.coerce(std::mem::take(&mut args[0]), &param.ty)?;
                    }
                    add.call(target, &mut args)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::{FieldInfo, NoHost, TypeDef};

    use crate::engine::Engine;

    #[test]
    fn test_list_initializer_adds_elements() {
        let engine = Engine::standard();
        let host = NoHost;
        let ctx = BindContext::new(&engine, &host);
        let list_i32 = engine
            .registry()
            .lookup("List")
            .map(|list| Type::generic_of(list.def().unwrap().clone(), vec![Type::I32]))
            .unwrap();

        let mut call = MultiArgInvocation::new(MemberRef::constructor(&list_i32, &[]), Vec::new())
            .with_initializer(
                Initializer::new()
                    .element(MemberRef::inline_value(Value::I32(1)))
                    .element(MemberRef::inline_value(Value::I32(2))),
            );
        let list = call.get(&ctx).unwrap();

        let count = engine
            .registry()
            .find_property(&list_i32, "Count")
            .unwrap()
            .read(&mut list.clone())
            .unwrap();
        assert_eq!(count, Value::I32(2));
    }

    #[test]
    fn test_struct_initializer_assigns_fields() {
        let engine = Engine::standard();
        let point = engine.registry().register(
            TypeDef::structure("Point")
                .field(FieldInfo::new("x", Type::F32))
                .field(FieldInfo::new("y", Type::F32))
                .build(),
        );
        let host = NoHost;
        let ctx = BindContext::new(&engine, &host);

        let mut call = MultiArgInvocation::new(MemberRef::graph_constructor(&point, &[]), Vec::new())
            .with_initializer(Initializer::new().member("x", MemberRef::inline_value(Value::I32(3))));
        let value = call.get(&ctx).unwrap();
        let x = engine.registry().find_field(&point, "x").unwrap();
        assert_eq!(x.read(&mut value.clone()).unwrap(), Value::F32(3.0));

        let mut call = MultiArgInvocation::new(MemberRef::graph_constructor(&point, &[]), Vec::new())
            .with_initializer(Initializer::new().member("z", MemberRef::inline_value(Value::I32(1))));
        assert!(matches!(
            call.get(&ctx),
            Err(BindError::MissingMember { path, .. }) if path == "z"
        ));
    }
}
