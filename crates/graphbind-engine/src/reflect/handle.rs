//! Resolved member handles
//!
//! A [`MemberHandle`] pairs a member description with the concrete type it was
//! found on, so generic parameters and the `Self` placeholder in the member's
//! signature can be bound when the handle is used.

use std::sync::Arc;

use graphbind_sdk::{
    BindError, BindResult, Callable, ConstructorInfo, EventInfo, FieldInfo, IndexerInfo,
    MethodInfo, PropertyInfo, Signature, Type, TypeDef, Value,
};

/// Member category, in resolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Event
    Event,
    /// Field
    Field,
    /// Property
    Property,
    /// Method
    Method,
    /// Constructor
    Constructor,
    /// Indexer
    Indexer,
}

/// A member bound to the concrete type that declares it
#[derive(Debug, Clone)]
pub enum MemberHandle {
    /// Field
    Field {
        /// Declaring type
        owner: Type,
        /// Field description
        info: Arc<FieldInfo>,
    },
    /// Property
    Property {
        /// Declaring type
        owner: Type,
        /// Property description
        info: Arc<PropertyInfo>,
    },
    /// Method, with its method-level generic arguments
    Method {
        /// Declaring type
        owner: Type,
        /// Method description
        info: Arc<MethodInfo>,
        /// Method-level generic arguments
        generic_args: Vec<Type>,
    },
    /// Constructor
    Constructor {
        /// Constructed type
        owner: Type,
        /// Constructor description
        info: Arc<ConstructorInfo>,
    },
    /// Event
    Event {
        /// Declaring type
        owner: Type,
        /// Event description
        info: Arc<EventInfo>,
    },
    /// Indexer
    Indexer {
        /// Declaring type
        owner: Type,
        /// Indexer description
        info: Arc<IndexerInfo>,
    },
}

impl MemberHandle {
    /// Member category
    pub fn kind(&self) -> MemberKind {
        match self {
            MemberHandle::Field { .. } => MemberKind::Field,
            MemberHandle::Property { .. } => MemberKind::Property,
            MemberHandle::Method { .. } => MemberKind::Method,
            MemberHandle::Constructor { .. } => MemberKind::Constructor,
            MemberHandle::Event { .. } => MemberKind::Event,
            MemberHandle::Indexer { .. } => MemberKind::Indexer,
        }
    }

    /// Member name (`ctor` and `[]` for constructors and indexers)
    pub fn name(&self) -> &str {
        match self {
            MemberHandle::Field { info, .. } => &info.name,
            MemberHandle::Property { info, .. } => &info.name,
            MemberHandle::Method { info, .. } => &info.name,
            MemberHandle::Constructor { .. } => crate::defaults::CONSTRUCTOR_SEGMENT,
            MemberHandle::Event { info, .. } => &info.name,
            MemberHandle::Indexer { .. } => "[]",
        }
    }

    /// Concrete declaring type
    pub fn declaring_type(&self) -> &Type {
        match self {
            MemberHandle::Field { owner, .. }
            | MemberHandle::Property { owner, .. }
            | MemberHandle::Method { owner, .. }
            | MemberHandle::Constructor { owner, .. }
            | MemberHandle::Event { owner, .. }
            | MemberHandle::Indexer { owner, .. } => owner,
        }
    }

    /// Whether the member belongs to the type rather than an instance
    pub fn is_static(&self) -> bool {
        match self {
            MemberHandle::Field { info, .. } => info.is_static,
            MemberHandle::Property { info, .. } => info.is_static,
            MemberHandle::Method { info, .. } => info.is_static,
            MemberHandle::Constructor { .. } => true,
            MemberHandle::Event { info, .. } => info.is_static,
            MemberHandle::Indexer { .. } => false,
        }
    }

    /// Generic arguments a method was instantiated with
    pub fn generic_args(&self) -> &[Type] {
        match self {
            MemberHandle::Method { generic_args, .. } => generic_args,
            _ => &[],
        }
    }

    fn bind(&self, ty: &Type) -> Type {
        let bound = TypeDef::bind_member_type(self.declaring_type(), ty);
        match self {
            MemberHandle::Method {
                info, generic_args, ..
            } if !generic_args.is_empty() => bound.substitute(&info.generic_params, generic_args),
            _ => bound,
        }
    }

    /// Type produced by reading the member (return type for methods,
    /// the constructed type for constructors, element type for indexers)
    pub fn member_type(&self) -> Type {
        match self {
            MemberHandle::Field { info, .. } => self.bind(&info.ty),
            MemberHandle::Property { info, .. } => self.bind(&info.ty),
            MemberHandle::Method { info, .. } => self.bind(&info.ret),
            MemberHandle::Constructor { owner, .. } => owner.clone(),
            MemberHandle::Event { info, .. } => self.bind(&info.handler),
            MemberHandle::Indexer { info, .. } => self.bind(&info.item),
        }
    }

    /// Bound call shape of methods, constructors and indexers (keys -> item)
    pub fn signature(&self) -> Option<Signature> {
        let declared = match self {
            MemberHandle::Method { info, .. } => info.signature(),
            MemberHandle::Constructor { info, .. } => info.signature(),
            MemberHandle::Indexer { info, .. } => Signature::new(info.keys.clone(), info.item.clone()),
            MemberHandle::Event { info, .. } => {
                return self.bind(&info.handler).signature().map(|sig| (*sig).clone());
            }
            _ => return None,
        };
        self.bind(&Type::function(declared))
            .signature()
            .map(|sig| (*sig).clone())
    }

    /// Whether invoking the member writes arguments back
    pub fn has_by_ref(&self) -> bool {
        match self {
            MemberHandle::Method { info, .. } => info.has_by_ref(),
            MemberHandle::Constructor { info, .. } => info.has_by_ref(),
            _ => false,
        }
    }

    /// Number of parameters a call takes (zero for non-callables)
    pub fn arity(&self) -> usize {
        match self {
            MemberHandle::Method { info, .. } => info.params.len(),
            MemberHandle::Constructor { info, .. } => info.params.len(),
            MemberHandle::Indexer { info, .. } => info.keys.len(),
            _ => 0,
        }
    }

    /// Whether a plain read is defined for the member
    pub fn can_read(&self) -> bool {
        match self {
            MemberHandle::Field { .. } | MemberHandle::Event { .. } => true,
            MemberHandle::Property { info, .. } => info.can_read(),
            MemberHandle::Method { info, .. } => info.params.is_empty(),
            MemberHandle::Constructor { info, .. } => info.params.is_empty(),
            MemberHandle::Indexer { .. } => false,
        }
    }

    /// Whether a plain write is defined for the member
    pub fn can_write(&self) -> bool {
        match self {
            MemberHandle::Field { info, .. } => !info.is_readonly,
            MemberHandle::Property { info, .. } => info.can_write(),
            MemberHandle::Event { .. } => true,
            _ => false,
        }
    }

    /// Read the member from `receiver`.
    ///
    /// Zero-argument methods and constructors are invoked; events yield a
    /// function that raises them.
    pub fn read(&self, receiver: &mut Value) -> BindResult<Value> {
        match self {
            MemberHandle::Field { info, .. } => info.get(receiver),
            MemberHandle::Property { info, .. } => info.get(receiver),
            MemberHandle::Method {
                info, generic_args, ..
            } if info.params.is_empty() => info.invoke(receiver, generic_args, &mut []),
            MemberHandle::Constructor { owner, info } if info.params.is_empty() => {
                info.invoke(owner, &mut [])
            }
            MemberHandle::Event { info, .. } => Ok(Value::Function(self.raiser(info, receiver)?)),
            _ => Err(BindError::unsupported(
                "get",
                format!("{} '{}' without invoking it", self.kind_label(), self.name()),
            )),
        }
    }

    /// Write the member on `receiver`; struct receivers are mutated in place.
    ///
    /// Writing an event subscribes the function value.
    pub fn write(&self, receiver: &mut Value, value: Value) -> BindResult<()> {
        match self {
            MemberHandle::Field { info, .. } => info.set(receiver, value),
            MemberHandle::Property { info, .. } => info.set(receiver, value),
            MemberHandle::Event { info, .. } => match value {
                Value::Function(handler) => info.subscribe(receiver, handler),
                other => Err(BindError::invalid_cast(other.type_of(), &info.handler)),
            },
            _ => Err(BindError::unsupported(
                "set",
                format!("{} '{}'", self.kind_label(), self.name()),
            )),
        }
    }

    /// Call the member with already-coerced arguments
    pub fn call(&self, receiver: &mut Value, args: &mut [Value]) -> BindResult<Value> {
        match self {
            MemberHandle::Method {
                info, generic_args, ..
            } => info.invoke(receiver, generic_args, args),
            MemberHandle::Constructor { owner, info } => info.invoke(owner, args),
            MemberHandle::Event { info, .. } => info.raise(receiver, args),
            MemberHandle::Indexer { info, .. } => {
                let keys = info.keys.len();
                if args.len() == keys {
                    info.get(receiver, args)
                } else if args.len() == keys + 1 {
                    let (key_args, value) = args.split_at(keys);
                    info.set(receiver, key_args, value[0].clone())?;
                    Ok(Value::Null)
                } else {
                    Err(BindError::Argument(format!(
                        "indexer takes {} key(s) and an optional value, got {} argument(s)",
                        keys,
                        args.len()
                    )))
                }
            }
            MemberHandle::Field { .. } | MemberHandle::Property { .. } => {
                match self.read(receiver)? {
                    Value::Function(f) => f.call(args),
                    other => Err(BindError::unsupported(
                        "invoke",
                        format!("{} '{}' holding {}", self.kind_label(), self.name(), other.type_of()),
                    )),
                }
            }
        }
    }

    fn raiser(&self, info: &Arc<EventInfo>, receiver: &Value) -> BindResult<Callable> {
        let sig = self
            .signature()
            .ok_or_else(|| BindError::Argument(format!("event '{}' has no handler shape", info.name)))?;
        let info = info.clone();
        let receiver = receiver.clone();
        Ok(Callable::new(sig, move |args| info.raise(&receiver, args)))
    }

    /// Lowercase member category
    pub fn kind_label(&self) -> &'static str {
        match self.kind() {
            MemberKind::Event => "event",
            MemberKind::Field => "field",
            MemberKind::Property => "property",
            MemberKind::Method => "method",
            MemberKind::Constructor => "constructor",
            MemberKind::Indexer => "indexer",
        }
    }
}
