//! Type model
//!
//! A [`Type`] is a cheap, hashable handle. Host and graph definitions are
//! shared through `Arc<TypeDef>` and compare by definition identity, so types
//! can key the engine's memo tables.
//!
//! Dynamically-defined (graph) types never enter a host generic or array
//! instantiation. Building an array or generic over one produces a
//! [`CompositeType`] instead.

use std::fmt;
use std::sync::Arc;

use crate::typedef::{TypeDef, TypeDefKind};

/// Name of the placeholder that member signatures use for their declaring type
pub const SELF_TYPE_NAME: &str = "Self";

/// Built-in primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    /// Boolean
    Bool,
    /// Unicode scalar
    Char,
    /// Signed byte
    I8,
    /// Unsigned byte
    U8,
    /// 16-bit signed
    I16,
    /// 16-bit unsigned
    U16,
    /// 32-bit signed
    I32,
    /// 32-bit unsigned
    U32,
    /// 64-bit signed
    I64,
    /// 64-bit unsigned
    U64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Pointer-width signed
    ISize,
    /// Pointer-width unsigned
    USize,
    /// Immutable string
    String,
    /// Top type, accepts every value
    Object,
    /// No value
    Void,
    /// A type used as a value
    Type,
}

impl Primitive {
    /// Every primitive, in declaration order
    pub const ALL: [Primitive; 18] = [
        Primitive::Bool,
        Primitive::Char,
        Primitive::I8,
        Primitive::U8,
        Primitive::I16,
        Primitive::U16,
        Primitive::I32,
        Primitive::U32,
        Primitive::I64,
        Primitive::U64,
        Primitive::F32,
        Primitive::F64,
        Primitive::ISize,
        Primitive::USize,
        Primitive::String,
        Primitive::Object,
        Primitive::Void,
        Primitive::Type,
    ];

    /// Canonical token name
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::I8 => "i8",
            Primitive::U8 => "u8",
            Primitive::I16 => "i16",
            Primitive::U16 => "u16",
            Primitive::I32 => "i32",
            Primitive::U32 => "u32",
            Primitive::I64 => "i64",
            Primitive::U64 => "u64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::ISize => "isize",
            Primitive::USize => "usize",
            Primitive::String => "string",
            Primitive::Object => "object",
            Primitive::Void => "void",
            Primitive::Type => "type",
        }
    }

    /// Look up a primitive by its canonical name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Position in the numeric widening hierarchy.
    ///
    /// Booleans, pointer-width integers and non-numeric primitives have no tier.
    pub fn widening_tier(self) -> Option<u8> {
        match self {
            Primitive::I8 | Primitive::U8 | Primitive::Char => Some(0),
            Primitive::I16 | Primitive::U16 => Some(1),
            Primitive::I32 | Primitive::U32 => Some(2),
            Primitive::I64 | Primitive::U64 => Some(3),
            Primitive::F32 => Some(4),
            Primitive::F64 => Some(5),
            _ => None,
        }
    }

    /// Integer or floating point (including pointer-width integers)
    pub fn is_numeric(self) -> bool {
        match self {
            Primitive::Char => false,
            Primitive::ISize | Primitive::USize => true,
            _ => self.widening_tier().is_some(),
        }
    }

    /// Copied on read
    pub fn is_value_type(self) -> bool {
        !matches!(
            self,
            Primitive::String | Primitive::Object | Primitive::Type | Primitive::Void
        )
    }
}

/// How a parameter passes its argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamMode {
    /// By value
    #[default]
    In,
    /// By reference, read and written by the callee
    Ref,
    /// Output only, written by the callee
    Out,
}

impl ParamMode {
    /// Whether the callee writes the argument back
    pub fn is_by_ref(self) -> bool {
        !matches!(self, ParamMode::In)
    }
}

/// One parameter of a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamSig {
    /// Parameter type
    pub ty: Type,
    /// Passing mode
    pub mode: ParamMode,
}

impl ParamSig {
    /// By-value parameter
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            mode: ParamMode::In,
        }
    }

    /// Parameter with an explicit mode
    pub fn with_mode(ty: Type, mode: ParamMode) -> Self {
        Self { ty, mode }
    }
}

/// Function/delegate shape
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Parameters in order
    pub params: Vec<ParamSig>,
    /// Return type (`void` for none)
    pub ret: Type,
}

impl Signature {
    /// Signature with by-value parameters
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Self {
            params: params.into_iter().map(ParamSig::new).collect(),
            ret,
        }
    }

    /// Parameter types in order
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    /// Whether any parameter is by-reference or output
    pub fn has_by_ref(&self) -> bool {
        self.params.iter().any(|p| p.mode.is_by_ref())
    }
}

/// Synthesized type built over at least one dynamically-defined constituent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompositeType {
    /// Array whose element is dynamically defined
    ArrayOf(Type),
    /// Generic instantiation with a dynamically-defined argument or definition
    GenericOf {
        /// Open generic definition
        definition: Arc<TypeDef>,
        /// Type arguments in order
        arguments: Vec<Type>,
    },
}

/// A usable type handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Built-in primitive
    Primitive(Primitive),
    /// Host-defined (ahead of time) type
    Host(Arc<TypeDef>),
    /// Host generic instantiation over host arguments
    Generic(Arc<TypeDef>, Vec<Type>),
    /// Host array over a host element type
    Array(Box<Type>),
    /// Type defined by a loaded graph asset
    Graph(Arc<TypeDef>),
    /// Synthesized array/generic over a graph type
    Composite(Arc<CompositeType>),
    /// Structural function type
    Function(Arc<Signature>),
    /// Unbound generic parameter inside a member signature
    Param(Arc<str>),
    /// Placeholder for a type that could not be found
    Missing(Arc<str>),
}

impl Type {
    /// `bool`
    pub const BOOL: Type = Type::Primitive(Primitive::Bool);
    /// `char`
    pub const CHAR: Type = Type::Primitive(Primitive::Char);
    /// `i8`
    pub const I8: Type = Type::Primitive(Primitive::I8);
    /// `u8`
    pub const U8: Type = Type::Primitive(Primitive::U8);
    /// `i16`
    pub const I16: Type = Type::Primitive(Primitive::I16);
    /// `u16`
    pub const U16: Type = Type::Primitive(Primitive::U16);
    /// `i32`
    pub const I32: Type = Type::Primitive(Primitive::I32);
    /// `u32`
    pub const U32: Type = Type::Primitive(Primitive::U32);
    /// `i64`
    pub const I64: Type = Type::Primitive(Primitive::I64);
    /// `u64`
    pub const U64: Type = Type::Primitive(Primitive::U64);
    /// `f32`
    pub const F32: Type = Type::Primitive(Primitive::F32);
    /// `f64`
    pub const F64: Type = Type::Primitive(Primitive::F64);
    /// `string`
    pub const STRING: Type = Type::Primitive(Primitive::String);
    /// `object`
    pub const OBJECT: Type = Type::Primitive(Primitive::Object);
    /// `void`
    pub const VOID: Type = Type::Primitive(Primitive::Void);
    /// `type`
    pub const TYPE: Type = Type::Primitive(Primitive::Type);

    /// Generic parameter placeholder
    pub fn param(name: &str) -> Self {
        Type::Param(Arc::from(name))
    }

    /// Placeholder for the declaring type inside member signatures
    pub fn self_type() -> Self {
        Type::param(SELF_TYPE_NAME)
    }

    /// Missing-type placeholder
    pub fn missing(name: &str) -> Self {
        Type::Missing(Arc::from(name))
    }

    /// Wrap a definition, choosing the graph variant for graph-defined types
    pub fn from_def(def: Arc<TypeDef>) -> Self {
        if def.is_graph() {
            Type::Graph(def)
        } else {
            Type::Host(def)
        }
    }

    /// Function type
    pub fn function(sig: Signature) -> Self {
        Type::Function(Arc::new(sig))
    }

    /// Array of `element`; synthesized when the element is dynamically defined
    pub fn array_of(element: Type) -> Self {
        if element.is_dynamic() {
            Type::Composite(Arc::new(CompositeType::ArrayOf(element)))
        } else {
            Type::Array(Box::new(element))
        }
    }

    /// Generic instantiation; synthesized when any constituent is dynamically defined
    pub fn generic_of(definition: Arc<TypeDef>, arguments: Vec<Type>) -> Self {
        if arguments.is_empty() {
            return Type::from_def(definition);
        }
        if definition.is_graph() || arguments.iter().any(Type::is_dynamic) {
            Type::Composite(Arc::new(CompositeType::GenericOf {
                definition,
                arguments,
            }))
        } else {
            Type::Generic(definition, arguments)
        }
    }

    /// Whether this type exists only because a loaded asset defines it
    pub fn is_dynamic(&self) -> bool {
        match self {
            Type::Graph(_) | Type::Composite(_) => true,
            Type::Array(elem) => elem.is_dynamic(),
            Type::Generic(_, args) => args.iter().any(Type::is_dynamic),
            _ => false,
        }
    }

    /// Whether this is a missing-type placeholder
    pub fn is_missing(&self) -> bool {
        matches!(self, Type::Missing(_))
    }

    /// Primitive kind, if any
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Underlying definition (host, graph or generic definition)
    pub fn def(&self) -> Option<&Arc<TypeDef>> {
        match self {
            Type::Host(def) | Type::Graph(def) | Type::Generic(def, _) => Some(def),
            Type::Composite(c) => match c.as_ref() {
                CompositeType::GenericOf { definition, .. } => Some(definition),
                CompositeType::ArrayOf(_) => None,
            },
            _ => None,
        }
    }

    /// Generic arguments of an instantiation
    pub fn generic_arguments(&self) -> &[Type] {
        match self {
            Type::Generic(_, args) => args,
            Type::Composite(c) => match c.as_ref() {
                CompositeType::GenericOf { arguments, .. } => arguments,
                CompositeType::ArrayOf(_) => &[],
            },
            _ => &[],
        }
    }

    /// Element type of an array (host or synthesized)
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            Type::Composite(c) => match c.as_ref() {
                CompositeType::ArrayOf(elem) => Some(elem),
                CompositeType::GenericOf { .. } => None,
            },
            _ => None,
        }
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        self.element_type().is_some()
    }

    /// Copied on read
    pub fn is_value_type(&self) -> bool {
        match self {
            Type::Primitive(p) => p.is_value_type(),
            Type::Host(def) | Type::Graph(def) | Type::Generic(def, _) => def.is_value_type(),
            Type::Composite(c) => match c.as_ref() {
                CompositeType::GenericOf { definition, .. } => definition.is_value_type(),
                CompositeType::ArrayOf(_) => false,
            },
            _ => false,
        }
    }

    /// Whether the definition is an interface
    pub fn is_interface(&self) -> bool {
        self.def()
            .is_some_and(|def| def.kind() == TypeDefKind::Interface)
    }

    /// Function/delegate signature, for function types and delegate definitions
    pub fn signature(&self) -> Option<Arc<Signature>> {
        match self {
            Type::Function(sig) => Some(sig.clone()),
            Type::Host(def) | Type::Graph(def) => def.delegate_signature().cloned(),
            Type::Generic(def, args) => def
                .delegate_signature()
                .map(|sig| Arc::new(substitute_signature(sig, def.generic_params(), args))),
            _ => None,
        }
    }

    /// Replace generic parameters named in `params` by the matching `args`
    pub fn substitute(&self, params: &[Arc<str>], args: &[Type]) -> Type {
        match self {
            Type::Param(name) => params
                .iter()
                .position(|p| p == name)
                .and_then(|i| args.get(i).cloned())
                .unwrap_or_else(|| self.clone()),
            Type::Array(elem) => Type::array_of(elem.substitute(params, args)),
            Type::Generic(def, inner) => Type::generic_of(
                def.clone(),
                inner.iter().map(|t| t.substitute(params, args)).collect(),
            ),
            Type::Composite(c) => match c.as_ref() {
                CompositeType::ArrayOf(elem) => Type::array_of(elem.substitute(params, args)),
                CompositeType::GenericOf {
                    definition,
                    arguments,
                } => Type::generic_of(
                    definition.clone(),
                    arguments.iter().map(|t| t.substitute(params, args)).collect(),
                ),
            },
            Type::Function(sig) => Type::Function(Arc::new(substitute_signature(sig, params, args))),
            _ => self.clone(),
        }
    }

    /// Whether any generic placeholder remains
    pub fn has_params(&self) -> bool {
        match self {
            Type::Param(_) => true,
            Type::Array(elem) => elem.has_params(),
            Type::Generic(_, args) => args.iter().any(Type::has_params),
            Type::Composite(c) => match c.as_ref() {
                CompositeType::ArrayOf(elem) => elem.has_params(),
                CompositeType::GenericOf { arguments, .. } => arguments.iter().any(Type::has_params),
            },
            Type::Function(sig) => {
                sig.ret.has_params() || sig.params.iter().any(|p| p.ty.has_params())
            }
            _ => false,
        }
    }
}

/// Substitute generic parameters throughout a signature
pub fn substitute_signature(sig: &Signature, params: &[Arc<str>], args: &[Type]) -> Signature {
    Signature {
        params: sig
            .params
            .iter()
            .map(|p| ParamSig::with_mode(p.ty.substitute(params, args), p.mode))
            .collect(),
        ret: sig.ret.substitute(params, args),
    }
}

impl From<Primitive> for Type {
    fn from(p: Primitive) -> Self {
        Type::Primitive(p)
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Type]) -> fmt::Result {
    write!(f, "<")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    write!(f, ">")
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match p.mode {
                ParamMode::In => {}
                ParamMode::Ref => write!(f, "ref ")?,
                ParamMode::Out => write!(f, "out ")?,
            }
            write!(f, "{}", p.ty)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p.name()),
            Type::Host(def) | Type::Graph(def) => write!(f, "{}", def.name()),
            Type::Generic(def, args) => {
                write!(f, "{}", def.name())?;
                write_args(f, args)
            }
            Type::Array(elem) => write!(f, "{}[]", elem),
            Type::Composite(c) => match c.as_ref() {
                CompositeType::ArrayOf(elem) => write!(f, "{}[]", elem),
                CompositeType::GenericOf {
                    definition,
                    arguments,
                } => {
                    write!(f, "{}", definition.name())?;
                    write_args(f, arguments)
                }
            },
            Type::Function(sig) => write!(f, "{}", sig),
            Type::Param(name) => write!(f, "{}", name),
            Type::Missing(name) => write!(f, "<missing {}>", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typedef::TypeDef;

    #[test]
    fn test_primitive_names_round_trip() {
        for p in Primitive::ALL {
            assert_eq!(Primitive::from_name(p.name()), Some(p));
        }
        assert_eq!(Primitive::from_name("decimal"), None);
    }

    #[test]
    fn test_widening_tiers_exclude_bool_and_pointer_width() {
        assert_eq!(Primitive::I32.widening_tier(), Some(2));
        assert_eq!(Primitive::F64.widening_tier(), Some(5));
        assert_eq!(Primitive::Bool.widening_tier(), None);
        assert_eq!(Primitive::ISize.widening_tier(), None);
    }

    #[test]
    fn test_array_over_graph_type_is_composite() {
        let graph = TypeDef::class("Enemy").graph_asset("asset-1", "Enemy").build();
        let host = TypeDef::class("Player").build();

        assert!(matches!(Type::array_of(Type::from_def(graph)), Type::Composite(_)));
        assert!(matches!(Type::array_of(Type::from_def(host)), Type::Array(_)));
    }

    #[test]
    fn test_generic_display_and_substitution() {
        let list = TypeDef::class("List").generic_params(&["T"]).build();
        let open = Type::generic_of(list.clone(), vec![Type::param("T")]);
        assert!(open.has_params());

        let closed = open.substitute(list.generic_params(), &[Type::I32]);
        assert_eq!(closed.to_string(), "List<i32>");
        assert!(!closed.has_params());
    }

    #[test]
    fn test_types_compare_by_definition_identity() {
        let a = TypeDef::class("Same").build();
        let b = TypeDef::class("Same").build();
        assert_eq!(Type::from_def(a.clone()), Type::from_def(a));
        assert_ne!(Type::from_def(b), Type::from_def(TypeDef::class("Same").build()));
    }
}
