//! Serializable type tokens
//!
//! A [`TypeToken`] is a small recursive tree: a name plus parameter tokens.
//! The name is either a plain registered name or carries a one-character
//! prefix:
//!
//! | prefix | meaning                                                    |
//! |--------|------------------------------------------------------------|
//! | `$T`   | generic placeholder, bound from the active generic scope   |
//! | `#n`   | n-th generic argument of the same path segment             |
//! | `@n`   | n-th external asset reference (graph type)                 |
//! | `!N`   | graph type by display name                                 |
//! | `?X`   | array of `X` (stackable)                                   |
//! | `~`    | graph type with no reference index                         |
//!
//! Function types use the name `fn` with parameters `[return, params...]`;
//! by-reference and output parameter tokens are prefixed `&` and `^`.

mod decode;
mod encode;

use std::fmt;

use graphbind_sdk::AssetRef;
use serde::{Deserialize, Serialize};

pub use decode::{decode, DecodeScope, GenericScope, TypeCache};

pub(crate) const GENERIC_PREFIX: char = '$';
pub(crate) const SIBLING_PREFIX: char = '#';
pub(crate) const EXTERNAL_PREFIX: char = '@';
pub(crate) const GRAPH_NAME_PREFIX: char = '!';
pub(crate) const ARRAY_PREFIX: char = '?';
pub(crate) const UNINDEXED_GRAPH: &str = "~";
pub(crate) const FUNCTION_NAME: &str = "fn";
pub(crate) const REF_PARAM_PREFIX: char = '&';
pub(crate) const OUT_PARAM_PREFIX: char = '^';

/// Serializable encoding of a type
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeToken {
    /// Plain or prefixed name
    pub name: String,
    /// Generic arguments, array element parameters, or function shape
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TypeToken>,
    /// Assets referenced by `@n` names in this subtree; when empty the
    /// owning descriptor's references apply
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<AssetRef>,
}

impl TypeToken {
    /// Token with a plain name and no parameters
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Token with parameters
    pub fn with_parameters(name: impl Into<String>, parameters: Vec<TypeToken>) -> Self {
        Self {
            name: name.into(),
            parameters,
            references: Vec::new(),
        }
    }

    /// Whether the token names an array
    pub fn is_array(&self) -> bool {
        self.name.starts_with(ARRAY_PREFIX)
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(element) = self.name.strip_prefix(ARRAY_PREFIX) {
            let inner = TypeToken {
                name: element.to_string(),
                parameters: self.parameters.clone(),
                references: self.references.clone(),
            };
            return write!(f, "{}[]", inner);
        }
        if self.name == FUNCTION_NAME {
            let mut params = self.parameters.iter();
            let ret = params.next();
            write!(f, "fn(")?;
            for (i, p) in params.enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                if let Some(rest) = p.name.strip_prefix(REF_PARAM_PREFIX) {
                    write!(f, "ref {}", TypeToken::with_parameters(rest, p.parameters.clone()))?;
                } else if let Some(rest) = p.name.strip_prefix(OUT_PARAM_PREFIX) {
                    write!(f, "out {}", TypeToken::with_parameters(rest, p.parameters.clone()))?;
                } else {
                    write!(f, "{}", p)?;
                }
            }
            write!(f, ")")?;
            if let Some(ret) = ret {
                write!(f, " -> {}", ret)?;
            }
            return Ok(());
        }

        let name = match self.name.chars().next() {
            Some(GENERIC_PREFIX) => &self.name[1..],
            Some(GRAPH_NAME_PREFIX) => &self.name[1..],
            Some(EXTERNAL_PREFIX) => {
                let index = self.name[1..].parse::<usize>().ok();
                match index.and_then(|i| self.references.get(i)) {
                    Some(asset) => asset.name.as_str(),
                    None => self.name.as_str(),
                }
            }
            _ => self.name.as_str(),
        };
        write!(f, "{}", name)?;
        if !self.parameters.is_empty() {
            write!(f, "<")?;
            for (i, p) in self.parameters.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", p)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}
