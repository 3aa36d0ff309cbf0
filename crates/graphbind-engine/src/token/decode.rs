use dashmap::DashMap;
use graphbind_sdk::{
    AssetRef, GenericParameterContainer, ParamMode, ParamSig, Signature, Type,
};
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use super::{
    TypeToken, ARRAY_PREFIX, EXTERNAL_PREFIX, FUNCTION_NAME, GENERIC_PREFIX, GRAPH_NAME_PREFIX,
    OUT_PARAM_PREFIX, REF_PARAM_PREFIX, SIBLING_PREFIX, UNINDEXED_GRAPH,
};
use crate::reflect::TypeRegistry;

/// Nested generic-parameter bindings, searched innermost first
#[derive(Debug, Clone, Default)]
pub struct GenericScope {
    frames: Vec<FxHashMap<String, Type>>,
}

static EMPTY_GENERICS: GenericScope = GenericScope { frames: Vec::new() };

impl GenericScope {
    /// Scope with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope with a single frame of bindings
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, Type)>) -> Self {
        let mut scope = Self::new();
        scope.push(
            pairs
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        );
        scope
    }

    /// Enter a frame
    pub fn push(&mut self, frame: FxHashMap<String, Type>) {
        self.frames.push(frame);
    }

    /// Leave the innermost frame
    pub fn pop(&mut self) -> Option<FxHashMap<String, Type>> {
        self.frames.pop()
    }

    /// Bind in the innermost frame
    pub fn bind(&mut self, name: &str, ty: Type) {
        if self.frames.is_empty() {
            self.frames.push(FxHashMap::default());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), ty);
        }
    }

    /// Innermost binding of `name`
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Number of frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Process-wide memo of plain type names
///
/// Only parameterless host names are cached; graph types and misses are
/// looked up every time because assets load and unload.
#[derive(Debug, Default)]
pub struct TypeCache {
    names: DashMap<String, Type>,
}

impl TypeCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached lookup through `registry`
    pub fn lookup(&self, name: &str, registry: &TypeRegistry) -> Option<Type> {
        if let Some(hit) = self.names.get(name) {
            return Some(hit.clone());
        }
        let found = registry.lookup(name)?;
        if !found.is_dynamic() {
            self.names.insert(name.to_string(), found.clone());
        }
        Some(found)
    }

    /// Forget every entry
    pub fn clear(&self) {
        self.names.clear();
    }

    /// Number of cached names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Everything a token may refer to while decoding
#[derive(Clone, Copy)]
pub struct DecodeScope<'a> {
    /// Type definitions
    pub registry: &'a TypeRegistry,
    /// Name memo
    pub cache: &'a TypeCache,
    /// The owning descriptor's asset references (`@n`)
    pub external_refs: &'a [AssetRef],
    /// Active generic bindings (`$T`)
    pub generics: &'a GenericScope,
    /// Owner-provided generic bindings, consulted after `generics`
    pub fallback: Option<&'a dyn GenericParameterContainer>,
    /// Generic arguments of the segment being decoded (`#n`)
    pub siblings: &'a [Type],
}

impl<'a> DecodeScope<'a> {
    /// Scope with no references, bindings or siblings
    pub fn new(registry: &'a TypeRegistry, cache: &'a TypeCache) -> Self {
        Self {
            registry,
            cache,
            external_refs: &[],
            generics: &EMPTY_GENERICS,
            fallback: None,
            siblings: &[],
        }
    }

    /// Use the owning descriptor's asset references
    pub fn with_refs(mut self, refs: &'a [AssetRef]) -> Self {
        self.external_refs = refs;
        self
    }

    /// Use generic bindings
    pub fn with_generics(mut self, generics: &'a GenericScope) -> Self {
        self.generics = generics;
        self
    }

    /// Fall back to owner-provided generic bindings
    pub fn with_fallback(mut self, fallback: Option<&'a dyn GenericParameterContainer>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Resolve `#n` against a segment's generic arguments
    pub fn with_siblings(mut self, siblings: &'a [Type]) -> Self {
        self.siblings = siblings;
        self
    }

    fn generic(&self, name: &str) -> Option<Type> {
        self.generics
            .lookup(name)
            .cloned()
            .or_else(|| self.fallback.and_then(|f| f.generic_parameter(name)))
    }
}

/// Decode a token; never fails.
///
/// Names that cannot be found become [`Type::Missing`] so sibling segments
/// still resolve. Unbound generic placeholders stay [`Type::Param`].
pub fn decode(token: &TypeToken, scope: &DecodeScope<'_>) -> Type {
    if !token.references.is_empty() {
        let local = DecodeScope {
            external_refs: &token.references,
            ..*scope
        };
        return decode_name(&token.name, &token.parameters, &local);
    }
    decode_name(&token.name, &token.parameters, scope)
}

fn decode_name(name: &str, parameters: &[TypeToken], scope: &DecodeScope<'_>) -> Type {
    if let Some(element) = name.strip_prefix(ARRAY_PREFIX) {
        return Type::array_of(decode_name(element, parameters, scope));
    }
    if name == FUNCTION_NAME {
        return decode_function(parameters, scope);
    }
    if name == UNINDEXED_GRAPH {
        return missing(name, "graph type without a reference index");
    }

    let args = || -> Vec<Type> { parameters.iter().map(|p| decode(p, scope)).collect() };
    let mut chars = name.chars();
    let base = match chars.next() {
        Some(GENERIC_PREFIX) => {
            let param = chars.as_str();
            return match scope.generic(param) {
                Some(bound) => bound,
                None => {
                    trace!(target: "graphbind", param, "unbound generic placeholder");
                    Type::param(param)
                }
            };
        }
        Some(SIBLING_PREFIX) => {
            let sibling = chars
                .as_str()
                .parse::<usize>()
                .ok()
                .and_then(|i| scope.siblings.get(i).cloned());
            return sibling.unwrap_or_else(|| missing(name, "segment generic index out of range"));
        }
        Some(EXTERNAL_PREFIX) => {
            let asset = chars
                .as_str()
                .parse::<usize>()
                .ok()
                .and_then(|i| scope.external_refs.get(i));
            match asset {
                Some(asset) => match scope.registry.graph_type(asset) {
                    Some(ty) => ty,
                    None => return missing(&asset.name, "graph asset not loaded"),
                },
                None => return missing(name, "external reference index out of range"),
            }
        }
        Some(GRAPH_NAME_PREFIX) => match scope.registry.graph_type_by_name(chars.as_str()) {
            Some(ty) => ty,
            None => return missing(chars.as_str(), "graph type not loaded"),
        },
        _ if parameters.is_empty() => {
            return scope
                .cache
                .lookup(name, scope.registry)
                .unwrap_or_else(|| missing(name, "type not registered"));
        }
        _ => match scope.registry.lookup(name) {
            Some(ty) => ty,
            None => return missing(name, "type not registered"),
        },
    };

    if parameters.is_empty() {
        return base;
    }
    match base.def() {
        Some(def) if !def.generic_params().is_empty() => Type::generic_of(def.clone(), args()),
        _ => missing(name, "type is not generic"),
    }
}

fn decode_function(parameters: &[TypeToken], scope: &DecodeScope<'_>) -> Type {
    let Some((ret, params)) = parameters.split_first() else {
        return missing(FUNCTION_NAME, "function token without a return type");
    };
    let params = params
        .iter()
        .map(|p| {
            let (mode, name) = if let Some(rest) = p.name.strip_prefix(REF_PARAM_PREFIX) {
                (ParamMode::Ref, rest)
            } else if let Some(rest) = p.name.strip_prefix(OUT_PARAM_PREFIX) {
                (ParamMode::Out, rest)
            } else {
                (ParamMode::In, p.name.as_str())
            };
            ParamSig::with_mode(decode_name(name, &p.parameters, scope), mode)
        })
        .collect();
    Type::function(Signature {
        params,
        ret: decode(ret, scope),
    })
}

fn missing(name: &str, reason: &str) -> Type {
    warn!(target: "graphbind", name, reason, "type token did not resolve");
    Type::missing(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::TypeDef;

    use crate::reflect::create_standard_registry;

    #[test]
    fn test_plain_names_are_cached() {
        let registry = create_standard_registry();
        let cache = TypeCache::new();
        let scope = DecodeScope::new(&registry, &cache);

        assert_eq!(decode(&TypeToken::named("i32"), &scope), Type::I32);
        assert_eq!(cache.len(), 1);
        assert!(decode(&TypeToken::named("Unknown"), &scope).is_missing());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_generic_placeholder_walks_scopes_innermost_first() {
        let registry = TypeRegistry::new();
        let cache = TypeCache::new();
        let mut generics = GenericScope::from_pairs([("T", Type::I32)]);
        generics.push(FxHashMap::default());
        generics.bind("T", Type::STRING);
        let scope = DecodeScope::new(&registry, &cache).with_generics(&generics);

        assert_eq!(decode(&TypeToken::named("$T"), &scope), Type::STRING);
        generics.pop();
        let scope = DecodeScope::new(&registry, &cache).with_generics(&generics);
        assert_eq!(decode(&TypeToken::named("$T"), &scope), Type::I32);
        assert_eq!(decode(&TypeToken::named("$U"), &scope), Type::param("U"));
    }

    #[test]
    fn test_array_of_graph_type_is_synthesized() {
        let registry = TypeRegistry::new();
        let cache = TypeCache::new();
        let enemy = registry
            .load_graph_type(TypeDef::class("Enemy").graph_asset("a-1", "Enemy").build())
            .unwrap();
        let refs = vec![AssetRef::new("a-1", "Enemy")];
        let scope = DecodeScope::new(&registry, &cache).with_refs(&refs);

        let ty = decode(&TypeToken::named("?@0"), &scope);
        assert!(matches!(ty, Type::Composite(_)));
        assert_eq!(ty.element_type(), Some(&enemy));
        assert!(decode(&TypeToken::named("@3"), &scope).is_missing());
    }

    #[test]
    fn test_round_trip_through_standalone_token() {
        let registry = create_standard_registry();
        let cache = TypeCache::new();
        let enemy = registry
            .load_graph_type(TypeDef::class("Enemy").graph_asset("a-2", "Enemy").build())
            .unwrap();
        let list = registry.definition("List").unwrap();
        let ty = Type::generic_of(list, vec![enemy]);

        let token = TypeToken::standalone(&ty);
        let scope = DecodeScope::new(&registry, &cache);
        assert_eq!(decode(&token, &scope), ty);
    }

    #[test]
    fn test_missing_argument_does_not_abort_siblings() {
        let registry = create_standard_registry();
        let cache = TypeCache::new();
        let scope = DecodeScope::new(&registry, &cache);
        let token = TypeToken::with_parameters("List", vec![TypeToken::named("Ghost")]);

        let ty = decode(&token, &scope);
        assert_eq!(ty.generic_arguments(), &[Type::missing("Ghost")]);
    }
}
