//! Type registry and introspection provider
//!
//! The registry knows every host type by name and every graph type by the
//! asset that defines it. It answers member lookups for the dispatcher through
//! the [`MemberProvider`] trait, walking base types and interfaces and binding
//! generic arguments on the way. Lookups are memoized in a concurrent map;
//! unloading a graph asset or reloading types clears the memo.

use std::sync::Arc;

use dashmap::DashMap;
use graphbind_sdk::{AssetRef, BindError, BindResult, Primitive, Type, TypeDef};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use super::builtins::{list_definition, ARRAY_DEF, STRING_DEF};
use super::handle::{MemberHandle, MemberKind};

/// Introspection over host and graph types
///
/// `params` selects an overload by exact (bound) parameter types; `None`
/// takes the first overload whose generic arity fits.
pub trait MemberProvider {
    /// Field by name
    fn find_field(&self, owner: &Type, name: &str) -> Option<MemberHandle>;

    /// Property by name
    fn find_property(&self, owner: &Type, name: &str) -> Option<MemberHandle>;

    /// Method overload by name, parameter types and method-level generic arguments
    fn find_method(
        &self,
        owner: &Type,
        name: &str,
        params: Option<&[Type]>,
        generic_args: &[Type],
    ) -> Option<MemberHandle>;

    /// Constructor overload by parameter types
    fn find_constructor(&self, owner: &Type, params: Option<&[Type]>) -> Option<MemberHandle>;

    /// Event by name
    fn find_event(&self, owner: &Type, name: &str) -> Option<MemberHandle>;

    /// Indexer
    fn find_indexer(&self, owner: &Type) -> Option<MemberHandle>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LookupKey {
    owner: Type,
    kind: MemberKind,
    name: String,
    params: Option<Vec<Type>>,
    generic_args: Vec<Type>,
}

/// Registry of host and graph type definitions
pub struct TypeRegistry {
    host: RwLock<FxHashMap<String, Type>>,
    graph_by_asset: RwLock<FxHashMap<String, Arc<TypeDef>>>,
    graph_by_name: RwLock<FxHashMap<String, String>>,
    lookups: DashMap<LookupKey, Option<MemberHandle>>,
}

impl TypeRegistry {
    /// Empty registry (primitives are always known)
    pub fn new() -> Self {
        Self {
            host: RwLock::new(FxHashMap::default()),
            graph_by_asset: RwLock::new(FxHashMap::default()),
            graph_by_name: RwLock::new(FxHashMap::default()),
            lookups: DashMap::new(),
        }
    }

    /// Create a registry builder
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder {
            defs: Vec::new(),
        }
    }

    /// Register a host definition under its name
    pub fn register(&self, def: Arc<TypeDef>) -> Type {
        let name = def.name().to_string();
        let ty = Type::from_def(def);
        self.host.write().insert(name, ty.clone());
        ty
    }

    /// Host or primitive type by name; graph types by name as a fallback
    pub fn lookup(&self, name: &str) -> Option<Type> {
        if let Some(p) = Primitive::from_name(name) {
            return Some(Type::Primitive(p));
        }
        if let Some(ty) = self.host.read().get(name) {
            return Some(ty.clone());
        }
        self.graph_type_by_name(name)
    }

    /// Definition registered under `name`
    pub fn definition(&self, name: &str) -> Option<Arc<TypeDef>> {
        self.lookup(name).and_then(|ty| ty.def().cloned())
    }

    /// Number of host definitions
    pub fn len(&self) -> usize {
        self.host.read().len()
    }

    /// Whether no host definitions are registered
    pub fn is_empty(&self) -> bool {
        self.host.read().is_empty()
    }

    // ========================================================================
    // Graph types
    // ========================================================================

    /// Register a type defined by a loaded asset
    pub fn load_graph_type(&self, def: Arc<TypeDef>) -> BindResult<Type> {
        let asset = def.asset().cloned().ok_or_else(|| {
            BindError::Argument(format!("'{}' is not defined by a graph asset", def.name()))
        })?;
        debug!(target: "graphbind", asset = %asset.id, name = def.name(), "load graph type");
        self.graph_by_name
            .write()
            .insert(def.name().to_string(), asset.id.clone());
        self.graph_by_asset.write().insert(asset.id, def.clone());
        Ok(Type::from_def(def))
    }

    /// Remove the type an asset defines; returns whether it was loaded
    pub fn unload_graph_asset(&self, asset_id: &str) -> bool {
        let Some(def) = self.graph_by_asset.write().remove(asset_id) else {
            return false;
        };
        let mut names = self.graph_by_name.write();
        if names.get(def.name()).map(String::as_str) == Some(asset_id) {
            names.remove(def.name());
        }
        drop(names);
        debug!(target: "graphbind", asset = asset_id, "unload graph type");
        self.clear_lookups();
        true
    }

    /// Graph type defined by `asset` (by id, then by name)
    pub fn graph_type(&self, asset: &AssetRef) -> Option<Type> {
        if let Some(def) = self.graph_by_asset.read().get(&asset.id) {
            return Some(Type::from_def(def.clone()));
        }
        self.graph_type_by_name(&asset.name)
    }

    /// Graph type by its display name
    pub fn graph_type_by_name(&self, name: &str) -> Option<Type> {
        let id = self.graph_by_name.read().get(name).cloned()?;
        self.graph_by_asset
            .read()
            .get(&id)
            .map(|def| Type::from_def(def.clone()))
    }

    /// Drop every memoized member lookup
    pub fn clear_lookups(&self) {
        self.lookups.clear();
    }

    /// Number of memoized member lookups
    pub fn cached_lookups(&self) -> usize {
        self.lookups.len()
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// `owner`, its base chain, then every transitively implemented interface,
    /// each bound against the concrete type it was reached from
    pub fn hierarchy(&self, owner: &Type) -> Vec<Type> {
        let mut chain = vec![member_owner(owner)];
        let mut cursor = chain[0].clone();
        while let Some(base) = cursor.def().and_then(|d| d.base().cloned()) {
            let bound = TypeDef::bind_member_type(&cursor, &base);
            if chain.contains(&bound) {
                break;
            }
            chain.push(bound.clone());
            cursor = bound;
        }

        let mut seen: FxHashSet<Type> = chain.iter().cloned().collect();
        let mut queue: Vec<Type> = chain.clone();
        while let Some(ty) = queue.pop() {
            let Some(def) = ty.def() else { continue };
            for iface in def.interfaces() {
                let bound = TypeDef::bind_member_type(&ty, iface);
                if seen.insert(bound.clone()) {
                    chain.push(bound.clone());
                    queue.push(bound);
                }
            }
        }
        chain
    }

    fn cached(
        &self,
        key: LookupKey,
        search: impl FnOnce(&TypeRegistry) -> Option<MemberHandle>,
    ) -> Option<MemberHandle> {
        if let Some(hit) = self.lookups.get(&key) {
            return hit.clone();
        }
        let found = search(self);
        trace!(
            target: "graphbind",
            owner = %key.owner,
            name = %key.name,
            found = found.is_some(),
            "member lookup"
        );
        self.lookups.insert(key, found.clone());
        found
    }

    fn search<T>(
        &self,
        owner: &Type,
        mut pick: impl FnMut(&Type, &Arc<TypeDef>) -> Option<T>,
    ) -> Option<T> {
        self.hierarchy(owner)
            .iter()
            .find_map(|ty| ty.def().and_then(|def| pick(ty, def)))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("host_types", &self.host.read().len())
            .field("graph_types", &self.graph_by_asset.read().len())
            .field("cached_lookups", &self.lookups.len())
            .finish()
    }
}

/// The type whose definition carries `owner`'s members: arrays and strings
/// answer through built-in definitions
fn member_owner(owner: &Type) -> Type {
    if let Some(element) = owner.element_type() {
        return Type::generic_of(ARRAY_DEF.clone(), vec![element.clone()]);
    }
    if owner.primitive() == Some(Primitive::String) {
        return Type::Host(STRING_DEF.clone());
    }
    owner.clone()
}

fn params_match(handle: &MemberHandle, params: Option<&[Type]>) -> bool {
    match params {
        None => true,
        Some(expected) => handle
            .signature()
            .is_some_and(|sig| sig.param_types() == expected),
    }
}

impl MemberProvider for TypeRegistry {
    fn find_field(&self, owner: &Type, name: &str) -> Option<MemberHandle> {
        let key = LookupKey {
            owner: owner.clone(),
            kind: MemberKind::Field,
            name: name.to_string(),
            params: None,
            generic_args: Vec::new(),
        };
        self.cached(key, |reg| {
            reg.search(owner, |ty, def| {
                def.field(name).map(|info| MemberHandle::Field {
                    owner: ty.clone(),
                    info: info.clone(),
                })
            })
        })
    }

    fn find_property(&self, owner: &Type, name: &str) -> Option<MemberHandle> {
        let key = LookupKey {
            owner: owner.clone(),
            kind: MemberKind::Property,
            name: name.to_string(),
            params: None,
            generic_args: Vec::new(),
        };
        self.cached(key, |reg| {
            reg.search(owner, |ty, def| {
                def.property(name).map(|info| MemberHandle::Property {
                    owner: ty.clone(),
                    info: info.clone(),
                })
            })
        })
    }

    fn find_method(
        &self,
        owner: &Type,
        name: &str,
        params: Option<&[Type]>,
        generic_args: &[Type],
    ) -> Option<MemberHandle> {
        let key = LookupKey {
            owner: owner.clone(),
            kind: MemberKind::Method,
            name: name.to_string(),
            params: params.map(<[Type]>::to_vec),
            generic_args: generic_args.to_vec(),
        };
        self.cached(key, |reg| {
            reg.search(owner, |ty, def| {
                def.methods_named(name)
                    .filter(|info| {
                        generic_args.is_empty() || info.generic_params.len() == generic_args.len()
                    })
                    .map(|info| MemberHandle::Method {
                        owner: ty.clone(),
                        info: info.clone(),
                        generic_args: generic_args.to_vec(),
                    })
                    .find(|handle| params_match(handle, params))
            })
        })
    }

    fn find_constructor(&self, owner: &Type, params: Option<&[Type]>) -> Option<MemberHandle> {
        let key = LookupKey {
            owner: owner.clone(),
            kind: MemberKind::Constructor,
            name: String::new(),
            params: params.map(<[Type]>::to_vec),
            generic_args: Vec::new(),
        };
        // Constructors are never inherited.
        self.cached(key, |_| {
            owner.def()?.constructors().iter().find_map(|info| {
                let handle = MemberHandle::Constructor {
                    owner: owner.clone(),
                    info: info.clone(),
                };
                params_match(&handle, params).then_some(handle)
            })
        })
    }

    fn find_event(&self, owner: &Type, name: &str) -> Option<MemberHandle> {
        let key = LookupKey {
            owner: owner.clone(),
            kind: MemberKind::Event,
            name: name.to_string(),
            params: None,
            generic_args: Vec::new(),
        };
        self.cached(key, |reg| {
            reg.search(owner, |ty, def| {
                def.event(name).map(|info| MemberHandle::Event {
                    owner: ty.clone(),
                    info: info.clone(),
                })
            })
        })
    }

    fn find_indexer(&self, owner: &Type) -> Option<MemberHandle> {
        let key = LookupKey {
            owner: owner.clone(),
            kind: MemberKind::Indexer,
            name: String::new(),
            params: None,
            generic_args: Vec::new(),
        };
        self.cached(key, |reg| {
            reg.search(owner, |ty, def| {
                def.indexer().map(|info| MemberHandle::Indexer {
                    owner: ty.clone(),
                    info: info.clone(),
                })
            })
        })
    }
}

/// Builder for TypeRegistry
pub struct TypeRegistryBuilder {
    defs: Vec<Arc<TypeDef>>,
}

impl TypeRegistryBuilder {
    /// Register a host definition
    pub fn register(mut self, def: Arc<TypeDef>) -> Self {
        self.defs.push(def);
        self
    }

    /// Build the registry
    pub fn build(self) -> TypeRegistry {
        let registry = TypeRegistry::new();
        for def in self.defs {
            registry.register(def);
        }
        registry
    }
}

/// Create a standard type registry with built-in types
pub fn create_standard_registry() -> TypeRegistry {
    TypeRegistry::builder()
        // Generic collection
        .register(list_definition())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::{FieldInfo, MethodInfo, ParamInfo, Value};

    fn shapes() -> (TypeRegistry, Type, Type) {
        let registry = TypeRegistry::new();
        let shape = registry.register(
            TypeDef::class("Shape")
                .field(FieldInfo::new("name", Type::STRING))
                .method(MethodInfo::new("Scale", Type::VOID, |_, _, _| Ok(Value::Null))
                    .param(ParamInfo::new("by", Type::F32)))
                .method(MethodInfo::new("Scale", Type::VOID, |_, _, _| Ok(Value::Null))
                    .param(ParamInfo::new("by", Type::F64)))
                .build(),
        );
        let circle = registry.register(TypeDef::class("Circle").base(shape.clone()).build());
        (registry, shape, circle)
    }

    #[test]
    fn test_primitives_always_resolve() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.lookup("i32"), Some(Type::I32));
        assert_eq!(registry.lookup("Nope"), None);
    }

    #[test]
    fn test_field_found_through_base_chain() {
        let (registry, shape, circle) = shapes();
        let handle = registry.find_field(&circle, "name").unwrap();
        assert_eq!(handle.declaring_type(), &shape);
        assert_eq!(handle.member_type(), Type::STRING);
    }

    #[test]
    fn test_overload_selected_by_parameter_types() {
        let (registry, _, circle) = shapes();
        let f64_overload = registry
            .find_method(&circle, "Scale", Some(&[Type::F64]), &[])
            .unwrap();
        assert_eq!(f64_overload.signature().unwrap().param_types(), vec![Type::F64]);
        assert!(registry
            .find_method(&circle, "Scale", Some(&[Type::I32]), &[])
            .is_none());
    }

    #[test]
    fn test_lookups_are_memoized_and_cleared() {
        let (registry, _, circle) = shapes();
        registry.find_field(&circle, "name");
        registry.find_field(&circle, "name");
        assert_eq!(registry.cached_lookups(), 1);
        registry.clear_lookups();
        assert_eq!(registry.cached_lookups(), 0);
    }

    #[test]
    fn test_generic_members_are_bound() {
        let registry = create_standard_registry();
        let list = registry.definition("List").unwrap();
        let ints = Type::generic_of(list, vec![Type::I32]);

        let add = registry.find_method(&ints, "Add", None, &[]).unwrap();
        assert_eq!(add.signature().unwrap().param_types(), vec![Type::I32]);
        let indexer = registry.find_indexer(&ints).unwrap();
        assert_eq!(indexer.member_type(), Type::I32);
    }

    #[test]
    fn test_array_members_come_from_builtins() {
        let registry = TypeRegistry::new();
        let strings = Type::array_of(Type::STRING);
        assert!(registry.find_property(&strings, "Length").is_some());
        assert_eq!(registry.find_indexer(&strings).unwrap().member_type(), Type::STRING);
    }

    #[test]
    fn test_graph_type_load_and_unload() {
        let registry = TypeRegistry::new();
        let enemy = TypeDef::class("Enemy").graph_asset("asset-7", "Enemy").build();
        let ty = registry.load_graph_type(enemy).unwrap();

        assert_eq!(registry.graph_type(&AssetRef::new("asset-7", "Enemy")), Some(ty.clone()));
        assert_eq!(registry.lookup("Enemy"), Some(ty));
        assert!(registry.unload_graph_asset("asset-7"));
        assert_eq!(registry.lookup("Enemy"), None);
        assert!(registry.load_graph_type(TypeDef::class("Host").build()).is_err());
    }
}
