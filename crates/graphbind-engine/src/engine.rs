//! Engine services and the per-call binding context

use std::sync::Arc;

use graphbind_sdk::{AssetRef, BindResult, GraphHost, NodeId, Type, Value};
use tracing::debug;

use crate::cast::{coerce, CastCache};
use crate::debug::{DebugHooks, DebugRecorder, NoopHooks};
use crate::options::EngineOptions;
use crate::reflect::{create_standard_registry, TypeRegistry};
use crate::token::{decode, DecodeScope, GenericScope, TypeCache, TypeToken};

/// Shared services every descriptor operation runs against.
///
/// The memo tables live here rather than in statics so each engine (and each
/// test) starts from empty caches.
pub struct Engine {
    registry: Arc<TypeRegistry>,
    types: TypeCache,
    casts: Arc<CastCache>,
    options: EngineOptions,
    hooks: Arc<dyn DebugHooks>,
    recorder: Option<Arc<DebugRecorder>>,
    custom_hooks: bool,
}

impl Engine {
    /// Engine over `registry` with default options and no instrumentation
    pub fn new(registry: TypeRegistry) -> Self {
        Self::with_registry(Arc::new(registry))
    }

    /// Engine sharing an existing registry
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            types: TypeCache::new(),
            casts: Arc::new(CastCache::new()),
            options: EngineOptions::default(),
            hooks: Arc::new(NoopHooks),
            recorder: None,
            custom_hooks: false,
        }
    }

    /// Engine over the standard registry
    pub fn standard() -> Self {
        Self::new(create_standard_registry())
    }

    /// Replace the options.
    ///
    /// With `instrument` set and no hooks installed through
    /// [`Engine::with_hooks`], a [`DebugRecorder`] sized by the options
    /// becomes the hooks.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        if options.instrument && !self.custom_hooks {
            let recorder = Arc::new(DebugRecorder::from_options(&options));
            self.hooks = recorder.clone();
            self.recorder = Some(recorder);
        }
        self.options = options;
        self
    }

    /// Install instrumentation hooks
    pub fn with_hooks(mut self, hooks: Arc<dyn DebugHooks>) -> Self {
        self.hooks = hooks;
        self.recorder = None;
        self.custom_hooks = true;
        self
    }

    /// Recorder installed by [`Engine::with_options`], if any
    pub fn recorder(&self) -> Option<&Arc<DebugRecorder>> {
        self.recorder.as_ref()
    }

    /// Active options
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Type registry
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Decode memo
    pub fn types(&self) -> &TypeCache {
        &self.types
    }

    /// Cast memo
    pub fn casts(&self) -> &Arc<CastCache> {
        &self.casts
    }

    /// Installed hooks
    pub fn hooks(&self) -> &Arc<dyn DebugHooks> {
        &self.hooks
    }

    /// Whether a `from` value may be used where `to` is expected
    pub fn is_castable(&self, from: &Type, to: &Type, allow_explicit: bool) -> bool {
        self.casts.is_castable(from, to, allow_explicit)
    }

    /// Coerce `value` to `expected`
    pub fn coerce(&self, value: Value, expected: &Type) -> BindResult<Value> {
        coerce(value, expected, &self.casts)
    }

    /// Decode a standalone token (no generic scope)
    pub fn decode(&self, token: &TypeToken, refs: &[AssetRef]) -> Type {
        decode(
            token,
            &DecodeScope::new(&self.registry, &self.types).with_refs(refs),
        )
    }

    /// Forget every memoized answer after host types were reloaded.
    ///
    /// Descriptors keep their own resolution until invalidated.
    pub fn reload_types(&self) {
        self.types.clear();
        self.casts.clear();
        self.registry.clear_lookups();
        debug!(target: "graphbind", "type memo tables cleared");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("cached_types", &self.types.len())
            .field("cached_casts", &self.casts.len())
            .field("options", &self.options)
            .finish()
    }
}

/// Everything a descriptor operation needs besides the descriptor itself
pub struct BindContext<'a> {
    /// Engine services
    pub engine: &'a Engine,
    /// Owner of the descriptor
    pub host: &'a dyn GraphHost,
    /// Generic bindings in scope
    pub generics: GenericScope,
    /// Node the descriptor belongs to, for instrumentation
    pub node: Option<NodeId>,
}

impl<'a> BindContext<'a> {
    /// Context without generic bindings or owning node
    pub fn new(engine: &'a Engine, host: &'a dyn GraphHost) -> Self {
        Self {
            engine,
            host,
            generics: GenericScope::new(),
            node: None,
        }
    }

    /// Attribute operations to `node`
    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// Use `generics` as the active generic bindings
    pub fn with_generics(mut self, generics: GenericScope) -> Self {
        self.generics = generics;
        self
    }

    /// Decoding scope over the descriptor's references, the active generic
    /// bindings and the owner's generic parameters
    pub(crate) fn decode_scope<'b>(&'b self, refs: &'b [AssetRef]) -> DecodeScope<'b> {
        DecodeScope::new(self.engine.registry(), self.engine.types())
            .with_refs(refs)
            .with_generics(&self.generics)
            .with_fallback(self.host.generic_parameters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::NoHost;

    #[test]
    fn test_reload_clears_memo_tables() {
        let engine = Engine::standard();
        assert!(engine.is_castable(&Type::I32, &Type::F64, false));
        assert_eq!(engine.decode(&TypeToken::named("i32"), &[]), Type::I32);
        assert!(!engine.casts().is_empty());
        assert!(!engine.types().is_empty());

        engine.reload_types();
        assert!(engine.casts().is_empty());
        assert!(engine.types().is_empty());
    }

    #[test]
    fn test_context_builders() {
        let engine = Engine::standard();
        let host = NoHost;
        let ctx = BindContext::new(&engine, &host)
            .with_node(NodeId(7))
            .with_generics(GenericScope::from_pairs([("T", Type::I32)]));

        assert_eq!(ctx.node, Some(NodeId(7)));
        let scope = ctx.decode_scope(&[]);
        assert_eq!(decode(&TypeToken::named("$T"), &scope), Type::I32);
    }
}
