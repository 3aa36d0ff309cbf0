//! Load-time validation of descriptors
//!
//! [`validate`] resolves every descriptor of an asset and records what
//! failed in an [`ErrorRegistry`] keyed by asset id. Validation never fails
//! itself; callers decide whether recorded errors block loading.

use graphbind_sdk::BindError;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::warn;

use crate::engine::BindContext;
use crate::reference::MemberRef;

/// A descriptor that failed validation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{asset}: '{path}': {error}")]
pub struct Diagnostic {
    /// Asset owning the descriptor
    pub asset: String,
    /// Dotted path of the descriptor
    pub path: String,
    /// Why it failed
    #[source]
    pub error: BindError,
}

/// Validation errors grouped by asset
#[derive(Debug, Default)]
pub struct ErrorRegistry {
    errors: Mutex<FxHashMap<String, Vec<Diagnostic>>>,
}

impl ErrorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn register(&self, diagnostic: Diagnostic) {
        self.errors
            .lock()
            .entry(diagnostic.asset.clone())
            .or_default()
            .push(diagnostic);
    }

    /// Diagnostics of `asset`
    pub fn errors(&self, asset: &str) -> Vec<Diagnostic> {
        self.errors.lock().get(asset).cloned().unwrap_or_default()
    }

    /// Drop the diagnostics of `asset`, e.g. before revalidating it
    pub fn clear(&self, asset: &str) {
        self.errors.lock().remove(asset);
    }

    /// Total number of diagnostics
    pub fn len(&self) -> usize {
        self.errors.lock().values().map(Vec::len).sum()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve each descriptor of `asset` and record failures in `registry`.
///
/// Unassigned descriptors are skipped. A descriptor whose recorded target
/// type no longer decodes is reported even when its path resolves. Returns
/// the number of diagnostics recorded.
pub fn validate<'r>(
    asset: &str,
    descriptors: impl IntoIterator<Item = &'r mut MemberRef>,
    ctx: &BindContext<'_>,
    registry: &ErrorRegistry,
) -> usize {
    let mut recorded = 0;
    for descriptor in descriptors {
        if !descriptor.is_assigned() {
            continue;
        }
        let error = descriptor.diagnose(ctx).or_else(|| {
            descriptor.target_type_token().and_then(|token| {
                let ty = descriptor.decode(ctx, token, &[]);
                ty.is_missing()
                    .then(|| BindError::MissingType(token.to_string()))
            })
        });
        let Some(error) = error else {
            continue;
        };
        if matches!(error, BindError::Unassigned) {
            continue;
        }
        warn!(target: "graphbind", asset, path = %descriptor.dotted_path(), %error, "descriptor failed validation");
        registry.register(Diagnostic {
            asset: asset.to_string(),
            path: descriptor.dotted_path(),
            error,
        });
        recorded += 1;
    }
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::{NoHost, Type, TypeDef};

    use crate::engine::Engine;

    #[test]
    fn test_validate_records_missing_members() {
        let engine = Engine::standard();
        let host = NoHost;
        let ctx = BindContext::new(&engine, &host);
        let registry = ErrorRegistry::new();

        let list = engine.registry().lookup("List").unwrap();
        let list_i32 = Type::generic_of(list.def().unwrap().clone(), vec![Type::I32]);
        let mut good = MemberRef::static_type(&list_i32);
        let mut bad = MemberRef::static_type(&list_i32).then_named("Nope");
        let mut empty = MemberRef::none();

        let count = validate("asset-1", [&mut good, &mut bad, &mut empty], &ctx, &registry);
        assert_eq!(count, 1);
        let errors = registry.errors("asset-1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "List<i32>.Nope");
        assert!(errors[0].error.is_missing_member());

        registry.clear("asset-1");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unloaded_graph_type_is_reported() {
        let engine = Engine::standard();
        let host = NoHost;
        let ctx = BindContext::new(&engine, &host);
        let registry = ErrorRegistry::new();

        let ghost = Type::from_def(TypeDef::class("Ghost").graph_asset("gone", "Ghost").build());
        let mut r = MemberRef::static_type(&ghost);
        assert_eq!(validate("a", [&mut r], &ctx, &registry), 1);
        assert!(matches!(registry.errors("a")[0].error, BindError::MissingType(_)));
    }
}
