//! URI scheme registry (spec §5 "URI source registry: rwmutex guarding
//! the scheme→source map; writes only at init").

use crate::local::LocalSource;
use crate::source::Source;
use crate::uri::Uri;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use zq_core::Result;

/// A process-wide map from URI scheme to the `Source` that serves it.
///
/// Follows the same lazily-constructed, lock-guarded singleton idiom
/// `OPEN_DATABASES`-style registries use elsewhere in this workspace.
/// Here the registry is read-mostly — new schemes are only registered
/// at process start (object-store clients, out of scope per spec §1,
/// would register here).
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Arc<dyn Source>>>,
}

impl SourceRegistry {
    /// Build a registry pre-populated with the local filesystem under
    /// the `file` scheme.
    pub fn with_defaults() -> Self {
        let registry = SourceRegistry {
            sources: RwLock::new(HashMap::new()),
        };
        registry.register("file", Arc::new(LocalSource));
        registry
    }

    /// Register (or replace) the source for a scheme.
    pub fn register(&self, scheme: &str, source: Arc<dyn Source>) {
        self.sources.write().insert(scheme.to_string(), source);
    }

    /// Look up the source registered for `scheme`.
    pub fn get(&self, scheme: &str) -> Option<Arc<dyn Source>> {
        self.sources.read().get(scheme).cloned()
    }

    /// Resolve the source that should handle `uri`, or an `Invalid`
    /// error if no source is registered for its scheme.
    pub fn resolve(&self, uri: &Uri) -> Result<Arc<dyn Source>> {
        self.get(&uri.scheme)
            .ok_or_else(|| zq_core::Error::invalid(format!("unknown URI scheme: {}", uri.scheme)))
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        SourceRegistry::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_scheme_is_registered_by_default() {
        let reg = SourceRegistry::with_defaults();
        assert!(reg.get("file").is_some());
    }

    #[test]
    fn unknown_scheme_resolves_to_invalid_error() {
        let reg = SourceRegistry::with_defaults();
        let uri = Uri::parse("s3://bucket/key");
        let err = reg.resolve(&uri).unwrap_err();
        assert_eq!(err.kind(), zq_core::Kind::Invalid);
    }

    #[test]
    fn resolve_finds_registered_scheme() {
        let reg = SourceRegistry::with_defaults();
        let uri = Uri::from_path("/tmp/x");
        assert!(reg.resolve(&uri).is_ok());
    }
}
