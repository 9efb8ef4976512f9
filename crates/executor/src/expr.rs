//! Compiled expression hooks.
//!
//! Spec §1 treats the expression language and event codec as an
//! external collaborator; operators in this crate consume already
//! *compiled* predicates and key/value extractors rather than an AST,
//! the same boundary drawn around `Storage` elsewhere in this
//! workspace.

use std::sync::Arc;
use zq_core::{Record, Value};

/// A compiled predicate, as used by [`crate::filter::Filter`].
pub type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// A compiled value extractor, as used by group-by keys/reducer inputs
/// and by [`crate::sort::Sort`]'s sort keys.
pub type KeyExpr = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Build a [`KeyExpr`] from a dotted field path, the common case.
pub fn field(path: impl Into<String>) -> KeyExpr {
    let path = path.into();
    Arc::new(move |record: &Record| record.get(&path))
}
