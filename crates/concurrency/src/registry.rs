//! Per-process map from [`SpaceId`] to its live [`SpaceGuard`].
//!
//! Grounded on `examples/original_source/zqd/space/space.go`'s global
//! `spaces` map; a `DashMap` replaces the mutex-guarded Go map, the
//! same lock-free swap `OPEN_DATABASES`-style registries use elsewhere
//! in this workspace.

use crate::guard::SpaceGuard;
use dashmap::DashMap;
use std::sync::Arc;
use zq_core::SpaceId;

/// Holds one [`SpaceGuard`] per live space, created on first use.
#[derive(Default)]
pub struct GuardRegistry {
    guards: DashMap<SpaceId, Arc<SpaceGuard>>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        GuardRegistry::default()
    }

    /// Fetch the guard for `id`, creating one if this is the first
    /// reference to the space since process start.
    pub fn get_or_create(&self, id: &SpaceId) -> Arc<SpaceGuard> {
        self.guards
            .entry(id.clone())
            .or_insert_with(|| Arc::new(SpaceGuard::new()))
            .clone()
    }

    /// Drop the registry's reference to a space's guard, once its
    /// storage has actually been removed (spec §4.8: the caller is free
    /// to remove storage only after `acquire_for_delete` returns).
    pub fn forget(&self, id: &SpaceId) {
        self.guards.remove(id);
    }

    pub fn contains(&self, id: &SpaceId) -> bool {
        self.guards.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_same_guard_for_repeated_calls() {
        let registry = GuardRegistry::new();
        let id = SpaceId::new();
        let a = registry.get_or_create(&id);
        let b = registry.get_or_create(&id);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn forget_removes_the_entry() {
        let registry = GuardRegistry::new();
        let id = SpaceId::new();
        registry.get_or_create(&id);
        assert!(registry.contains(&id));
        registry.forget(&id);
        assert!(!registry.contains(&id));
    }

    #[test]
    fn distinct_spaces_get_distinct_guards() {
        let registry = GuardRegistry::new();
        let a = registry.get_or_create(&SpaceId::new());
        let b = registry.get_or_create(&SpaceId::new());
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
