//! # Dependency Index
//!
//! Bidirectional map between primaries (Realm, Client) and the secondary
//! objects they reference (Secrets, Realms). Reconcilers register what a
//! primary currently depends on; the watch dispatcher asks which primaries
//! depend on a secondary that just changed.
//!
//! The forward map (primary -> secondaries) is the only record of what a
//! primary depended on last time, so every upsert diffs against it. Entries
//! that become empty are pruned so the index is bounded by the live
//! references, not by history.
//!
//! All operations take one lock for their whole duration and never await,
//! so readers never observe a half-applied upsert.

use crate::crd::ResourceKey;
use crate::observability::metrics;
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct IndexState {
    /// primary -> secondaries it declared at its last upsert
    forward: HashMap<ResourceKey, BTreeSet<ResourceKey>>,
    /// secondary -> primaries declaring it
    reverse: HashMap<ResourceKey, BTreeSet<ResourceKey>>,
}

impl IndexState {
    /// Whether the reverse map agrees with the forward entry of `primary`
    fn is_consistent_for(&self, primary: &ResourceKey) -> bool {
        self.forward.get(primary).is_none_or(|secondaries| {
            secondaries.iter().all(|secondary| {
                self.reverse
                    .get(secondary)
                    .is_some_and(|primaries| primaries.contains(primary))
            })
        })
    }

    /// Drop `primary` from every reverse entry by scanning the whole map
    fn purge(&mut self, primary: &ResourceKey) {
        self.forward.remove(primary);
        self.reverse.retain(|_, primaries| {
            primaries.remove(primary);
            !primaries.is_empty()
        });
    }

    fn unlink(&mut self, primary: &ResourceKey, secondary: &ResourceKey) {
        if let Some(primaries) = self.reverse.get_mut(secondary) {
            primaries.remove(primary);
            if primaries.is_empty() {
                self.reverse.remove(secondary);
            }
        }
    }
}

/// Secondary -> primary index for one kind of dependency
#[derive(Debug)]
pub struct DependencyIndex {
    name: &'static str,
    state: RwLock<IndexState>,
}

impl DependencyIndex {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: RwLock::new(IndexState::default()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `primary` now depends on exactly `secondaries`
    ///
    /// Secondaries registered previously but absent now are released.
    pub fn on_upsert(&self, primary: &ResourceKey, secondaries: BTreeSet<ResourceKey>) {
        let mut state = self.write();

        if !state.is_consistent_for(primary) {
            warn!(
                index = self.name,
                primary = %primary,
                "Dependency index entries disagree, rebuilding them from the current spec"
            );
            metrics::increment_dependency_index_repairs(self.name);
            state.purge(primary);
        }

        let previous = state.forward.remove(primary).unwrap_or_default();
        for stale in previous.difference(&secondaries) {
            state.unlink(primary, stale);
        }
        for secondary in &secondaries {
            state
                .reverse
                .entry(secondary.clone())
                .or_default()
                .insert(primary.clone());
        }

        if previous != secondaries {
            debug!(
                index = self.name,
                primary = %primary,
                dependencies = secondaries.len(),
                "Updated dependencies"
            );
        }
        if !secondaries.is_empty() {
            state.forward.insert(primary.clone(), secondaries);
        }

        metrics::set_dependency_index_entries(self.name, state.reverse.len());
    }

    /// Forget every dependency of `primary`
    pub fn on_delete(&self, primary: &ResourceKey) {
        let mut state = self.write();

        if state.is_consistent_for(primary) {
            let previous = state.forward.remove(primary).unwrap_or_default();
            for secondary in &previous {
                state.unlink(primary, secondary);
            }
        } else {
            warn!(
                index = self.name,
                primary = %primary,
                "Dependency index entries disagree, purging primary"
            );
            metrics::increment_dependency_index_repairs(self.name);
            state.purge(primary);
        }

        metrics::set_dependency_index_entries(self.name, state.reverse.len());
    }

    /// Primaries to reconcile when `secondary` changes
    #[must_use]
    pub fn primaries_depending_on(&self, secondary: &ResourceKey) -> BTreeSet<ResourceKey> {
        self.read().reverse.get(secondary).cloned().unwrap_or_default()
    }

    /// Secondaries `primary` registered at its last upsert
    #[must_use]
    pub fn dependencies_of(&self, primary: &ResourceKey) -> BTreeSet<ResourceKey> {
        self.read().forward.get(primary).cloned().unwrap_or_default()
    }

    /// Number of secondaries with at least one dependent primary
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().reverse.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
