use std::collections::HashMap;

use dashmap::DashMap;

/// Process-local record of which backend granted each held lock.
///
/// An entry exists while the coordinator believes the lock is held through
/// that backend. Concurrent operations on different names never contend on
/// the same shard entry.
#[derive(Debug, Default)]
pub struct OwnershipTable {
    entries: DashMap<String, usize>,
}

impl OwnershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, name: &str, backend: usize) {
        self.entries.insert(name.to_owned(), backend);
    }

    /// Remove and return the owning backend, if any.
    pub(crate) fn remove(&self, name: &str) -> Option<usize> {
        self.entries.remove(name).map(|(_, backend)| backend)
    }

    /// Remove the entry only if it still points at `backend`.
    pub(crate) fn remove_if_owned_by(&self, name: &str, backend: usize) -> bool {
        self.entries
            .remove_if(name, |_, owner| *owner == backend)
            .is_some()
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.entries.get(name).map(|entry| *entry)
    }

    /// Copy of the current mapping.
    pub fn snapshot(&self) -> HashMap<String, usize> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
