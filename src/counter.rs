use std::collections::BTreeMap;

use crate::{foundation::core::TypeId, store::entity_store::EntityStore};

/// Number of top-level entities per type: standalone markers, or tracks for track types.
///
/// Adjusted incrementally as entities come and go; [`Counter::rebuild`] recomputes from scratch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counter {
    counts: BTreeMap<TypeId, usize>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild(store: &EntityStore) -> Self {
        let counts = store
            .types()
            .iter()
            .map(|t| (t.id, store.query_by_type(t.id).len()))
            .collect();
        Self { counts }
    }

    pub fn get(&self, type_id: TypeId) -> usize {
        self.counts.get(&type_id).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, type_id: TypeId) {
        *self.counts.entry(type_id).or_default() += 1;
    }

    pub fn decrement(&mut self, type_id: TypeId) {
        if let Some(c) = self.counts.get_mut(&type_id) {
            *c = c.saturating_sub(1);
        }
    }

    /// Move one entity from `from` to `to`.
    pub fn transfer(&mut self, from: TypeId, to: TypeId) {
        self.decrement(from);
        self.increment(to);
    }

    pub fn remove_type(&mut self, type_id: TypeId) {
        self.counts.remove(&type_id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, usize)> + '_ {
        self.counts.iter().map(|(t, c)| (*t, *c))
    }

    /// Whether every count matches the store.
    pub fn matches(&self, store: &EntityStore) -> bool {
        store
            .types()
            .iter()
            .all(|t| self.get(t.id) == store.query_by_type(t.id).len())
    }
}

#[cfg(test)]
#[path = "../tests/unit/counter/counter.rs"]
mod tests;
