//! At-most-one concurrent mutation per record.

use std::sync::Arc;

use dashmap::DashSet;

type Key = (String, String);

/// Tracks records with a mutation currently in flight.
///
/// Cloning shares the same set, so one guard lives in the app state and every
/// handler sees the same in-flight records.
#[derive(Debug, Clone, Default)]
pub struct MutationGuard {
    active: Arc<DashSet<Key>>,
}

/// Held for the duration of one mutation; releases the record on drop.
#[derive(Debug)]
pub struct MutationTicket {
    active: Arc<DashSet<Key>>,
    key: Key,
}

impl MutationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `(collection, id)`, or returns `None` if another mutation of the
    /// same record is still running.
    pub fn acquire(&self, collection: &str, id: &str) -> Option<MutationTicket> {
        let key = (collection.to_string(), id.to_string());
        if !self.active.insert(key.clone()) {
            return None;
        }
        Some(MutationTicket {
            active: Arc::clone(&self.active),
            key,
        })
    }

}

#[cfg(test)]
impl MutationGuard {
    fn is_active(&self, collection: &str, id: &str) -> bool {
        self.active
            .contains(&(collection.to_string(), id.to_string()))
    }

    fn len(&self) -> usize {
        self.active.len()
    }

    fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl Drop for MutationTicket {
    fn drop(&mut self) {
        self.active.remove(&self.key);
    }
}
