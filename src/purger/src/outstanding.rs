use std::collections::HashSet;

use crate::store::RequestId;

/// Deletes submitted during one purge whose completion has not been seen yet.
///
/// Owned by a single purge call and only touched from its control flow, so
/// there is no locking.
#[derive(Debug, Default)]
pub struct OutstandingRequests {
    ids: HashSet<RequestId>,
}

impl OutstandingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly accepted request. Returns false if the id was already
    /// outstanding, which means the store reused an in-flight id.
    pub fn insert(&mut self, id: RequestId) -> bool {
        self.ids.insert(id)
    }

    /// Mark `id` as completed. Returns false for ids that were never
    /// submitted or were already completed.
    pub fn complete(&mut self, id: RequestId) -> bool {
        self.ids.remove(&id)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
