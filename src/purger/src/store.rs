//! Collaborator seams of the delete coordinator.
//!
//! A purge needs two things from the store: a lister that streams the objects
//! under a table path, and a submitter that accepts one delete at a time
//! without waiting for it. Every accepted delete reports back exactly once on
//! the completion channel handed to [`DeleteSubmitter::submit_delete`], in
//! whatever order the store finishes them.

use futures::stream::BoxStream;
use std::fmt;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// Opaque identifier assigned by the store when it accepts a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one submitted delete.
#[derive(Debug)]
pub struct Completion {
    pub id: RequestId,
    pub error: Option<StoreError>,
}

impl Completion {
    pub fn success(id: RequestId) -> Self {
        Self { id, error: None }
    }

    pub fn failure(id: RequestId, error: StoreError) -> Self {
        Self {
            id,
            error: Some(error),
        }
    }
}

pub type CompletionSender = mpsc::Sender<Completion>;
pub type CompletionReceiver = mpsc::Receiver<Completion>;

/// One object found under a table path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    /// Human readable name relative to the table path, e.g. `2024/0_100`.
    pub name: String,
    /// Exact key as the store knows it, passed back unchanged to
    /// [`DeleteSubmitter::submit_delete`].
    pub key: String,
}

impl ListedObject {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// Enumerates the objects under a table path.
pub trait ObjectLister: Send + Sync {
    /// Stream every object under `path`.
    ///
    /// An `Err` item is terminal for the enumeration.
    fn list_objects(&self, path: &str) -> BoxStream<'_, Result<ListedObject, StoreError>>;
}

/// Accepts deletes without waiting for them to finish.
pub trait DeleteSubmitter: Send + Sync {
    /// Submit a delete of `key`, a [`ListedObject::key`] from the same store.
    ///
    /// Returns as soon as the request is accepted. The store later sends a
    /// single [`Completion`] carrying the returned id on `completions`. An
    /// `Err` means the request was rejected and nothing will be sent for it.
    fn submit_delete(
        &self,
        key: &str,
        completions: &CompletionSender,
    ) -> Result<RequestId, StoreError>;
}
