//! Bulk deletion of time-series tables stored in an object store.
//!
//! A table is every object under a path prefix. [`DeleteCoordinator`] lists
//! those objects, fires one asynchronous delete per object and then waits for
//! all of them to be acknowledged, failing fast on the first error.
//!
//! ## Usage
//!
//! ```no_run
//! use common::config::PurgeConfig;
//! use purger::DeleteCoordinator;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), purger::PurgeError> {
//! let store = Arc::new(object_store::memory::InMemory::new());
//! let coordinator = DeleteCoordinator::for_object_store(store, PurgeConfig::default());
//!
//! let report = coordinator.delete_table("tsdb/cpu_usage").await?;
//! println!("deleted {} objects", report.len());
//! # Ok(())
//! # }
//! ```
//!
//! Other stores plug in through the [`ObjectLister`] and [`DeleteSubmitter`]
//! traits.

pub mod backend;
pub mod coordinator;
pub mod drain;
pub mod error;
pub mod outstanding;
pub mod store;

pub use backend::ObjectStoreBackend;
pub use coordinator::{DeleteCoordinator, PurgeReport};
pub use error::{PurgeError, PurgePhase, StoreError};
pub use outstanding::OutstandingRequests;
pub use store::{
    Completion, CompletionReceiver, CompletionSender, DeleteSubmitter, ListedObject, ObjectLister,
    RequestId,
};
