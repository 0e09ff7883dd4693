//! Fan-out bulk delete of a table.
//!
//! A purge runs in two phases on the caller's task:
//!
//! 1. **Enumerating**: stream the objects under the table path and submit
//!    one delete per object, recording the returned request id.
//! 2. **Draining**: wait on the shared completion channel until every
//!    recorded id has been acknowledged.
//!
//! The first failure in either phase ends the call. Deletes that were already
//! submitted are neither awaited nor retracted, and objects written under the
//! path after enumeration started are not covered.

use common::config::PurgeConfig;
use futures::StreamExt;
use object_store::ObjectStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::ObjectStoreBackend;
use crate::drain::CompletionDrain;
use crate::error::{PurgeError, PurgePhase};
use crate::outstanding::OutstandingRequests;
use crate::store::{DeleteSubmitter, ObjectLister};

/// Result of a successful purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    /// Normalized table path.
    pub path: String,
    /// Decoded key of every object that was deleted, or would have been in
    /// dry-run mode.
    pub keys: Vec<String>,
    pub dry_run: bool,
}

impl PurgeReport {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub struct DeleteCoordinator {
    lister: Arc<dyn ObjectLister>,
    deleter: Arc<dyn DeleteSubmitter>,
    config: PurgeConfig,
    cancel: CancellationToken,
}

impl DeleteCoordinator {
    pub fn new(
        lister: Arc<dyn ObjectLister>,
        deleter: Arc<dyn DeleteSubmitter>,
        config: PurgeConfig,
    ) -> Self {
        Self {
            lister,
            deleter,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Coordinator that lists and deletes through an object store.
    pub fn for_object_store(store: Arc<dyn ObjectStore>, config: PurgeConfig) -> Self {
        let backend = Arc::new(ObjectStoreBackend::new(store));
        Self::new(backend.clone(), backend, config)
    }

    /// Stop a running purge when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PurgeConfig {
        &self.config
    }

    /// Delete every object currently listed under `path`.
    ///
    /// # Errors
    ///
    /// - [`PurgeError::InvalidPath`] for an empty path.
    /// - [`PurgeError::EnumerationFailed`] when a listing step fails.
    /// - [`PurgeError::SubmissionFailed`] when the store rejects a delete.
    /// - [`PurgeError::DeletionFailed`] when a submitted delete reports failure.
    /// - [`PurgeError::DrainTimedOut`], [`PurgeError::CompletionChannelClosed`]
    ///   or [`PurgeError::Cancelled`] when the completions stop arriving.
    pub async fn delete_table(&self, path: &str) -> Result<PurgeReport, PurgeError> {
        let table = normalize_table_path(path)?;

        tracing::info!(
            path = %table,
            dry_run = self.config.dry_run,
            "Starting table purge"
        );

        let (completions, receiver) = mpsc::channel(self.config.completion_buffer.max(1));
        let mut outstanding = OutstandingRequests::new();
        let mut keys = Vec::new();

        if self.cancel.is_cancelled() {
            return Err(PurgeError::Cancelled {
                phase: PurgePhase::Enumerating,
                outstanding: 0,
            });
        }

        let mut objects = self.lister.list_objects(&table);
        loop {
            // A listing page may stall, cancellation must not wait for it
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::warn!(
                        path = %table,
                        outstanding = outstanding.len(),
                        "Purge cancelled while enumerating"
                    );
                    return Err(PurgeError::Cancelled {
                        phase: PurgePhase::Enumerating,
                        outstanding: outstanding.len(),
                    });
                }
                item = objects.next() => item,
            };
            let Some(item) = item else { break };

            let object = item.map_err(|source| {
                tracing::error!(
                    path = %table,
                    submitted = keys.len(),
                    error = %source,
                    "Enumeration failed, abandoning purge"
                );
                PurgeError::EnumerationFailed {
                    path: table.clone(),
                    outstanding: outstanding.len(),
                    source,
                }
            })?;
            let key = format!("{table}/{}", object.name);

            if self.config.dry_run {
                tracing::info!(key = %key, "[DRY-RUN] Would delete object");
                keys.push(key);
                continue;
            }

            let id = self
                .deleter
                .submit_delete(&object.key, &completions)
                .map_err(|source| {
                    tracing::error!(key = %key, error = %source, "Delete rejected");
                    PurgeError::SubmissionFailed {
                        key: key.clone(),
                        outstanding: outstanding.len(),
                        source,
                    }
                })?;

            if !outstanding.insert(id) {
                tracing::warn!(request_id = %id, key = %key, "Store reused an in-flight request id");
            }
            tracing::debug!(request_id = %id, key = %key, "Submitted delete");
            keys.push(key);
        }
        drop(objects);
        // Only in-flight deletes keep the channel open from here on
        drop(completions);

        let drain = CompletionDrain::new(receiver, outstanding);
        tracing::debug!(
            path = %table,
            outstanding = drain.remaining(),
            "Enumeration complete, draining completions"
        );

        if let Err(e) = drain.wait(self.config.drain_timeout, &self.cancel).await {
            tracing::error!(path = %table, error = %e, "Purge failed while draining");
            return Err(e);
        }

        tracing::info!(
            path = %table,
            deleted = keys.len(),
            dry_run = self.config.dry_run,
            "Table purge complete"
        );

        Ok(PurgeReport {
            path: table,
            keys,
            dry_run: self.config.dry_run,
        })
    }
}

/// Strip surrounding slashes; an empty result would address the whole store.
fn normalize_table_path(path: &str) -> Result<String, PurgeError> {
    let table = path.trim().trim_matches('/');
    if table.is_empty() {
        return Err(PurgeError::InvalidPath {
            path: path.to_string(),
            reason: "refusing to purge the root of the store",
        });
    }
    Ok(table.to_string())
}
