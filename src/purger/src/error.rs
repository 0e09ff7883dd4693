use std::time::Duration;

use crate::store::RequestId;

/// Failure reported by a store collaborator: a listing step, a rejected
/// submission or a failed delete.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
    #[error("invalid object path: {0}")]
    InvalidPath(#[from] object_store::path::Error),
    #[error("no async runtime to run the delete on: {0}")]
    RuntimeUnavailable(#[from] tokio::runtime::TryCurrentError),
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Which part of a purge was running when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgePhase {
    Enumerating,
    Draining,
}

#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    #[error("invalid table path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("failed to enumerate objects under '{path}'")]
    EnumerationFailed {
        path: String,
        outstanding: usize,
        #[source]
        source: StoreError,
    },

    #[error("failed to delete object '{key}'")]
    SubmissionFailed {
        key: String,
        outstanding: usize,
        #[source]
        source: StoreError,
    },

    #[error("failed delete response for request {request_id}")]
    DeletionFailed {
        request_id: RequestId,
        outstanding: usize,
        #[source]
        source: StoreError,
    },

    #[error("timed out after {timeout:?} with {outstanding} deletes outstanding")]
    DrainTimedOut { timeout: Duration, outstanding: usize },

    #[error("completion channel closed with {outstanding} deletes outstanding")]
    CompletionChannelClosed { outstanding: usize },

    #[error("purge cancelled in {phase:?} phase with {outstanding} deletes outstanding")]
    Cancelled { phase: PurgePhase, outstanding: usize },
}

impl PurgeError {
    /// Deletes that were submitted but never acknowledged when the call gave up.
    pub fn outstanding(&self) -> usize {
        match self {
            Self::InvalidPath { .. } => 0,
            Self::EnumerationFailed { outstanding, .. }
            | Self::SubmissionFailed { outstanding, .. }
            | Self::DeletionFailed { outstanding, .. }
            | Self::DrainTimedOut { outstanding, .. }
            | Self::CompletionChannelClosed { outstanding }
            | Self::Cancelled { outstanding, .. } => *outstanding,
        }
    }

    pub fn phase(&self) -> PurgePhase {
        match self {
            Self::InvalidPath { .. }
            | Self::EnumerationFailed { .. }
            | Self::SubmissionFailed { .. } => PurgePhase::Enumerating,
            Self::DeletionFailed { .. }
            | Self::DrainTimedOut { .. }
            | Self::CompletionChannelClosed { .. } => PurgePhase::Draining,
            Self::Cancelled { phase, .. } => *phase,
        }
    }
}
