//! Completion barrier for a batch of submitted deletes.
//!
//! The outstanding set is the countdown: the drain finishes when it is empty,
//! and stops early on the first failed completion, on the deadline or on
//! cancellation.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{PurgeError, PurgePhase};
use crate::outstanding::OutstandingRequests;
use crate::store::CompletionReceiver;

pub struct CompletionDrain {
    receiver: CompletionReceiver,
    outstanding: OutstandingRequests,
}

impl CompletionDrain {
    pub fn new(receiver: CompletionReceiver, outstanding: OutstandingRequests) -> Self {
        Self {
            receiver,
            outstanding,
        }
    }

    pub fn remaining(&self) -> usize {
        self.outstanding.len()
    }

    /// Wait until every outstanding delete has completed.
    ///
    /// The receiver must be the only end still open on the coordinator side,
    /// otherwise a store that loses a completion is only caught by `timeout`.
    pub async fn wait(
        mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), PurgeError> {
        let deadline = Instant::now() + timeout;

        while !self.outstanding.is_empty() {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(PurgeError::Cancelled {
                        phase: PurgePhase::Draining,
                        outstanding: self.outstanding.len(),
                    });
                }
                received = self.receiver.recv() => received,
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(PurgeError::DrainTimedOut {
                        timeout,
                        outstanding: self.outstanding.len(),
                    });
                }
            };

            let Some(completion) = received else {
                return Err(PurgeError::CompletionChannelClosed {
                    outstanding: self.outstanding.len(),
                });
            };

            if !self.outstanding.complete(completion.id) {
                tracing::warn!(
                    request_id = %completion.id,
                    failed = completion.error.is_some(),
                    "Ignoring completion for a request that is not outstanding"
                );
                continue;
            }

            if let Some(source) = completion.error {
                return Err(PurgeError::DeletionFailed {
                    request_id: completion.id,
                    outstanding: self.outstanding.len(),
                    source,
                });
            }

            tracing::trace!(
                request_id = %completion.id,
                remaining = self.outstanding.len(),
                "Delete acknowledged"
            );
        }

        Ok(())
    }
}
