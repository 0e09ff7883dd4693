//! Coordinator behaviour against scripted collaborators.
//!
//! Deletes complete after a per-submission delay on tokio's paused clock, so
//! completion order is an exact, reproducible permutation of submission order.

use common::config::PurgeConfig;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use purger::{
    Completion, CompletionSender, DeleteCoordinator, DeleteSubmitter, ListedObject, ObjectLister,
    PurgeError, PurgePhase, RequestId, StoreError,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TABLE: &str = "tsdb/cpu";

struct ScriptedLister {
    items: Vec<Result<ListedObject, String>>,
    /// Never finish the listing after the scripted items.
    stall: bool,
}

fn listed(name: &str) -> ListedObject {
    ListedObject::new(name, format!("{TABLE}/{name}"))
}

impl ScriptedLister {
    fn names(count: usize) -> Self {
        Self::with_objects((0..count).map(|i| listed(&format!("obj-{i}"))).collect())
    }

    fn with_objects(objects: Vec<ListedObject>) -> Self {
        Self {
            items: objects.into_iter().map(Ok).collect(),
            stall: false,
        }
    }

    fn with_items(items: Vec<Result<&str, &str>>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| item.map(listed).map_err(str::to_string))
                .collect(),
            stall: false,
        }
    }

    fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }
}

impl ObjectLister for ScriptedLister {
    fn list_objects(&self, _path: &str) -> BoxStream<'_, Result<ListedObject, StoreError>> {
        let scripted = stream::iter(self.items.iter().map(|item| match item {
            Ok(object) => Ok(object.clone()),
            Err(message) => Err(StoreError::Rejected(message.clone())),
        }));
        if self.stall {
            scripted
                .chain(stream::pending::<Result<ListedObject, StoreError>>())
                .boxed()
        } else {
            scripted.boxed()
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Outcome {
    Succeed,
    Fail,
    Reject,
    /// Completion arrives long after any sane deadline.
    Hang,
    /// Completion is never sent.
    Lose,
}

type DelayFn = Box<dyn Fn(usize) -> Duration + Send + Sync>;

struct ScriptedDeleter {
    delay: DelayFn,
    outcomes: HashMap<String, Outcome>,
    submitted: Mutex<Vec<(RequestId, String)>>,
    delivered: Arc<Mutex<Vec<RequestId>>>,
    attempts: AtomicUsize,
}

impl ScriptedDeleter {
    fn new(delay: impl Fn(usize) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            delay: Box::new(delay),
            outcomes: HashMap::new(),
            submitted: Mutex::new(Vec::new()),
            delivered: Arc::new(Mutex::new(Vec::new())),
            attempts: AtomicUsize::new(0),
        }
    }

    fn with_outcome(mut self, name: &str, outcome: Outcome) -> Self {
        self.outcomes.insert(format!("{TABLE}/{name}"), outcome);
        self
    }

    fn submitted(&self) -> Vec<(RequestId, String)> {
        self.submitted.lock().unwrap().clone()
    }

    fn delivered(&self) -> Vec<RequestId> {
        self.delivered.lock().unwrap().clone()
    }

    fn id_of(&self, key: &str) -> RequestId {
        self.submitted()
            .into_iter()
            .find(|(_, k)| k == key)
            .map(|(id, _)| id)
            .unwrap()
    }
}

impl DeleteSubmitter for ScriptedDeleter {
    fn submit_delete(
        &self,
        key: &str,
        completions: &CompletionSender,
    ) -> Result<RequestId, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcomes.get(key).copied().unwrap_or(Outcome::Succeed);
        if let Outcome::Reject = outcome {
            return Err(StoreError::Rejected(format!("malformed key {key}")));
        }

        let mut submitted = self.submitted.lock().unwrap();
        let index = submitted.len();
        // ids deliberately unrelated to submission order
        let id = RequestId::new(7_000 - 13 * index as u64);
        submitted.push((id, key.to_string()));

        let delay = (self.delay)(index);
        let completions = completions.clone();
        let delivered = Arc::clone(&self.delivered);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let completion = match outcome {
                Outcome::Succeed => Completion::success(id),
                Outcome::Fail => {
                    Completion::failure(id, StoreError::Rejected("access denied".to_string()))
                }
                Outcome::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Completion::success(id)
                }
                Outcome::Lose | Outcome::Reject => return,
            };
            delivered.lock().unwrap().push(id);
            let _ = completions.send(completion).await;
        });

        Ok(id)
    }
}

fn build_coordinator(
    lister: ScriptedLister,
    deleter: Arc<ScriptedDeleter>,
    config: PurgeConfig,
) -> DeleteCoordinator {
    DeleteCoordinator::new(Arc::new(lister), deleter, config)
}

fn keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{TABLE}/obj-{i}")).collect()
}

#[tokio::test(start_paused = true)]
async fn test_empty_table_submits_nothing() {
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::ZERO));
    let coordinator = build_coordinator(
        ScriptedLister::names(0),
        deleter.clone(),
        PurgeConfig::default(),
    );

    let report = coordinator.delete_table(TABLE).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(deleter.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_one_delete_per_listed_object_with_shuffled_completions() {
    const N: usize = 50;
    // 37 is coprime with 50, so every completion gets a distinct slot
    let deleter = Arc::new(ScriptedDeleter::new(|i| {
        Duration::from_millis(((i * 37) % N) as u64 + 1)
    }));
    let coordinator = build_coordinator(
        ScriptedLister::names(N),
        deleter.clone(),
        PurgeConfig::default(),
    );

    let report = coordinator.delete_table(TABLE).await.unwrap();

    assert_eq!(report.keys, keys(N));
    let submitted = deleter.submitted();
    assert_eq!(submitted.len(), N);
    let submitted_keys: Vec<_> = submitted.iter().map(|(_, k)| k.clone()).collect();
    assert_eq!(submitted_keys, keys(N));

    let submitted_ids: Vec<_> = submitted.iter().map(|(id, _)| *id).collect();
    let delivered = deleter.delivered();
    assert_ne!(delivered, submitted_ids, "completions should arrive shuffled");
    assert_eq!(
        delivered.iter().collect::<HashSet<_>>(),
        submitted_ids.iter().collect::<HashSet<_>>()
    );
}

#[tokio::test(start_paused = true)]
async fn test_completions_in_reverse_order() {
    const N: usize = 20;
    let deleter = Arc::new(ScriptedDeleter::new(|i| {
        Duration::from_millis((N - i) as u64)
    }));
    let coordinator = build_coordinator(
        ScriptedLister::names(N),
        deleter.clone(),
        PurgeConfig::default(),
    );

    let report = coordinator.delete_table(TABLE).await.unwrap();

    assert_eq!(report.len(), N);
    let mut expected: Vec<_> = deleter.submitted().into_iter().map(|(id, _)| id).collect();
    expected.reverse();
    assert_eq!(deleter.delivered(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_failed_completion_ends_the_drain() {
    const N: usize = 10;
    let deleter = Arc::new(
        ScriptedDeleter::new(|i| {
            if i == 4 {
                Duration::from_millis(1)
            } else {
                Duration::from_millis(100)
            }
        })
        .with_outcome("obj-4", Outcome::Fail),
    );
    let coordinator = build_coordinator(
        ScriptedLister::names(N),
        deleter.clone(),
        PurgeConfig::default(),
    );

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    match err {
        PurgeError::DeletionFailed {
            request_id,
            outstanding,
            source,
        } => {
            assert_eq!(request_id, deleter.id_of("tsdb/cpu/obj-4"));
            assert_eq!(outstanding, N - 1);
            assert_eq!(source.to_string(), "request rejected: access denied");
        }
        other => panic!("expected DeletionFailed, got {other:?}"),
    }
    assert_eq!(deleter.submitted().len(), N);
    assert_eq!(deleter.delivered().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_after_some_successes() {
    const N: usize = 6;
    let deleter = Arc::new(
        ScriptedDeleter::new(|i| Duration::from_millis(i as u64 + 1))
            .with_outcome("obj-2", Outcome::Fail),
    );
    let coordinator = build_coordinator(
        ScriptedLister::names(N),
        deleter.clone(),
        PurgeConfig::default(),
    );

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    assert!(matches!(err, PurgeError::DeletionFailed { outstanding: 3, .. }));
    assert_eq!(err.phase(), PurgePhase::Draining);
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_failure_after_some_submissions() {
    let lister = ScriptedLister::with_items(vec![
        Ok("obj-0"),
        Ok("obj-1"),
        Ok("obj-2"),
        Err("page 2 unavailable"),
        Ok("obj-3"),
    ]);
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::from_millis(5)));
    let coordinator = build_coordinator(lister, deleter.clone(), PurgeConfig::default());

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    match &err {
        PurgeError::EnumerationFailed {
            path,
            outstanding,
            source,
        } => {
            assert_eq!(path, TABLE);
            assert_eq!(*outstanding, 3);
            assert_eq!(source.to_string(), "request rejected: page 2 unavailable");
        }
        other => panic!("expected EnumerationFailed, got {other:?}"),
    }
    assert_eq!(err.outstanding(), 3);
    assert_eq!(deleter.submitted().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_failure_on_first_page() {
    let lister = ScriptedLister::with_items(vec![Err("table not found")]);
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::ZERO));
    let coordinator = build_coordinator(lister, deleter.clone(), PurgeConfig::default());

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    assert!(matches!(
        err,
        PurgeError::EnumerationFailed { outstanding: 0, .. }
    ));
    assert_eq!(deleter.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_submission() {
    let deleter = Arc::new(
        ScriptedDeleter::new(|_| Duration::from_millis(5)).with_outcome("obj-2", Outcome::Reject),
    );
    let coordinator = build_coordinator(
        ScriptedLister::names(5),
        deleter.clone(),
        PurgeConfig::default(),
    );

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    match err {
        PurgeError::SubmissionFailed {
            key, outstanding, ..
        } => {
            assert_eq!(key, "tsdb/cpu/obj-2");
            assert_eq!(outstanding, 2);
        }
        other => panic!("expected SubmissionFailed, got {other:?}"),
    }
    // nothing after the rejected key is submitted
    assert_eq!(deleter.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_lost_completion_hits_the_deadline() {
    let deleter = Arc::new(
        ScriptedDeleter::new(|_| Duration::from_millis(5)).with_outcome("obj-1", Outcome::Hang),
    );
    let config = PurgeConfig {
        drain_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let coordinator = build_coordinator(ScriptedLister::names(3), deleter, config);

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    match err {
        PurgeError::DrainTimedOut {
            timeout,
            outstanding,
        } => {
            assert_eq!(timeout, Duration::from_secs(5));
            assert_eq!(outstanding, 1);
        }
        other => panic!("expected DrainTimedOut, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_dropped_completion_closes_the_channel() {
    let deleter = Arc::new(
        ScriptedDeleter::new(|_| Duration::from_millis(5)).with_outcome("obj-0", Outcome::Lose),
    );
    let coordinator = build_coordinator(
        ScriptedLister::names(3),
        deleter,
        PurgeConfig::default(),
    );

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    assert!(matches!(
        err,
        PurgeError::CompletionChannelClosed { outstanding: 1 }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_while_draining() {
    const N: usize = 4;
    let cancel = CancellationToken::new();
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::from_secs(10)));
    let coordinator = build_coordinator(
        ScriptedLister::names(N),
        deleter,
        PurgeConfig::default(),
    )
    .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    assert!(matches!(
        err,
        PurgeError::Cancelled {
            phase: PurgePhase::Draining,
            outstanding: N
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_enumeration() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::ZERO));
    let coordinator = build_coordinator(
        ScriptedLister::names(3),
        deleter.clone(),
        PurgeConfig::default(),
    )
    .with_cancellation(cancel);

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    assert_eq!(err.phase(), PurgePhase::Enumerating);
    assert_eq!(deleter.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_enumeration_of_empty_table() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::ZERO));
    let coordinator = build_coordinator(
        ScriptedLister::names(0),
        deleter.clone(),
        PurgeConfig::default(),
    )
    .with_cancellation(cancel);

    let err = coordinator.delete_table(TABLE).await.unwrap_err();

    assert!(matches!(
        err,
        PurgeError::Cancelled {
            phase: PurgePhase::Enumerating,
            outstanding: 0
        }
    ));
    assert_eq!(deleter.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_while_listing_stalls() {
    let cancel = CancellationToken::new();
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::from_millis(5)));
    let coordinator = build_coordinator(
        ScriptedLister::names(1).stalling(),
        deleter.clone(),
        PurgeConfig::default(),
    )
    .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(3600),
        coordinator.delete_table(TABLE),
    )
    .await
    .expect("stalled listing should not outlive cancellation");

    assert!(matches!(
        result,
        Err(PurgeError::Cancelled {
            phase: PurgePhase::Enumerating,
            outstanding: 1
        })
    ));
    assert_eq!(deleter.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submits_listed_key_and_reports_decoded_name() {
    let lister = ScriptedLister::with_objects(vec![ListedObject::new(
        "50%",
        "tsdb/cpu/50%25",
    )]);
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::ZERO));
    let coordinator = build_coordinator(lister, deleter.clone(), PurgeConfig::default());

    let report = coordinator.delete_table(TABLE).await.unwrap();

    assert_eq!(report.keys, vec!["tsdb/cpu/50%"]);
    let submitted: Vec<_> = deleter.submitted().into_iter().map(|(_, k)| k).collect();
    assert_eq!(submitted, vec!["tsdb/cpu/50%25"]);
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_lists_without_deleting() {
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::ZERO));
    let config = PurgeConfig {
        dry_run: true,
        ..Default::default()
    };
    let coordinator = build_coordinator(ScriptedLister::names(4), deleter.clone(), config);

    let report = coordinator.delete_table(TABLE).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.keys, keys(4));
    assert_eq!(deleter.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_trailing_slash_in_table_path() {
    let deleter = Arc::new(ScriptedDeleter::new(|_| Duration::ZERO));
    let coordinator = build_coordinator(
        ScriptedLister::names(2),
        deleter.clone(),
        PurgeConfig::default(),
    );

    let report = coordinator.delete_table("/tsdb/cpu/").await.unwrap();

    assert_eq!(report.path, TABLE);
    assert_eq!(report.keys, keys(2));
}
