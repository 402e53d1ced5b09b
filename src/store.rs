use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

use crate::error::StoreError;
use crate::telemetry::metric_inc;
use crate::types::{AccountId, SubscriptionRecord};

/// Durable home of subscription pointer records.
///
/// Records are keyed by their full contents. Expired records must be
/// invisible to `list_for_account`; how they are dropped is up to the store.
#[async_trait]
pub trait PointerStore: Send + Sync {
    /// Insert or refresh `record`, resetting its time-to-live to `ttl`.
    async fn upsert(&self, record: &SubscriptionRecord, ttl: Duration) -> Result<(), StoreError>;

    /// Remove `record`. Removing a missing record is not an error.
    async fn delete(&self, record: &SubscriptionRecord) -> Result<(), StoreError>;

    /// Live records for `account_id`, for discovery by other processes.
    async fn list_for_account(&self, account_id: &AccountId) -> Result<Vec<SubscriptionRecord>, StoreError>;
}

/// In-memory store for tests and single-process deployments.
///
/// Expiry is checked lazily against `tokio::time::Instant`, so paused test
/// clocks apply.
#[derive(Default)]
pub struct InMemoryPointerStore {
    records: Mutex<HashMap<SubscriptionRecord, Instant>>,
    failing: AtomicBool,
}

impl InMemoryPointerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following upsert and delete fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of unexpired records.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let guard = self.records.lock().await;
        guard.values().filter(|expires| **expires > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_failing(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated store failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PointerStore for InMemoryPointerStore {
    async fn upsert(&self, record: &SubscriptionRecord, ttl: Duration) -> Result<(), StoreError> {
        self.check_failing()?;
        let now = Instant::now();
        let mut guard = self.records.lock().await;
        guard.retain(|_, expires| *expires > now);
        guard.insert(record.clone(), now + ttl);
        Ok(())
    }

    async fn delete(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        self.check_failing()?;
        self.records.lock().await.remove(record);
        Ok(())
    }

    async fn list_for_account(&self, account_id: &AccountId) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let now = Instant::now();
        let guard = self.records.lock().await;
        Ok(guard
            .iter()
            .filter(|(record, expires)| &record.account_id == account_id && **expires > now)
            .map(|(record, _)| record.clone())
            .collect())
    }
}

/// One-shot completion signal of a store write.
///
/// Resolves once with the store's outcome. Dropping it is fine; the write
/// still runs. If the write task goes away without reporting, the signal
/// resolves to [`StoreError::Abandoned`].
#[derive(Debug)]
pub struct PersistSignal {
    rx: oneshot::Receiver<Result<(), StoreError>>,
}

impl PersistSignal {
    /// A signal that has already completed with `result`.
    pub fn ready(result: Result<(), StoreError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Non-blocking check; `None` while the write is still in flight.
    pub fn try_result(&mut self) -> Option<Result<(), StoreError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(StoreError::Abandoned)),
        }
    }
}

impl Future for PersistSignal {
    type Output = Result<(), StoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(StoreError::Abandoned)))
    }
}

#[derive(Debug, Clone, Copy)]
enum StoreOp {
    Upsert,
    Delete,
}

impl StoreOp {
    fn as_str(&self) -> &'static str {
        match self {
            StoreOp::Upsert => "upsert",
            StoreOp::Delete => "delete",
        }
    }
}

/// Fire-and-forget adapter in front of a [`PointerStore`].
///
/// Every write is spawned on the runtime it was built with and reported
/// through a [`PersistSignal`]. Failures are logged here and otherwise
/// only visible through the signal.
#[derive(Clone)]
pub struct PointerStoreClient {
    store: Arc<dyn PointerStore>,
    runtime: Handle,
    ttl: Duration,
}

impl PointerStoreClient {
    pub fn new(store: Arc<dyn PointerStore>, runtime: Handle, ttl: Duration) -> Self {
        Self { store, runtime, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn upsert(&self, record: SubscriptionRecord) -> PersistSignal {
        self.spawn(StoreOp::Upsert, record)
    }

    pub fn delete(&self, record: SubscriptionRecord) -> PersistSignal {
        self.spawn(StoreOp::Delete, record)
    }

    pub async fn list_for_account(&self, account_id: &AccountId) -> Result<Vec<SubscriptionRecord>, StoreError> {
        self.store.list_for_account(account_id).await
    }

    fn spawn(&self, op: StoreOp, record: SubscriptionRecord) -> PersistSignal {
        let (tx, rx) = oneshot::channel();
        let store = self.store.clone();
        let ttl = self.ttl;

        self.runtime.spawn(async move {
            let result = match op {
                StoreOp::Upsert => store.upsert(&record, ttl).await,
                StoreOp::Delete => store.delete(&record).await,
            };

            match &result {
                Ok(()) => metric_inc("skyhooks.store.ok"),
                Err(err) => {
                    metric_inc("skyhooks.store.error");
                    tracing::error!(op = op.as_str(), ?record, error = %err, "pointer store write failed");
                }
            }

            let _ = tx.send(result);
        });

        PersistSignal { rx }
    }
}
