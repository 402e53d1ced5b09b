use crate::index::SharedIndex;
use crate::store::{PersistSignal, PointerStoreClient};
use crate::telemetry::metric_inc;
use crate::types::{AccountId, CallbackHandle, SubscriptionRecord, UserId};

/// Keeps the callback index and the durable pointer records in step.
///
/// The index change always happens synchronously; the store write is
/// spawned and its outcome only reported through the returned signal.
#[derive(Clone)]
pub struct SubscriptionManager {
    index: SharedIndex,
    store: PointerStoreClient,
}

impl SubscriptionManager {
    pub fn new(index: SharedIndex, store: PointerStoreClient) -> Self {
        Self { index, store }
    }

    /// Register `callback` for `account_id` (and `user_id`) at `url`.
    ///
    /// Repeating a registration appends the callback again; the pointer
    /// upsert is idempotent by key and refreshes its TTL.
    pub fn register(
        &self,
        account_id: &AccountId,
        callback: CallbackHandle,
        url: &str,
        user_id: Option<&UserId>,
    ) -> PersistSignal {
        self.index.lock().insert(account_id, user_id, callback);

        let record = SubscriptionRecord::new(account_id.clone(), url, user_id.cloned());
        tracing::debug!(?record, "registering webhook");
        metric_inc("skyhooks.register");

        self.store.upsert(record)
    }

    /// Undo a registration made with the same arguments.
    ///
    /// Returns `None` when the account was never registered; nothing is
    /// touched in that case, not even the store.
    pub fn unregister(
        &self,
        account_id: &AccountId,
        callback: &CallbackHandle,
        url: &str,
        user_id: Option<&UserId>,
    ) -> Option<PersistSignal> {
        if !self.index.lock().remove(account_id, user_id, callback) {
            return None;
        }

        let record = SubscriptionRecord::new(account_id.clone(), url, user_id.cloned());
        tracing::debug!(?record, "unregistering webhook");
        metric_inc("skyhooks.unregister");

        Some(self.store.delete(record))
    }
}
