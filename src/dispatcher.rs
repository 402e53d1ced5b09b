use std::sync::Arc;

use crate::index::SharedIndex;
use crate::scheduler::Scheduler;
use crate::telemetry::{metric_add, metric_inc};
use crate::types::{AccountId, CallbackHandle, Payload, UserId};

/// Fans notifications out to registered callbacks.
///
/// Every matching callback is posted to the scheduler as its own job;
/// `notify` never waits for any of them.
#[derive(Clone)]
pub struct Dispatcher {
    index: SharedIndex,
    scheduler: Arc<dyn Scheduler>,
}

impl Dispatcher {
    pub fn new(index: SharedIndex, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { index, scheduler }
    }

    /// Schedule `payload` for every callback of `account_id`, then for every
    /// callback of `user_id` if given.
    ///
    /// A callback sitting in both buckets runs twice. Returns whether the
    /// account has at least one callback; an emptied bucket counts as
    /// absent, and the user bucket is only consulted when the account
    /// matched.
    pub fn notify(&self, account_id: &AccountId, payload: Payload, user_id: Option<&UserId>) -> bool {
        let targets: Vec<CallbackHandle> = {
            let index = self.index.lock();
            let Some(account_bucket) = index.account_bucket(account_id).filter(|b| !b.is_empty()) else {
                metric_inc("skyhooks.notify.unmatched");
                return false;
            };

            let user_bucket = user_id
                .and_then(|id| index.user_bucket(id))
                .unwrap_or_default();

            account_bucket.iter().chain(user_bucket).cloned().collect()
        };

        tracing::trace!(account = %account_id, user = ?user_id, callbacks = targets.len(), "dispatching notification");
        metric_inc("skyhooks.notify.matched");
        metric_add("skyhooks.notify.dispatched", targets.len() as u64);

        for callback in targets {
            let payload = payload.clone();
            self.scheduler.post(Box::new(move || callback.invoke(payload)));
        }
        true
    }
}
