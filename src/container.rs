use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::{ContainerConfig, RuntimeKind};
use crate::dispatcher::Dispatcher;
use crate::error::{ConfigError, StoreError};
use crate::index::{CallbackIndex, SharedIndex};
use crate::manager::SubscriptionManager;
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::store::{PersistSignal, PointerStore, PointerStoreClient};
use crate::types::{AccountId, CallbackHandle, IndexStats, Payload, SubscriptionRecord, UserId};

/// Owns one callback index together with the manager writing to it and
/// the dispatcher reading from it.
///
/// Containers share nothing: two containers never see each other's
/// callbacks, even when they point at the same store.
#[derive(Clone)]
pub struct WebhookContainer {
    index: SharedIndex,
    manager: SubscriptionManager,
    dispatcher: Dispatcher,
    store: PointerStoreClient,
    config: ContainerConfig,
}

impl WebhookContainer {
    /// Build a container whose callbacks run as tasks on the current Tokio
    /// runtime.
    pub fn new(config: ContainerConfig, store: Arc<dyn PointerStore>) -> Result<Self, ConfigError> {
        let handle = runtime_handle(&config)?;
        let scheduler = Arc::new(TokioScheduler::new(handle.clone()));
        Ok(Self::build(config, store, scheduler, handle))
    }

    /// Build a container posting callbacks to `scheduler`. Store writes
    /// still run on the current Tokio runtime.
    pub fn with_scheduler(
        config: ContainerConfig,
        store: Arc<dyn PointerStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, ConfigError> {
        let handle = runtime_handle(&config)?;
        Ok(Self::build(config, store, scheduler, handle))
    }

    fn build(
        config: ContainerConfig,
        store: Arc<dyn PointerStore>,
        scheduler: Arc<dyn Scheduler>,
        handle: Handle,
    ) -> Self {
        let index = CallbackIndex::shared();
        let store = PointerStoreClient::new(store, handle, config.pointer_ttl);

        Self {
            manager: SubscriptionManager::new(index.clone(), store.clone()),
            dispatcher: Dispatcher::new(index.clone(), scheduler),
            index,
            store,
            config,
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// See [`SubscriptionManager::register`].
    pub fn register(
        &self,
        account_id: &AccountId,
        callback: CallbackHandle,
        url: &str,
        user_id: Option<&UserId>,
    ) -> PersistSignal {
        self.manager.register(account_id, callback, url, user_id)
    }

    /// See [`SubscriptionManager::unregister`].
    pub fn unregister(
        &self,
        account_id: &AccountId,
        callback: &CallbackHandle,
        url: &str,
        user_id: Option<&UserId>,
    ) -> Option<PersistSignal> {
        self.manager.unregister(account_id, callback, url, user_id)
    }

    /// See [`Dispatcher::notify`].
    pub fn notify(&self, account_id: &AccountId, payload: Payload, user_id: Option<&UserId>) -> bool {
        self.dispatcher.notify(account_id, payload, user_id)
    }

    /// Live pointer records for `account_id`, including those registered by
    /// other processes sharing the store.
    pub async fn discover(&self, account_id: &AccountId) -> Result<Vec<SubscriptionRecord>, StoreError> {
        self.store.list_for_account(account_id).await
    }

    pub fn stats(&self) -> IndexStats {
        self.index.lock().stats()
    }
}

fn runtime_handle(config: &ContainerConfig) -> Result<Handle, ConfigError> {
    match config.runtime_kind()? {
        RuntimeKind::Tokio => Handle::try_current().map_err(|_| ConfigError::NoRuntime),
    }
}
