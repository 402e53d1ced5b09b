use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::OnceCell;

use crate::config::ContainerConfig;
use crate::error::{ConfigError, StoreError};
use crate::store::PointerStore;
use crate::types::{AccountId, SubscriptionRecord};

/// Redis-backed pointer store.
///
/// Each record lives under its own key with a native `EX` expiry, so
/// Redis drops unvisited pointers on its own. The connection is opened on
/// first use and shared afterwards.
pub struct RedisPointerStore {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
    prefix: String,
}

impl RedisPointerStore {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            conn: OnceCell::new(),
            prefix: prefix.into(),
        }
    }

    /// Build from the store host/port; keys are namespaced by database and
    /// collection.
    pub fn from_config(config: &ContainerConfig) -> Result<Self, ConfigError> {
        let url = format!("redis://{}:{}/", config.store_host, config.store_port);
        let client = redis::Client::open(url.as_str())
            .map_err(|err| ConfigError::InvalidStoreAddress(err.to_string()))?;
        Ok(Self::new(
            client,
            format!("{}:{}", config.store_database, config.collection),
        ))
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| self.client.get_multiplexed_tokio_connection())
            .await?;
        Ok(conn.clone())
    }

    /// Hex keeps account and user segments free of `:` and glob characters,
    /// so one account's prefix never matches another account's keys.
    fn account_prefix(&self, account_id: &AccountId) -> String {
        format!("{}:{}:", self.prefix, hex::encode(account_id.as_str()))
    }

    fn record_key(&self, record: &SubscriptionRecord) -> String {
        let user = match &record.user_id {
            Some(user_id) => format!("u{}", hex::encode(user_id.as_str())),
            None => "-".to_string(),
        };
        format!("{}{}:{}", self.account_prefix(&record.account_id), user, record.url)
    }
}

#[async_trait]
impl PointerStore for RedisPointerStore {
    async fn upsert(&self, record: &SubscriptionRecord, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(record)?;
        let secs = ttl.as_secs().max(1) as usize;
        conn.set_ex::<_, _, ()>(self.record_key(record), payload, secs).await?;
        Ok(())
    }

    async fn delete(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.record_key(record)).await?;
        Ok(())
    }

    async fn list_for_account(&self, account_id: &AccountId) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", self.account_prefix(account_id));

        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            // Keys can expire between SCAN and GET.
            let value: Option<String> = conn.get(&key).await?;
            let record = value.and_then(|v| serde_json::from_str::<SubscriptionRecord>(&v).ok());
            if let Some(record) = record.filter(|r| &r.account_id == account_id) {
                records.push(record);
            }
        }
        Ok(records)
    }
}
