use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};

use crate::config::ContainerConfig;
use crate::error::StoreError;
use crate::store::PointerStore;
use crate::types::{AccountId, SubscriptionRecord, UserId};

/// Postgres-backed pointer store.
///
/// Postgres has no native row expiry: rows carry an `expires_at` epoch
/// second, reads skip expired rows and upserts prune them.
pub struct PostgresPointerStore {
    client: Client,
    table: String,
}

impl PostgresPointerStore {
    /// Wrap an existing client and make sure the pointer table exists.
    ///
    /// The table name is spliced into SQL, so it must be a plain
    /// identifier.
    pub async fn new(client: Client, table: impl Into<String>) -> Result<Self, StoreError> {
        let table = table.into();
        if !is_plain_identifier(&table) {
            return Err(StoreError::InvalidTableName(table));
        }

        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" (
                    account_id TEXT NOT NULL,
                    url TEXT NOT NULL,
                    has_user BOOLEAN NOT NULL,
                    user_id TEXT NOT NULL DEFAULT '',
                    expires_at BIGINT NOT NULL,
                    PRIMARY KEY (account_id, url, has_user, user_id)
                );
                CREATE INDEX IF NOT EXISTS \"{table}_expires_at\" ON \"{table}\" (expires_at);"
            ))
            .await?;

        Ok(Self { client, table })
    }

    /// Connect using the store host/port/database settings. The connection
    /// task is spawned on the current runtime and lives as long as the
    /// client.
    pub async fn connect(config: &ContainerConfig) -> Result<Self, StoreError> {
        let params = format!(
            "host={} port={} dbname={}",
            config.store_host, config.store_port, config.store_database
        );
        let (client, connection) = tokio_postgres::connect(&params, NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres pointer store connection closed");
            }
        });
        Self::new(client, config.collection.clone()).await
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `(has_user, user_id)` columns of a record. An empty user id stays
/// distinct from no user at all.
fn user_columns(record: &SubscriptionRecord) -> (bool, &str) {
    match &record.user_id {
        Some(user_id) => (true, user_id.as_str()),
        None => (false, ""),
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[async_trait]
impl PointerStore for PostgresPointerStore {
    async fn upsert(&self, record: &SubscriptionRecord, ttl: Duration) -> Result<(), StoreError> {
        let now = now_secs();
        let expires_at = now + ttl.as_secs() as i64;
        let (has_user, user_id) = user_columns(record);

        self.client
            .execute(
                &format!("DELETE FROM \"{}\" WHERE expires_at <= $1", self.table),
                &[&now],
            )
            .await?;

        self.client
            .execute(
                &format!(
                    "INSERT INTO \"{}\" (account_id, url, has_user, user_id, expires_at)
                     VALUES ($1, $2, $3, $4, $5)
                     ON CONFLICT (account_id, url, has_user, user_id)
                     DO UPDATE SET expires_at = EXCLUDED.expires_at",
                    self.table
                ),
                &[&record.account_id.0, &record.url, &has_user, &user_id, &expires_at],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        let (has_user, user_id) = user_columns(record);
        self.client
            .execute(
                &format!(
                    "DELETE FROM \"{}\"
                     WHERE account_id = $1 AND url = $2 AND has_user = $3 AND user_id = $4",
                    self.table
                ),
                &[&record.account_id.0, &record.url, &has_user, &user_id],
            )
            .await?;
        Ok(())
    }

    async fn list_for_account(&self, account_id: &AccountId) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let rows = self
            .client
            .query(
                &format!(
                    "SELECT url, has_user, user_id FROM \"{}\" WHERE account_id = $1 AND expires_at > $2",
                    self.table
                ),
                &[&account_id.0, &now_secs()],
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let url: String = row.try_get(0).ok()?;
                let has_user: bool = row.try_get(1).ok()?;
                let user: String = row.try_get(2).ok()?;
                let user_id = has_user.then(|| UserId(user));
                Some(SubscriptionRecord::new(account_id.clone(), url, user_id))
            })
            .collect())
    }
}
