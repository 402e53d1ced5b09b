use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Settings read once when a container is built.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Host of the pointer store.
    pub store_host: String,

    /// Port of the pointer store.
    pub store_port: u16,

    /// Database (or key namespace) holding pointer records.
    pub store_database: String,

    /// Collection / table / key prefix for pointer records.
    pub collection: String,

    /// Time-to-live applied to every upserted pointer record.
    #[serde(with = "ttl_secs")]
    pub pointer_ttl: Duration,

    /// Scheduler runtime variant. Only `tokio` is supported.
    pub runtime: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            store_host: "127.0.0.1".to_string(),
            store_port: 6379,
            store_database: "skyhooks".to_string(),
            collection: "webhooks".to_string(),
            pointer_ttl: Duration::from_secs(60 * 60),
            runtime: RuntimeKind::Tokio.as_str().to_string(),
        }
    }
}

impl ContainerConfig {
    pub fn with_store(mut self, host: impl Into<String>, port: u16) -> Self {
        self.store_host = host.into();
        self.store_port = port;
        self
    }

    pub fn with_store_database(mut self, database: impl Into<String>) -> Self {
        self.store_database = database.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_pointer_ttl(mut self, ttl: Duration) -> Self {
        self.pointer_ttl = ttl;
        self
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// Parse the configured runtime variant.
    pub fn runtime_kind(&self) -> Result<RuntimeKind, ConfigError> {
        self.runtime.parse()
    }
}

/// Scheduler runtimes a container can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Tokio,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Tokio => "tokio",
        }
    }
}

impl FromStr for RuntimeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tokio" => Ok(RuntimeKind::Tokio),
            _ => Err(ConfigError::UnsupportedRuntime(s.to_string())),
        }
    }
}

mod ttl_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
