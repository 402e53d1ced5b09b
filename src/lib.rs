//! In-process webhook subscriptions with durable pointers.
//!
//! Callers register a callback for an account (optionally narrowed to a
//! user) and a target URL. The callback goes into an in-memory index and a
//! pointer record with a time-to-live is written to a durable store, so
//! other processes can discover who is listening. Notifications are fanned
//! out to every matching callback through a scheduler without blocking the
//! caller.
//!
//! ## Guarantees
//! - Registration takes effect locally before `register` returns
//! - Store failures never undo or block local registration
//! - `notify` never waits for a callback to run
//!
//! ## Non-Guarantees
//! - Exactly-once delivery
//! - Retries of failed callbacks
//! - Ordering across accounts
//!
//! The index is not persisted; a restarted process is expected to
//! register again.

mod config;
mod container;
mod dispatcher;
mod error;
mod index;
mod manager;
mod scheduler;
mod signing;
mod store;
mod telemetry;
mod types;

#[cfg(feature = "redis")]
mod store_redis;

#[cfg(feature = "postgres")]
mod store_postgres;

#[cfg(feature = "http")]
pub mod handler;

pub use config::{ContainerConfig, RuntimeKind};
pub use container::WebhookContainer;
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, StoreError};
pub use index::{CallbackIndex, SharedIndex};
pub use manager::SubscriptionManager;
pub use scheduler::{Job, ManualScheduler, Scheduler, TokioScheduler};
pub use signing::{
    compute_signature,
    is_timestamp_fresh,
    parse_signature_headers,
    verify_signature,
    ParsedSignature,
    PostbackVerifier,
    VerificationError,
    DEFAULT_SIGNATURE_HEADER,
    DEFAULT_TIMESTAMP_HEADER,
};
pub use store::{InMemoryPointerStore, PersistSignal, PointerStore, PointerStoreClient};
pub use types::{AccountId, CallbackHandle, IndexStats, Payload, SubscriptionRecord, UserId};

#[cfg(feature = "redis")]
pub use store_redis::RedisPointerStore;

#[cfg(feature = "postgres")]
pub use store_postgres::PostgresPointerStore;
