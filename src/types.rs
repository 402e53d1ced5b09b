use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Notification body handed to every matching callback.
///
/// The core treats the payload as opaque JSON.
pub type Payload = serde_json::Value;

/// Identifier of the account a subscription belongs to.
///
/// This is a strongly-typed wrapper to avoid accidental mixing
/// of account IDs with user IDs or URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

/// Identifier of the user a subscription is narrowed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A registered unit of behavior invoked with each matching payload.
///
/// Handles are compared by identity: two clones of the same handle are
/// equal, two handles wrapping identical closures are not. Keep a clone of
/// the handle passed to `register` in order to `unregister` it later.
#[derive(Clone)]
pub struct CallbackHandle(Arc<dyn Fn(Payload) + Send + Sync>);

impl CallbackHandle {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Payload) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Run the callback on the current thread.
    pub fn invoke(&self, payload: Payload) {
        (self.0)(payload)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for CallbackHandle {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for CallbackHandle {}

impl fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallbackHandle").field(&self.addr()).finish()
    }
}

/// Durable pointer recording that an account (and optionally a user)
/// has a webhook callback for `url`.
///
/// The record is both the natural key and the full persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub account_id: AccountId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl SubscriptionRecord {
    pub fn new(account_id: AccountId, url: impl Into<String>, user_id: Option<UserId>) -> Self {
        Self {
            account_id,
            url: url.into(),
            user_id,
        }
    }
}

/// Bucket counts of a callback index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub accounts: usize,
    pub users: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_equality_is_identity() {
        let a = CallbackHandle::new(|_| {});
        let b = CallbackHandle::new(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn record_serializes_without_absent_user() {
        let record = SubscriptionRecord::new("acct1".into(), "http://x/hook", None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"accountId": "acct1", "url": "http://x/hook"}));

        let with_user = SubscriptionRecord::new("acct1".into(), "http://x/hook", Some("u1".into()));
        let json = serde_json::to_value(&with_user).unwrap();
        assert_eq!(json["userId"], "u1");
    }
}
