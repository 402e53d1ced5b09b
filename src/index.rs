use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{AccountId, CallbackHandle, IndexStats, UserId};

/// Index shared by the subscription manager and the dispatcher.
pub type SharedIndex = Arc<Mutex<CallbackIndex>>;

/// In-memory buckets of live callbacks keyed by account and by user.
///
/// A handle registered with a user lives in exactly one account bucket and
/// one user bucket; without a user it only lives in the account bucket.
/// Buckets keep insertion order and are never pruned once created.
#[derive(Debug, Default)]
pub struct CallbackIndex {
    by_account: HashMap<AccountId, Vec<CallbackHandle>>,
    by_user: HashMap<UserId, Vec<CallbackHandle>>,
}

impl CallbackIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedIndex {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Append `callback` to the account bucket and, if given, the user bucket.
    pub fn insert(&mut self, account_id: &AccountId, user_id: Option<&UserId>, callback: CallbackHandle) {
        if let Some(user_id) = user_id {
            self.by_user
                .entry(user_id.clone())
                .or_default()
                .push(callback.clone());
        }
        self.by_account
            .entry(account_id.clone())
            .or_default()
            .push(callback);
    }

    /// Remove the first occurrence of `callback` from the account bucket and
    /// from the user bucket when one exists.
    ///
    /// Returns `false` without touching anything when the account has no
    /// bucket. A callback missing from either bucket is skipped silently.
    pub fn remove(&mut self, account_id: &AccountId, user_id: Option<&UserId>, callback: &CallbackHandle) -> bool {
        let Some(bucket) = self.by_account.get_mut(account_id) else {
            return false;
        };
        remove_first(bucket, callback);

        if let Some(bucket) = user_id.and_then(|id| self.by_user.get_mut(id)) {
            remove_first(bucket, callback);
        }
        true
    }

    pub fn account_bucket(&self, account_id: &AccountId) -> Option<&[CallbackHandle]> {
        self.by_account.get(account_id).map(Vec::as_slice)
    }

    pub fn user_bucket(&self, user_id: &UserId) -> Option<&[CallbackHandle]> {
        self.by_user.get(user_id).map(Vec::as_slice)
    }

    pub fn account_count(&self) -> usize {
        self.by_account.len()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            accounts: self.account_count(),
            users: self.user_count(),
        }
    }
}

fn remove_first(bucket: &mut Vec<CallbackHandle>, callback: &CallbackHandle) {
    if let Some(pos) = bucket.iter().position(|c| c == callback) {
        bucket.remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> CallbackHandle {
        CallbackHandle::new(|_| {})
    }

    #[test]
    fn insert_with_user_fills_both_buckets() {
        let mut index = CallbackIndex::new();
        let cb = noop();
        index.insert(&"a".into(), Some(&"u".into()), cb.clone());

        assert_eq!(index.account_bucket(&"a".into()), Some(&[cb.clone()][..]));
        assert_eq!(index.user_bucket(&"u".into()), Some(&[cb][..]));
    }

    #[test]
    fn insert_without_user_only_fills_account_bucket() {
        let mut index = CallbackIndex::new();
        index.insert(&"a".into(), None, noop());
        assert_eq!(index.stats(), IndexStats { accounts: 1, users: 0 });
    }

    #[test]
    fn remove_takes_first_match_only() {
        let mut index = CallbackIndex::new();
        let account: AccountId = "a".into();
        let cb = noop();
        let other = noop();
        index.insert(&account, None, cb.clone());
        index.insert(&account, None, other.clone());
        index.insert(&account, None, cb.clone());

        assert!(index.remove(&account, None, &cb));
        assert_eq!(index.account_bucket(&account), Some(&[other, cb][..]));
    }

    #[test]
    fn remove_unknown_account_is_noop() {
        let mut index = CallbackIndex::new();
        assert!(!index.remove(&"missing".into(), None, &noop()));
        assert_eq!(index.account_count(), 0);
    }

    #[test]
    fn emptied_buckets_are_kept() {
        let mut index = CallbackIndex::new();
        let cb = noop();
        index.insert(&"a".into(), Some(&"u".into()), cb.clone());
        index.remove(&"a".into(), Some(&"u".into()), &cb);

        assert_eq!(index.account_bucket(&"a".into()), Some(&[][..]));
        assert_eq!(index.user_bucket(&"u".into()), Some(&[][..]));
    }
}
