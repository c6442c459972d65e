//! Confirmation registry.
//!
//! Tracks the (email, task, round, nonce) keys of every accepted task so
//! a later inbound confirmation can be correlated. Keys live for the
//! process lifetime and are never consumed: a re-delivered confirmation
//! for the same key matches again. Restart loses correlation state.

use pagesmith_common::PendingKey;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Concurrency-safe set of pending task keys.
///
/// Insertions come from task handling and lookups from confirmation
/// handling, concurrently; the RwLock keeps both without lost updates.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationRegistry {
    inner: Arc<RwLock<HashSet<PendingKey>>>,
}

impl ConfirmationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key at request-receipt time. Re-recording the same key
    /// (round re-delivery) is a no-op.
    pub async fn record(&self, key: PendingKey) {
        self.inner.write().await.insert(key);
    }

    /// Whether a confirmation key matches a previously accepted task.
    pub async fn lookup(&self, key: &PendingKey) -> bool {
        self.inner.read().await.contains(key)
    }

    /// Number of recorded keys (status reporting).
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recorded_key_is_found() {
        let registry = ConfirmationRegistry::new();
        let key = PendingKey::new("a@b.c", "task", 1, "n1");
        registry.record(key.clone()).await;
        assert!(registry.lookup(&key).await);
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let registry = ConfirmationRegistry::new();
        let key = PendingKey::new("a@b.c", "task", 1, "n1");
        assert!(!registry.lookup(&key).await);
    }

    #[tokio::test]
    async fn same_key_matches_on_repeat_lookup() {
        let registry = ConfirmationRegistry::new();
        let key = PendingKey::new("a@b.c", "task", 1, "n1");
        registry.record(key.clone()).await;
        assert!(registry.lookup(&key).await);
        // Keys are never consumed; a second delayed confirmation matches.
        assert!(registry.lookup(&key).await);
    }

    #[tokio::test]
    async fn rounds_are_distinct_keys() {
        let registry = ConfirmationRegistry::new();
        registry.record(PendingKey::new("a@b.c", "task", 1, "n1")).await;
        assert!(!registry.lookup(&PendingKey::new("a@b.c", "task", 2, "n1")).await);
    }

    #[tokio::test]
    async fn concurrent_record_and_lookup() {
        let registry = ConfirmationRegistry::new();
        let mut handles = Vec::new();
        for i in 0..32 {
            let reg = registry.clone();
            handles.push(tokio::spawn(async move {
                reg.record(PendingKey::new("a@b.c", "task", i, format!("n{i}")))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.len().await, 32);
    }
}
