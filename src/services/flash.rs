//! Flash messages
//!
//! A flash message is a status line ("The post was successfully deleted.")
//! shown on the next page the user renders, then discarded. Messages are
//! kept in a moka cache keyed by user id, so an unread message also
//! expires on its own after the configured TTL.

use moka::future::Cache;
use std::time::Duration;

/// Maximum number of users with a pending message
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// One-shot status messages per user
#[derive(Clone)]
pub struct FlashStore {
    cache: Cache<i64, String>,
}

impl std::fmt::Debug for FlashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl FlashStore {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(DEFAULT_MAX_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Set the user's pending message, replacing any earlier one
    pub async fn flash(&self, user_id: i64, message: impl Into<String>) {
        self.cache.insert(user_id, message.into()).await;
    }

    /// Take the user's pending message. A second call returns `None`.
    pub async fn take(&self, user_id: i64) -> Option<String> {
        // `get` honours the TTL; `remove` makes the hand-out single-shot
        self.cache.get(&user_id).await?;
        self.cache.remove(&user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_take_is_one_shot() {
        let store = FlashStore::new(Duration::from_secs(60));

        store.flash(1, "Saved.").await;

        assert_eq!(store.take(1).await.as_deref(), Some("Saved."));
        assert!(store.take(1).await.is_none());
    }

    #[tokio::test]
    async fn test_messages_are_per_user() {
        let store = FlashStore::new(Duration::from_secs(60));

        store.flash(1, "for one").await;
        store.flash(2, "for two").await;

        assert_eq!(store.take(2).await.as_deref(), Some("for two"));
        assert_eq!(store.take(1).await.as_deref(), Some("for one"));
    }

    #[tokio::test]
    async fn test_latest_message_wins() {
        let store = FlashStore::new(Duration::from_secs(60));

        store.flash(1, "first").await;
        store.flash(1, "second").await;

        assert_eq!(store.take(1).await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_message_expires() {
        let store = FlashStore::new(Duration::from_millis(20));

        store.flash(1, "stale").await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.take(1).await.is_none());
    }
}
