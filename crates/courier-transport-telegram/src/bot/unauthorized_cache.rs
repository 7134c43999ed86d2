//! Cooldown for "Access denied" replies
//!
//! Users outside the allow-list get one denial per cooldown window; further
//! attempts inside the window are dropped silently and only counted.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Log every n-th silenced attempt.
const SILENCED_LOG_EVERY: u64 = 100;

/// Tracks which users were recently told they are not allowed in.
#[derive(Clone)]
pub struct UnauthorizedCache {
    denied: Cache<i64, ()>,
    silenced: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Create a cache whose entries expire after `cooldown_secs`.
    ///
    /// # Examples
    ///
    /// ```
    /// use courier_transport_telegram::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(1200, 10_000);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let denied = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(cooldown_secs))
            .build();
        Self {
            denied,
            silenced: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether `user_id` should get a denial now.
    pub async fn should_send(&self, user_id: i64) -> bool {
        if !self.denied.contains_key(&user_id) {
            return true;
        }
        let count = self.silenced.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(SILENCED_LOG_EVERY) {
            debug!(count, user_id, "Silenced unauthorized attempts");
        }
        false
    }

    /// Start the cooldown for `user_id` after a denial was delivered.
    pub async fn mark_sent(&self, user_id: i64) {
        self.denied.insert(user_id, ()).await;
    }

    /// Attempts dropped inside a cooldown window so far.
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced.load(Ordering::Relaxed)
    }
}
