//! Pending action labels
//!
//! Remembers what a requester last asked for between dispatch and the
//! asynchronous START from the helper. Entries expire on their own so a run
//! that never announces itself does not leave a label behind.

use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

use crate::task_registry::RequesterId;

/// Requester → label of the last dispatched action.
#[derive(Clone)]
pub struct PendingLabels {
    cache: Cache<RequesterId, String>,
}

impl PendingLabels {
    /// Create a label store whose entries live for `ttl_secs`.
    ///
    /// # Examples
    ///
    /// ```
    /// use courier_runtime::PendingLabels;
    ///
    /// let labels = PendingLabels::new(3600, 10_000);
    /// ```
    #[must_use]
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { cache }
    }

    /// Record the label of a freshly dispatched action.
    pub async fn set(&self, requester: RequesterId, label: impl Into<String>) {
        let label = label.into();
        debug!(requester = %requester, label = %label, "Pending label set");
        self.cache.insert(requester, label).await;
    }

    /// Current label, if any.
    pub async fn get(&self, requester: RequesterId) -> Option<String> {
        self.cache.get(&requester).await
    }

    /// Forget the label of `requester`.
    pub async fn clear(&self, requester: RequesterId) {
        self.cache.invalidate(&requester).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_clear() {
        let labels = PendingLabels::new(60, 100);
        let r = RequesterId(1);

        assert_eq!(labels.get(r).await, None);
        labels.set(r, "Highlights").await;
        assert_eq!(labels.get(r).await.as_deref(), Some("Highlights"));

        labels.set(r, "Goals").await;
        assert_eq!(labels.get(r).await.as_deref(), Some("Goals"));

        labels.clear(r).await;
        assert_eq!(labels.get(r).await, None);
    }

    #[tokio::test]
    async fn test_requesters_are_independent() {
        let labels = PendingLabels::new(60, 100);
        labels.set(RequesterId(1), "A").await;
        labels.set(RequesterId(2), "B").await;
        labels.clear(RequesterId(1)).await;
        assert_eq!(labels.get(RequesterId(2)).await.as_deref(), Some("B"));
    }
}
