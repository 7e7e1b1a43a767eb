//! EventLog / AlertLog - Bounded Event Recording (Ring Buffer)
//!
//! ## Responsibilities
//!
//! - Store committed events/alerts in insertion order
//! - Evict oldest entries when capacity is exceeded
//! - Serve concurrent appenders (pipeline workers) and readers/resetters
//!   (dashboard queries) without lost updates

use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::models::{Alert, Event};

/// Default capacity for each log
pub const DEFAULT_CAPACITY: usize = 200;

/// Bounded insertion-ordered store
pub struct BoundedLog<T: Clone> {
    entries: RwLock<VecDeque<T>>,
    capacity: usize,
}

/// Committed security events, oldest-first internally
pub type EventLog = BoundedLog<Event>;

/// Committed missing-person alerts
pub type AlertLog = BoundedLog<Alert>;

impl<T: Clone> BoundedLog<T> {
    /// Create a log with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append at the tail, evicting from the head past capacity
    pub async fn append(&self, entry: T) {
        let mut entries = self.entries.write().await;
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Last-added `n` entries, most-recent-first
    pub async fn recent(&self, n: usize) -> Vec<T> {
        let entries = self.entries.read().await;
        entries.iter().rev().take(n).cloned().collect()
    }

    /// All entries, most-recent-first
    pub async fn all(&self) -> Vec<T> {
        let entries = self.entries.read().await;
        entries.iter().rev().cloned().collect()
    }

    /// Clear all entries, returning the prior count
    pub async fn reset(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }

    /// Current number of entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T: Clone> Default for BoundedLog<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_append_and_recent_order() {
        let log: BoundedLog<u32> = BoundedLog::new(10);
        for i in 0..5 {
            log.append(i).await;
        }
        assert_eq!(log.recent(3).await, vec![4, 3, 2]);
        assert_eq!(log.len().await, 5);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_first() {
        let log: BoundedLog<u32> = BoundedLog::new(3);
        for i in 0..5 {
            log.append(i).await;
        }
        assert_eq!(log.len().await, 3);
        // 0 and 1 evicted, remaining order preserved
        assert_eq!(log.all().await, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn test_reset_returns_prior_count() {
        let log: BoundedLog<u32> = BoundedLog::new(10);
        log.append(1).await;
        log.append(2).await;
        assert_eq!(log.reset().await, 2);
        assert!(log.is_empty().await);
        assert_eq!(log.reset().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_appenders_lose_nothing() {
        let log: Arc<BoundedLog<u64>> = Arc::new(BoundedLog::new(1000));
        let mut handles = Vec::new();
        for t in 0..10u64 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50u64 {
                    log.append(t * 100 + i).await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(log.len().await, 500);
    }
}
