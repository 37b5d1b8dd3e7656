//! In-memory counter store for tests and single-instance deployments.
//!
//! Counters live in a process-local map; expiry is checked lazily on access
//! and expired entries are swept on writes. Not shared across processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::ports::{CounterStore, CounterStoreError};

/// Process-local [`CounterStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryCounterStore {
    counters: Arc<RwLock<HashMap<String, CounterEntry>>>,
}

#[derive(Debug, Clone)]
struct CounterEntry {
    value: u64,
    expires_at: Instant,
}

impl CounterEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counters (test helper).
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.counters
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment_and_get(&self, key: &str, ttl_secs: u64) -> Result<u64, CounterStoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;
        counters.retain(|_, entry| entry.is_live(now));

        let entry = counters.entry(key.to_string()).or_insert_with(|| CounterEntry {
            value: 0,
            expires_at: now + Duration::from_secs(ttl_secs),
        });
        entry.value += 1;
        Ok(entry.value)
    }

    async fn get(&self, key: &str) -> Result<u64, CounterStoreError> {
        let now = Instant::now();
        let counters = self.counters.read().await;
        Ok(counters
            .get(key)
            .filter(|e| e.is_live(now))
            .map_or(0, |e| e.value))
    }

    async fn decrement(&self, key: &str) -> Result<(), CounterStoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;
        if let Some(entry) = counters.get_mut(key).filter(|e| e.is_live(now)) {
            entry.value = entry.value.saturating_sub(1);
        }
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CounterStoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;
        let mut removed = 0;
        counters.retain(|key, entry| {
            if !key.starts_with(prefix) {
                return true;
            }
            if entry.is_live(now) {
                removed += 1;
            }
            false
        });
        Ok(removed)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>, CounterStoreError> {
        let now = Instant::now();
        let counters = self.counters.read().await;
        let mut found: Vec<(String, u64)> = counters
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .map(|(key, entry)| (key.clone(), entry.value))
            .collect();
        found.sort();
        Ok(found)
    }
}
