use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rate limit reached for {key} ({attempts} attempts)")]
pub struct RateLimitExceeded {
    pub key: String,
    pub attempts: u32,
}

pub fn signup_attempts_key(client_ip: &str) -> String {
    format!("signup_attempts_{}", client_ip)
}

/// Keyed attempt counter with a cap and an expiry measured from the last write.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Current count for `key`; zero once the entry has expired.
    async fn attempts(&self, key: &str) -> u32;

    /// Atomically checks the cap and counts one attempt.
    ///
    /// Fails without writing when the cap is already reached. On success the
    /// entry expires one window after this call.
    async fn try_acquire(&self, key: &str) -> Result<u32, RateLimitExceeded>;

    /// Returns an attempt taken by [`RateLimiter::try_acquire`] that did not
    /// lead to a completed action. Does not extend the expiry.
    async fn release(&self, key: &str);
}

struct CounterEntry {
    count: u32,
    expires_at: DateTime<Utc>,
}

/// Expired entries are swept roughly once per this many acquisitions.
const EVICTION_INTERVAL: u64 = 100;

pub struct InMemoryRateLimiter {
    storage: Mutex<HashMap<String, CounterEntry>>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    window: Duration,
    ops_counter: AtomicU64,
}

impl InMemoryRateLimiter {
    pub fn new(clock: Arc<dyn Clock>, max_attempts: u32, window: Duration) -> Self {
        Self {
            storage: Mutex::new(HashMap::new()),
            clock,
            max_attempts,
            window,
            ops_counter: AtomicU64::new(0),
        }
    }

    fn should_evict(&self) -> bool {
        self.ops_counter.fetch_add(1, Ordering::Relaxed) % EVICTION_INTERVAL == 0
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn attempts(&self, key: &str) -> u32 {
        let now = self.clock.now();
        let storage = self.storage.lock().await;
        match storage.get(key) {
            Some(entry) if entry.expires_at > now => entry.count,
            _ => 0,
        }
    }

    async fn try_acquire(&self, key: &str) -> Result<u32, RateLimitExceeded> {
        let now = self.clock.now();
        let mut storage = self.storage.lock().await;

        if self.should_evict() {
            storage.retain(|_, entry| entry.expires_at > now);
        }

        let current = match storage.get(key) {
            Some(entry) if entry.expires_at > now => entry.count,
            _ => 0,
        };

        if current >= self.max_attempts {
            return Err(RateLimitExceeded {
                key: key.to_string(),
                attempts: current,
            });
        }

        let count = current + 1;
        storage.insert(
            key.to_string(),
            CounterEntry {
                count,
                expires_at: now + self.window,
            },
        );

        Ok(count)
    }

    async fn release(&self, key: &str) {
        let now = self.clock.now();
        let mut storage = self.storage.lock().await;

        let remove = match storage.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.count = entry.count.saturating_sub(1);
                entry.count == 0
            }
            Some(_) => true,
            None => false,
        };

        if remove {
            storage.remove(key);
        }
    }
}
