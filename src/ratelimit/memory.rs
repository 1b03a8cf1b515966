use super::{CounterStore, RateLimitDecision, RateLimitError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Admits between sweeps of fully expired keys.
const SWEEP_EVERY: u64 = 256;

#[derive(Default)]
struct Windows {
    logs: HashMap<String, VecDeque<i64>>,
    admits_since_sweep: u64,
}

impl Windows {
    fn sweep(&mut self, window_ms: i64, now_ms: i64) {
        self.logs
            .retain(|_, log| log.back().is_some_and(|&t| t + window_ms > now_ms));
        self.admits_since_sweep = 0;
    }
}

/// In-process request log. Correct for one instance only: counts are not
/// shared across replicas.
#[derive(Default)]
pub struct MemoryCounterStore {
    windows: Mutex<Windows>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.logs.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn admit(
        &self,
        key: &str,
        limit: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let mut windows = self.windows.lock().await;
        windows.admits_since_sweep += 1;
        if windows.admits_since_sweep >= SWEEP_EVERY {
            windows.sweep(window_ms, now_ms);
        }

        let log = windows.logs.entry(key.to_string()).or_default();
        log.retain(|&t| t + window_ms > now_ms);

        let allowed = (log.len() as u32) < limit;
        if allowed {
            log.push_back(now_ms);
        }

        let count = log.len() as u32;
        let reset_at_ms = log.iter().min().map_or(now_ms + window_ms, |&t| t + window_ms);
        if log.is_empty() {
            windows.logs.remove(key);
        }

        Ok(RateLimitDecision {
            allowed,
            limit,
            remaining: limit.saturating_sub(count),
            reset_at_ms,
        })
    }
}
