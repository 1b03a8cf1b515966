//! Sliding-window admission control keyed by user identity.
//!
//! The limiter itself is stateless; the admitted-request log lives in a
//! [`CounterStore`] that performs the check-and-record step atomically.
//! `redis` is the shared store for real deployments, `memory` is for a
//! single process and for tests.

pub mod limiter;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

pub use limiter::RateLimiter;
pub use memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

/// Result of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the oldest counted request leaves the window.
    #[serde(rename = "resetAt")]
    pub reset_at_ms: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate-limit store unavailable: {0}")]
    Unavailable(String),
}

/// What to do when the counter store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    FailClosed,
    FailOpen,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically drops entries older than `window_ms`, then records one
    /// request at `now_ms` if fewer than `limit` remain. A refused call
    /// records nothing.
    async fn admit(
        &self,
        key: &str,
        limit: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<RateLimitDecision, RateLimitError>;
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for window tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn starting_at(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
