use super::{Clock, CounterStore, FailurePolicy, RateLimitDecision, RateLimitError, SystemClock};
use crate::config::RateLimitConfig;
use crate::identity::UserId;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    limit: u32,
    window_ms: i64,
    key_prefix: String,
    policy: FailurePolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            limit: config.limit,
            window_ms: config.window_secs as i64 * 1000,
            key_prefix: config.key_prefix.clone(),
            policy: config.failure_policy,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn key_for(&self, user: &UserId) -> String {
        format!("{}:ratelimit:{}", self.key_prefix, user)
    }

    /// One admission attempt for `user`. A refusal is `Ok` with
    /// `allowed == false`; `Err` only when the store failed and the policy
    /// is fail-closed.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn admit(&self, user: &UserId) -> Result<RateLimitDecision, RateLimitError> {
        let now_ms = self.clock.now_ms();
        let key = self.key_for(user);

        match self
            .store
            .admit(&key, self.limit, self.window_ms, now_ms)
            .await
        {
            Ok(decision) => {
                debug!(
                    allowed = decision.allowed,
                    remaining = decision.remaining,
                    reset_at_ms = decision.reset_at_ms,
                    "rate limit checked"
                );
                Ok(decision)
            }
            Err(err) => match self.policy {
                FailurePolicy::FailClosed => {
                    warn!(error = %err, "rate limit store down, refusing request");
                    Err(err)
                }
                FailurePolicy::FailOpen => {
                    warn!(error = %err, "rate limit store down, admitting without counting");
                    Ok(RateLimitDecision {
                        allowed: true,
                        limit: self.limit,
                        remaining: self.limit,
                        reset_at_ms: now_ms + self.window_ms,
                    })
                }
            },
        }
    }
}
