//! Shared sliding-window log in Redis.
//!
//! Each key is a sorted set of request members scored by arrival time in
//! epoch milliseconds. Expiry, counting and insertion run inside one Lua
//! script, so concurrent callers for the same key cannot both take the
//! last slot.

use super::{CounterStore, RateLimitDecision, RateLimitError};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, Script};
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
local allowed = 0
if count < limit then
  redis.call('ZADD', key, now, member)
  count = count + 1
  allowed = 1
end
redis.call('PEXPIRE', key, window)

local reset = now + window
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  reset = tonumber(oldest[2]) + window
end
return {allowed, count, reset}
"#;

pub struct RedisCounterStore {
    connection: ConnectionManager,
    script: Script,
    timeout: Duration,
}

impl RedisCounterStore {
    pub async fn connect(redis_url: &str, op_timeout: Duration) -> Result<Self, RateLimitError> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);

        let client = Client::open(redis_url).map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        let connection = timeout(op_timeout * 4, client.get_connection_manager_with_config(config))
            .await
            .map_err(|_| RateLimitError::Unavailable("redis connect timeout".to_string()))?
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;

        Ok(Self {
            connection,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
            timeout: op_timeout,
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn admit(
        &self,
        key: &str,
        limit: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let mut conn = self.connection.clone();
        let member = format!("{now_ms}:{}", Uuid::new_v4());

        let mut invocation = self.script.key(key);
        invocation.arg(now_ms).arg(window_ms).arg(limit).arg(member);

        let reply: (i64, i64, i64) = timeout(self.timeout, invocation.invoke_async(&mut conn))
            .await
            .map_err(|_| {
                warn!(key, "redis admit timed out");
                RateLimitError::Unavailable("redis timeout".to_string())
            })?
            .map_err(|e| {
                warn!(key, error = %e, "redis admit failed");
                RateLimitError::Unavailable(e.to_string())
            })?;

        let (allowed, count, reset_at_ms) = reply;
        Ok(RateLimitDecision {
            allowed: allowed == 1,
            limit,
            remaining: limit.saturating_sub(count.max(0) as u32),
            reset_at_ms,
        })
    }
}
