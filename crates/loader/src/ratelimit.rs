//! Rate limiters injected into the batch driver and the delete loop.
//!
//! Limiting is a courtesy towards the store's API quota, not a correctness
//! mechanism: a limiter only ever delays, it never rejects.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Something that decides how long to wait before the next unit of work.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until the next unit of work may start.
    async fn pause(&self);
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl RateLimiter for NoDelay {
    async fn pause(&self) {}
}

/// Sleeps for a fixed duration on every call.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl FixedDelay {
    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }
}

#[async_trait]
impl RateLimiter for FixedDelay {
    async fn pause(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Allows bursts of up to `capacity` calls, refilling one token every
/// `refill_every`. Callers beyond the burst wait for the next token.
pub struct TokenBucket {
    capacity: u32,
    refill_every: Duration,
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    /// A bucket that starts full.
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_every,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn pause(&self) {
        let mut bucket = self.bucket.lock().await;
        if self.refill_every.is_zero() {
            return;
        }

        let elapsed = bucket.last_refill.elapsed();
        let earned = (elapsed.as_nanos() / self.refill_every.as_nanos()) as u32;
        if earned > 0 {
            bucket.tokens = bucket.tokens.saturating_add(earned).min(self.capacity);
            bucket.last_refill += self.refill_every * earned;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            return;
        }

        // Empty: wait for the next token and spend it immediately.
        let next = bucket.last_refill + self.refill_every;
        tokio::time::sleep_until(next).await;
        bucket.last_refill = next;
    }
}
