// Time source for the rate-limit pause
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Where "now" comes from, and how we wait
///
/// The gateway never calls `Utc::now()` or `tokio::time::sleep` directly so
/// tests can drive the backoff math with a fake clock and no real sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time and tokio's timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
