// Quota governor - turns GitHub's rate-limit headers into a wait decision
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::debug;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Below this many remaining calls we stop and wait for the window to reset
pub const DEFAULT_THRESHOLD: u32 = 5;

/// What the caller should do before making its next request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Proceed,
    /// Pause for this long. May be zero when the reset time is unknown.
    Wait(Duration),
}

impl Backoff {
    pub fn should_wait(&self) -> bool {
        matches!(self, Backoff::Wait(_))
    }

    pub fn duration(&self) -> Duration {
        match self {
            Backoff::Proceed => Duration::ZERO,
            Backoff::Wait(d) => *d,
        }
    }
}

/// Reads `x-ratelimit-remaining` / `x-ratelimit-reset` off a response
///
/// Stateless: every decision comes from the headers of the response just
/// received, so one governor can sit behind a shared client.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitGovernor {
    threshold: u32,
}

impl Default for RateLimitGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl RateLimitGovernor {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn should_wait(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Backoff {
        // No header (or garbage in it) means no backoff. Best effort only.
        let Some(remaining) = header_number::<u64>(headers, REMAINING_HEADER) else {
            return Backoff::Proceed;
        };

        if remaining >= u64::from(self.threshold) {
            return Backoff::Proceed;
        }

        let wait = match header_number::<i64>(headers, RESET_HEADER) {
            Some(reset) => {
                let secs = reset - now.timestamp();
                if secs > 0 {
                    Duration::from_secs(secs as u64)
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        };

        debug!(remaining, wait_secs = wait.as_secs(), "Rate limit nearly exhausted");
        Backoff::Wait(wait)
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
