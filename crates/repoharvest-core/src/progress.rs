//! Progress events emitted while a search runs.
//!
//! The engine never prints. Anything a UI wants to show comes through a
//! [`ProgressCallback`]; everything is also logged through `tracing`.

use chrono::{DateTime, Utc};

/// Something that happened during a search
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SearchProgress {
    /// A count probe came back for a partition.
    CountProbed {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        total_count: u64,
    },

    /// A partition was over the result window and got bisected.
    PartitionSplit {
        from: DateTime<Utc>,
        mid: DateTime<Utc>,
        to: DateTime<Utc>,
        total_count: u64,
    },

    /// A partition was over the result window but too narrow to split.
    /// Only the first 1000 of its matches are reachable.
    WindowSaturated {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        total_count: u64,
    },

    /// One page of a direct partition was fetched.
    PageFetched {
        page: u32,
        count: usize,
        collected: usize,
        expected: u64,
    },

    /// A call returned no usable data (error status or malformed body).
    CallUnavailable { path: String },

    /// The whole search is done.
    SearchComplete { total: usize },
}

/// Type alias for the progress callback.
pub type ProgressCallback = Box<dyn Fn(SearchProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
pub fn emit(callback: Option<&ProgressCallback>, event: SearchProgress) {
    if let Some(cb) = callback {
        cb(event);
    }
}
