use std::time::Duration;
use thiserror::Error;

/// All the ways a harvest can go wrong
///
/// "No data" outcomes (zero matches, missing README, an error status from
/// GitHub) are not in here - those come back as empty values.
#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub unreachable: {0}")]
    Api(#[from] repoharvest_api::GitHubError),

    #[error("Storage error: {0}")]
    Storage(#[from] repoharvest_store::StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("Unsupported README encoding '{encoding}' for {full_name}")]
    UnsupportedEncoding { full_name: String, encoding: String },

    #[error("Search did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
