// Core logic: criteria, query rendering, partitioned search, README back-fill
pub mod config;
pub mod error;
pub mod harvest;
pub mod models;
pub mod progress;
pub mod query;
pub mod readme;
pub mod search;

pub use config::Config;
pub use error::Error;
pub use harvest::{HarvestReport, Harvester};
pub use models::{RepositoryRecord, ResultSet, SearchCriteria, SearchStats};
pub use progress::{ProgressCallback, SearchProgress};
pub use query::QueryBuilder;
pub use readme::ReadmeFetcher;
pub use search::{RepositorySearchEngine, RESULT_WINDOW};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
