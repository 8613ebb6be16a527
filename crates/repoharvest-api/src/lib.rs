// GitHub API plumbing: transport, rate-limit governor, gateway
pub mod clock;
pub mod gateway;
pub mod github;
pub mod rate_limit;
pub mod transport;
pub mod types;

// Re-export common types
pub use clock::{Clock, SystemClock};
pub use gateway::ApiGateway;
pub use github::{GitHubClient, GitHubError};
pub use rate_limit::{Backoff, RateLimitGovernor};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{GitHubRepo, ReadmeResponse, SearchResponse};
