use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::gateway::ApiGateway;
use crate::rate_limit::{Backoff, RateLimitGovernor};
use crate::transport::{HttpTransport, ReqwestTransport, DEFAULT_TIMEOUT_SECS};

pub const GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Token contains characters that cannot be sent in a header")]
    InvalidToken,
}

pub type Result<T> = std::result::Result<T, GitHubError>;

/// GitHub REST client: one GET per call, rate-limit aware
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    governor: RateLimitGovernor,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(
            token,
            GITHUB_API_BASE.to_string(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// For GitHub Enterprise or a local stand-in
    pub fn with_base_url(token: &str, base_url: String, timeout: Duration) -> Result<Self> {
        let transport = ReqwestTransport::new(token, timeout)?;
        Ok(Self::from_parts(
            Arc::new(transport),
            Arc::new(SystemClock),
            base_url,
        ))
    }

    /// Assemble a client from its seams. Tests use this with fakes.
    pub fn from_parts(
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        base_url: String,
    ) -> Self {
        Self {
            transport,
            clock,
            governor: RateLimitGovernor::default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_governor(mut self, governor: RateLimitGovernor) -> Self {
        self.governor = governor;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ApiGateway for GitHubClient {
    async fn call(&self, path_and_query: &str) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("GET {}", url);

        let response = self.transport.get(&url).await?;

        if !response.status.is_success() {
            warn!("GitHub returned {} for {}", response.status, path_and_query);
            return Ok(None);
        }

        // Back off before handing the body over, so nothing upstream has to
        // know the rate limit exists
        if let Backoff::Wait(wait) = self.governor.should_wait(&response.headers, self.clock.now()) {
            info!("Rate limit almost used up, pausing for {}s", wait.as_secs());
            self.clock.sleep(wait).await;
        }

        match serde_json::from_str(&response.body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Unparseable response body for {}: {}", path_and_query, e);
                Ok(None)
            }
        }
    }
}
