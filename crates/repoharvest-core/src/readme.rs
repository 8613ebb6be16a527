// README retrieval for a single repository
use base64::Engine;
use repoharvest_api::{ApiGateway, ReadmeResponse};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{Error, Result};

/// The one content encoding GitHub uses for README payloads
const BASE64_ENCODING: &str = "base64";

pub struct ReadmeFetcher {
    gateway: Arc<dyn ApiGateway>,
}

impl ReadmeFetcher {
    pub fn new(gateway: Arc<dyn ApiGateway>) -> Self {
        Self { gateway }
    }

    /// An empty branch leaves `ref` off so GitHub uses the default branch
    pub fn readme_path(full_name: &str, branch: &str) -> String {
        let branch = branch.trim();
        if branch.is_empty() {
            return format!("/repos/{}/readme", full_name);
        }

        format!(
            "/repos/{}/readme?ref={}",
            full_name,
            urlencoding::encode(branch)
        )
    }

    /// README text of `full_name` at `branch`, if it has one
    ///
    /// A missing README, an error status or a response without content is
    /// `Ok(None)`. An encoding other than base64 is an error: it means GitHub
    /// changed the contract and we should hear about it.
    pub async fn fetch(&self, full_name: &str, branch: &str) -> Result<Option<String>> {
        let path = Self::readme_path(full_name, branch);

        let Some(body) = self.gateway.call(&path).await? else {
            debug!("No README for {}", full_name);
            return Ok(None);
        };

        let readme: ReadmeResponse = match serde_json::from_value(body) {
            Ok(readme) => readme,
            Err(e) => {
                warn!("Unexpected README response for {}: {}", full_name, e);
                return Ok(None);
            }
        };

        let (Some(content), Some(encoding)) = (readme.content, readme.encoding) else {
            debug!("README response for {} has no content", full_name);
            return Ok(None);
        };

        if encoding != BASE64_ENCODING {
            return Err(Error::UnsupportedEncoding {
                full_name: full_name.to_string(),
                encoding,
            });
        }

        Ok(decode_base64(full_name, &content))
    }
}

/// GitHub wraps base64 at 60 columns, so line breaks go before decoding
fn decode_base64(full_name: &str, content: &str) -> Option<String> {
    let compact: String = content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    match base64::engine::general_purpose::STANDARD.decode(compact) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!("README for {} is not valid base64: {}", full_name, e);
            None
        }
    }
}
