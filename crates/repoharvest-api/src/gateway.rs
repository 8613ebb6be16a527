use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::github::Result;

/// One authenticated call against the GitHub REST API
///
/// `Ok(None)` means "no data this call" - a non-success status or an
/// unparseable body. Callers treat it as an empty page / absent README.
/// `Err` is reserved for the platform being unreachable.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    /// `path_and_query` is relative to the API root, e.g.
    /// `/search/repositories?q=...`
    async fn call(&self, path_and_query: &str) -> Result<Option<Value>>;
}

#[async_trait]
impl<T: ApiGateway + ?Sized> ApiGateway for Arc<T> {
    async fn call(&self, path_and_query: &str) -> Result<Option<Value>> {
        (**self).call(path_and_query).await
    }
}
