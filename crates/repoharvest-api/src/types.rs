// Wire shapes of the two GitHub endpoints we talk to
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// `GET /search/repositories` envelope
///
/// Items stay as raw JSON so one malformed entry doesn't sink the page.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Option<Vec<Value>>,
}

/// One search hit
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // null for repositories nobody ever pushed to
    pub pushed_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub homepage: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub watchers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    #[serde(default)]
    pub open_issues_count: u32,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub default_branch: String,
    #[serde(default)]
    pub is_template: bool,
}

/// `GET /repos/{owner}/{repo}/readme`
///
/// Both fields are optional on purpose: a response missing either one is
/// "no README", not a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadmeResponse {
    pub content: Option<String>,
    pub encoding: Option<String>,
}
