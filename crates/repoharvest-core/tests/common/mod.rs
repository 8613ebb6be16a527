// In-memory stand-in for the GitHub search and README endpoints
#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use repoharvest_api::{ApiGateway, Clock, GitHubError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Ids start above u32::MAX like real GitHub ids do nowadays
pub const ID_BASE: i64 = 5_000_000_000;

const RESULT_WINDOW: usize = 1000;

#[derive(Debug, Clone)]
pub struct FakeRepo {
    pub id: i64,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub stars: u32,
}

impl FakeRepo {
    fn to_json(&self) -> Value {
        let name = self.full_name.split('/').nth(1).unwrap_or_default();
        json!({
            "id": self.id,
            "name": name,
            "full_name": self.full_name,
            "url": format!("https://api.github.com/repos/{}", self.full_name),
            "html_url": format!("https://github.com/{}", self.full_name),
            "description": format!("Fake repository {}", self.id),
            "created_at": self.created_at.to_rfc3339(),
            "updated_at": self.created_at.to_rfc3339(),
            "pushed_at": self.created_at.to_rfc3339(),
            "language": "Rust",
            "homepage": null,
            "size": 128,
            "stargazers_count": self.stars,
            "watchers_count": self.stars,
            "forks_count": 0,
            "open_issues_count": 0,
            "topics": ["fake"],
            "default_branch": "main",
            "is_template": false
        })
    }
}

/// `count` repositories spread round-robin over `days` days from `start`
pub fn spread(count: usize, start: NaiveDate, days: u32) -> Vec<FakeRepo> {
    let base = Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0).unwrap());
    (0..count)
        .map(|i| {
            let day = (i as u32 % days) as i64;
            let hour = (i % 24) as i64;
            FakeRepo {
                id: ID_BASE + i as i64,
                full_name: format!("owner{}/repo{}", i % 37, i),
                created_at: base + Duration::days(day) + Duration::hours(hour),
                stars: 10 + (i as u32 * 7) % 500,
            }
        })
        .collect()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Default)]
pub struct FakeGitHub {
    repos: Vec<FakeRepo>,
    readmes: HashMap<String, Value>,
    /// Every call answers "no data", like a platform stuck on 5xx
    pub unavailable: bool,
    /// Search pages from this page on come back without an `items` array
    pub drop_items_from_page: Option<usize>,
    /// Search pages from this page on answer "no data"
    pub fail_from_page: Option<usize>,
    calls: Mutex<Vec<String>>,
}

impl FakeGitHub {
    pub fn new(repos: Vec<FakeRepo>) -> Self {
        Self {
            repos,
            ..Self::default()
        }
    }

    pub fn with_readme(mut self, full_name: &str, body: Value) -> Self {
        self.readmes.insert(full_name.to_string(), body);
        self
    }

    pub fn with_base64_readme(self, full_name: &str, text: &str) -> Self {
        let content = base64::engine::general_purpose::STANDARD.encode(text);
        self.with_readme(full_name, json!({"content": content, "encoding": "base64"}))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_probes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.contains("per_page=1&"))
            .count()
    }

    pub fn page_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.contains("per_page=100&"))
            .count()
    }

    fn search(&self, query: &str) -> Option<Value> {
        let params = parse_params(query);
        let q = params.get("q")?;
        let per_page: usize = params.get("per_page")?.parse().ok()?;
        let page: usize = params.get("page")?.parse().ok()?;

        let (from, to) = created_range(q)?;
        let min_stars = min_stars(q);

        let mut matches: Vec<&FakeRepo> = self
            .repos
            .iter()
            .filter(|r| {
                let day = r.created_at.date_naive();
                day >= from && day <= to && r.stars >= min_stars
            })
            .collect();
        matches.sort_by(|a, b| b.stars.cmp(&a.stars).then(a.id.cmp(&b.id)));

        // count probes (per_page=1) are never affected
        let listing = per_page > 1;
        if listing && self.fail_from_page.is_some_and(|n| page >= n) {
            return None;
        }

        let start = (page - 1) * per_page;
        if start >= RESULT_WINDOW {
            // GitHub answers 422 past the window
            return None;
        }
        let end = (start + per_page).min(matches.len()).min(RESULT_WINDOW);
        let items: Vec<Value> = matches
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|r| r.to_json())
            .collect();

        if listing && self.drop_items_from_page.is_some_and(|n| page >= n) {
            return Some(json!({"total_count": matches.len(), "incomplete_results": false}));
        }

        Some(json!({
            "total_count": matches.len(),
            "incomplete_results": false,
            "items": items
        }))
    }

    fn readme(&self, path: &str) -> Option<Value> {
        let full_name = path
            .strip_prefix("/repos/")?
            .split("/readme")
            .next()?;
        self.readmes.get(full_name).cloned()
    }
}

#[async_trait]
impl ApiGateway for FakeGitHub {
    async fn call(&self, path_and_query: &str) -> Result<Option<Value>, GitHubError> {
        self.calls.lock().unwrap().push(path_and_query.to_string());

        if self.unavailable {
            return Ok(None);
        }

        let (path, query) = path_and_query
            .split_once('?')
            .unwrap_or((path_and_query, ""));

        if path == "/search/repositories" {
            Ok(self.search(query))
        } else if path.ends_with("/readme") {
            Ok(self.readme(path))
        } else {
            Ok(None)
        }
    }
}

fn parse_params(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            let value = urlencoding::decode(v).map(|c| c.into_owned()).unwrap_or_default();
            (k.to_string(), value)
        })
        .collect()
}

fn created_range(q: &str) -> Option<(NaiveDate, NaiveDate)> {
    let range = q.split(' ').find_map(|t| t.strip_prefix("created:"))?;
    let (from, to) = range.split_once("..")?;
    Some((from.parse().ok()?, to.parse().ok()?))
}

fn min_stars(q: &str) -> u32 {
    q.split(' ')
        .find_map(|t| t.strip_prefix("stars:>="))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Clock that moves forward a fixed step every time someone asks the time
pub struct SteppingClock {
    now: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(step: Duration) -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            step,
        }
    }
}

#[async_trait]
impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap();
        let current = *now;
        *now = current + self.step;
        current
    }

    async fn sleep(&self, _duration: std::time::Duration) {}
}
