use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use repoharvest_api::GitHubRepo;
use repoharvest_store::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{Error, Result};

/// What we're hunting for
///
/// Immutable once built. Partitioning derives narrower copies through
/// [`SearchCriteria::with_created_range`] instead of mutating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    keywords: String,
    min_stars: u32,
    include_forks: bool,
    created_from: DateTime<Utc>,
    created_to: DateTime<Utc>,
    language: Option<String>,
}

impl SearchCriteria {
    pub fn new(
        keywords: impl Into<String>,
        created_from: DateTime<Utc>,
        created_to: DateTime<Utc>,
    ) -> Result<Self> {
        let keywords = keywords.into().trim().to_string();
        if keywords.is_empty() {
            return Err(Error::InvalidCriteria("keywords must not be empty".into()));
        }
        if created_from > created_to {
            return Err(Error::InvalidCriteria(format!(
                "created_from {} is after created_to {}",
                created_from, created_to
            )));
        }

        Ok(Self {
            keywords,
            min_stars: 0,
            include_forks: false,
            created_from,
            created_to,
            language: None,
        })
    }

    /// Same as [`SearchCriteria::new`] with whole days, midnight UTC
    pub fn for_dates(keywords: impl Into<String>, from: NaiveDate, to: NaiveDate) -> Result<Self> {
        Self::new(keywords, start_of_day(from), start_of_day(to))
    }

    pub fn with_min_stars(mut self, min_stars: u32) -> Self {
        self.min_stars = min_stars;
        self
    }

    pub fn with_forks(mut self, include_forks: bool) -> Self {
        self.include_forks = include_forks;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self
    }

    /// Copy of these criteria narrowed to another creation window
    ///
    /// Callers only ever pass sub-ranges of a validated range, so the
    /// ordering invariant carries over.
    pub fn with_created_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        debug_assert!(from <= to);
        Self {
            created_from: from,
            created_to: to,
            ..self.clone()
        }
    }

    pub fn keywords(&self) -> &str {
        &self.keywords
    }

    pub fn min_stars(&self) -> u32 {
        self.min_stars
    }

    pub fn include_forks(&self) -> bool {
        self.include_forks
    }

    pub fn created_from(&self) -> DateTime<Utc> {
        self.created_from
    }

    pub fn created_to(&self) -> DateTime<Utc> {
        self.created_to
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// One harvested repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub homepage: Option<String>,
    pub size: u64,
    pub stars: u32,
    pub watchers: u32,
    pub forks: u32,
    pub open_issues: u32,
    pub topics: Vec<String>,
    pub default_branch: String,
    pub is_template: bool,
    /// Filled in by the README pass, never by the search
    #[serde(default)]
    pub readme: Option<String>,
    #[serde(default)]
    pub readme_read_at: Option<DateTime<Utc>>,
}

impl From<GitHubRepo> for RepositoryRecord {
    fn from(gh: GitHubRepo) -> Self {
        Self {
            id: gh.id,
            name: gh.name,
            full_name: gh.full_name,
            url: gh.html_url,
            description: gh.description,
            created_at: gh.created_at,
            updated_at: gh.updated_at,
            pushed_at: gh.pushed_at,
            language: gh.language,
            // GitHub sends "" for "no homepage"
            homepage: gh.homepage.filter(|h| !h.is_empty()),
            size: gh.size,
            stars: gh.stargazers_count,
            watchers: gh.watchers_count,
            forks: gh.forks_count,
            open_issues: gh.open_issues_count,
            topics: gh.topics,
            default_branch: gh.default_branch,
            is_template: gh.is_template,
            readme: None,
            readme_read_at: None,
        }
    }
}

impl Document for RepositoryRecord {
    fn document_id(&self) -> i64 {
        self.id
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn default_branch(&self) -> &str {
        &self.default_branch
    }

    fn attach_readme(&mut self, readme: Option<String>, read_at: Option<DateTime<Utc>>) {
        self.readme = readme;
        self.readme_read_at = read_at;
    }
}

/// Counters from one search run
///
/// `unavailable_calls > 0` is how a caller tells "GitHub had nothing" apart
/// from "GitHub wouldn't answer".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub count_probes: u32,
    pub pages_fetched: u32,
    pub partitions_split: u32,
    pub saturated_partitions: u32,
    pub unavailable_calls: u32,
    pub duplicates_dropped: u32,
}

/// Everything one search found, unique by repository id
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    records: Vec<RepositoryRecord>,
    pub stats: SearchStats,
}

impl ResultSet {
    /// Collapse duplicates by id, first one seen wins
    pub fn from_records(records: Vec<RepositoryRecord>, mut stats: SearchStats) -> Self {
        let before = records.len();
        let mut seen = HashSet::with_capacity(before);
        let records: Vec<_> = records
            .into_iter()
            .filter(|record| seen.insert(record.id))
            .collect();

        stats.duplicates_dropped = (before - records.len()) as u32;
        Self { records, stats }
    }

    pub fn records(&self) -> &[RepositoryRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RepositoryRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when at least one call came back with nothing usable
    pub fn is_degraded(&self) -> bool {
        self.stats.unavailable_calls > 0
    }
}

impl IntoIterator for ResultSet {
    type Item = RepositoryRecord;
    type IntoIter = std::vec::IntoIter<RepositoryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
