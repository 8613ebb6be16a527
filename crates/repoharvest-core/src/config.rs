use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::SearchCriteria;

/// Main configuration structure
///
/// Loaded from a TOML file; the CLI then layers env vars and flags on top.
/// Priority: CLI > Env > File > Defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load config from the default location, or defaults if there is none
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> crate::Result<Self> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)?;
            Self::from_toml(&contents)
        } else {
            // No config file? Use defaults
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Get the config file path
    /// Uses XDG on Linux/macOS, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("repoharvest");

        Ok(config_dir.join("config.toml"))
    }

    /// Everything that must be present before we touch the network
    pub fn validate(&self) -> crate::Result<()> {
        self.token()?;
        self.storage_path()?;
        self.criteria()?;
        Ok(())
    }

    pub fn token(&self) -> crate::Result<&str> {
        self.github
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                crate::Error::ConfigError(
                    "GitHub token missing (set github.token or GITHUB_TOKEN)".into(),
                )
            })
    }

    pub fn storage_path(&self) -> crate::Result<&Path> {
        self.storage.path.as_deref().ok_or_else(|| {
            crate::Error::ConfigError(
                "Storage path missing (set storage.path or REPOHARVEST_DB)".into(),
            )
        })
    }

    /// Search criteria described by the `[search]` section
    pub fn criteria(&self) -> crate::Result<SearchCriteria> {
        let search = &self.search;
        let to = search
            .created_to
            .unwrap_or_else(|| Utc::now().date_naive());

        Ok(SearchCriteria::for_dates(&search.keywords, search.created_from, to)?
            .with_min_stars(search.min_stars)
            .with_forks(search.include_forks)
            .with_language(search.language.clone()))
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.search.deadline_secs.map(Duration::from_secs)
    }

    /// Copy that is safe to print
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.github.token.is_some() {
            copy.github.token = Some("********".to_string());
        }
        copy
    }

    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub personal access token
    /// Get one at https://github.com/settings/tokens
    pub token: Option<String>,

    /// API URL (for GitHub Enterprise)
    #[serde(default = "default_github_url")]
    pub api_url: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause when fewer than this many calls remain in the rate-limit window
    #[serde(default = "default_rate_limit_threshold")]
    pub rate_limit_threshold: u32,
}

fn default_github_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_threshold() -> u32 {
    5
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_url(),
            timeout_secs: default_timeout_secs(),
            rate_limit_threshold: default_rate_limit_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub keywords: String,

    #[serde(default)]
    pub min_stars: u32,

    #[serde(default)]
    pub include_forks: bool,

    /// Inclusive lower bound on creation date
    #[serde(default = "default_created_from")]
    pub created_from: NaiveDate,

    /// Inclusive upper bound; today when unset
    pub created_to: Option<NaiveDate>,

    pub language: Option<String>,

    /// Abort a search that runs longer than this
    pub deadline_secs: Option<u64>,
}

fn default_created_from() -> NaiveDate {
    // GitHub opened in 2008, nothing was created before that
    NaiveDate::from_ymd_opt(2008, 1, 1).unwrap_or_default()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keywords: String::new(),
            min_stars: 0,
            include_forks: false,
            created_from: default_created_from(),
            created_to: None,
            language: None,
            deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// SQLite database file
    pub path: Option<PathBuf>,
}
