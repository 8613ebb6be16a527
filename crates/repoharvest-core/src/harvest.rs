// Search -> persist -> README back-fill
use repoharvest_api::{Clock, SystemClock};
use repoharvest_store::RepositoryStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::SearchStats;
use crate::readme::ReadmeFetcher;
use crate::search::RepositorySearchEngine;
use crate::{Error, Result};

/// What a harvest run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub found: usize,
    pub inserted: usize,
    pub updated: usize,
    pub readmes_stored: usize,
    pub readmes_missing: usize,
    /// READMEs in an encoding we don't understand; left pending
    pub readme_errors: usize,
    pub stats: SearchStats,
}

/// Wires the search engine, the store and the README fetcher together
pub struct Harvester {
    engine: RepositorySearchEngine,
    readmes: ReadmeFetcher,
    store: RepositoryStore,
    clock: Arc<dyn Clock>,
}

impl Harvester {
    pub fn new(engine: RepositorySearchEngine, readmes: ReadmeFetcher, store: RepositoryStore) -> Self {
        Self {
            engine,
            readmes,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &RepositoryStore {
        &self.store
    }

    /// Full run with the configured criteria
    pub async fn run(&mut self) -> Result<HarvestReport> {
        let results = self.engine.search_configured().await?;

        if results.is_degraded() {
            warn!(
                "{} GitHub calls returned no data; results may be incomplete",
                results.stats.unavailable_calls
            );
        }

        let summary = self
            .store
            .upsert_documents(results.records(), self.clock.now())?;

        let mut report = HarvestReport {
            found: results.len(),
            inserted: summary.inserted,
            updated: summary.updated,
            stats: results.stats,
            ..HarvestReport::default()
        };

        self.fill_readmes(&mut report).await?;
        Ok(report)
    }

    /// Only the README pass, for records a previous run didn't get to
    pub async fn refresh_readmes(&mut self) -> Result<HarvestReport> {
        let mut report = HarvestReport::default();
        self.fill_readmes(&mut report).await?;
        Ok(report)
    }

    async fn fill_readmes(&self, report: &mut HarvestReport) -> Result<()> {
        let pending = self.store.pending_readmes()?;
        info!("Fetching READMEs for {} repositories", pending.len());

        for repo in pending {
            match self.readmes.fetch(&repo.full_name, &repo.default_branch).await {
                Ok(Some(text)) => {
                    self.store.set_readme(repo.id, Some(&text), self.clock.now())?;
                    report.readmes_stored += 1;
                }
                Ok(None) => {
                    // Checked and nothing there; don't ask again next run
                    self.store.set_readme(repo.id, None, self.clock.now())?;
                    report.readmes_missing += 1;
                }
                Err(e @ Error::UnsupportedEncoding { .. }) => {
                    warn!("{}", e);
                    report.readme_errors += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "READMEs: {} stored, {} missing, {} unsupported",
            report.readmes_stored, report.readmes_missing, report.readme_errors
        );
        Ok(())
    }
}
