// Repository search with date-range partitioning
//
// GitHub only ever serves the first 1000 matches of a search, however you
// paginate. To get everything we probe the count, and while a creation-date
// window holds more than that we cut it in half and look at each half.
use chrono::{DateTime, Days, Utc};
use repoharvest_api::{ApiGateway, Clock, GitHubRepo, SearchResponse, SystemClock};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{start_of_day, RepositoryRecord, ResultSet, SearchCriteria, SearchStats};
use crate::progress::{emit, ProgressCallback, SearchProgress};
use crate::query::{QueryBuilder, MAX_PER_PAGE};
use crate::{Error, Result};

/// Hard ceiling on reachable results for one query
pub const RESULT_WINDOW: u64 = 1000;

/// Finds every repository matching a set of criteria
pub struct RepositorySearchEngine {
    gateway: Arc<dyn ApiGateway>,
    clock: Arc<dyn Clock>,
    default_criteria: Option<SearchCriteria>,
    deadline: Option<Duration>,
    on_progress: Option<ProgressCallback>,
}

impl RepositorySearchEngine {
    pub fn new(gateway: Arc<dyn ApiGateway>) -> Self {
        Self {
            gateway,
            clock: Arc::new(SystemClock),
            default_criteria: None,
            deadline: None,
            on_progress: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Criteria used by [`RepositorySearchEngine::search_configured`]
    pub fn with_default_criteria(mut self, criteria: SearchCriteria) -> Self {
        self.default_criteria = Some(criteria);
        self
    }

    /// Give up with [`Error::DeadlineExceeded`] once a search has run this long
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Search with the criteria the engine was configured with
    pub async fn search_configured(&self) -> Result<ResultSet> {
        let criteria = self
            .default_criteria
            .as_ref()
            .ok_or_else(|| Error::ConfigError("No search criteria configured".into()))?;
        self.search(criteria).await
    }

    /// Every repository matching `criteria`, each exactly once
    ///
    /// Zero matches is an empty set, not an error. Errors mean GitHub could
    /// not be reached at all, or the deadline ran out.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<ResultSet> {
        let started = self.clock.now();
        let mut stats = SearchStats::default();
        let mut records = Vec::new();

        // Worklist instead of recursion. Right half goes on first so the
        // left half is resolved first.
        let mut pending = vec![criteria.clone()];

        while let Some(partition) = pending.pop() {
            let total = self.count(&partition, started, &mut stats).await?;

            if total == 0 {
                continue;
            }

            if total > RESULT_WINDOW {
                if let Some((left, right)) = bisect(&partition) {
                    stats.partitions_split += 1;
                    info!(
                        "{} matches between {} and {}, splitting at {}",
                        total,
                        partition.created_from(),
                        partition.created_to(),
                        left.created_to()
                    );
                    self.emit(SearchProgress::PartitionSplit {
                        from: partition.created_from(),
                        mid: left.created_to(),
                        to: partition.created_to(),
                        total_count: total,
                    });
                    pending.push(right);
                    pending.push(left);
                    continue;
                }

                stats.saturated_partitions += 1;
                warn!(
                    "{} matches created on {} alone; only the first {} are reachable",
                    total,
                    partition.created_from().date_naive(),
                    RESULT_WINDOW
                );
                self.emit(SearchProgress::WindowSaturated {
                    from: partition.created_from(),
                    to: partition.created_to(),
                    total_count: total,
                });
            }

            let mut found = self.paginate(&partition, total, started, &mut stats).await?;
            records.append(&mut found);
        }

        let results = ResultSet::from_records(records, stats);
        info!(
            "Search finished: {} repositories ({} probes, {} pages, {} splits)",
            results.len(),
            results.stats.count_probes,
            results.stats.pages_fetched,
            results.stats.partitions_split
        );
        self.emit(SearchProgress::SearchComplete {
            total: results.len(),
        });

        Ok(results)
    }

    /// Minimal query whose only purpose is `total_count`
    async fn count(
        &self,
        partition: &SearchCriteria,
        started: DateTime<Utc>,
        stats: &mut SearchStats,
    ) -> Result<u64> {
        let path = QueryBuilder::count_probe(partition);
        stats.count_probes += 1;

        let Some(response) = self.fetch(&path, started, stats).await? else {
            return Ok(0);
        };

        debug!(
            "Count probe {}..{}: {}",
            partition.created_from(),
            partition.created_to(),
            response.total_count
        );
        self.emit(SearchProgress::CountProbed {
            from: partition.created_from(),
            to: partition.created_to(),
            total_count: response.total_count,
        });

        Ok(response.total_count)
    }

    /// Walk the pages of a partition that fits in the result window
    async fn paginate(
        &self,
        partition: &SearchCriteria,
        total: u64,
        started: DateTime<Utc>,
        stats: &mut SearchStats,
    ) -> Result<Vec<RepositoryRecord>> {
        let reachable = total.min(RESULT_WINDOW);
        let max_pages = reachable.div_ceil(u64::from(MAX_PER_PAGE)) as u32;

        let mut found = Vec::new();
        let mut seen: u64 = 0;

        for page in 1..=max_pages {
            let path = QueryBuilder::render(partition, page, MAX_PER_PAGE);
            let Some(response) = self.fetch(&path, started, stats).await? else {
                break;
            };

            let Some(items) = response.items else {
                warn!("Search page {} came back without items, stopping", page);
                self.note_unavailable(&path, stats);
                break;
            };

            stats.pages_fetched += 1;
            let count = items.len();
            seen += count as u64;
            found.extend(items.into_iter().filter_map(parse_item));

            debug!("Page {}: {} items ({} of {})", page, count, seen, total);
            self.emit(SearchProgress::PageFetched {
                page,
                count,
                collected: found.len(),
                expected: total,
            });

            if count < MAX_PER_PAGE as usize || seen >= reachable {
                break;
            }
        }

        Ok(found)
    }

    /// One gateway call; `None` when there is nothing usable in the answer
    async fn fetch(
        &self,
        path: &str,
        started: DateTime<Utc>,
        stats: &mut SearchStats,
    ) -> Result<Option<SearchResponse>> {
        self.check_deadline(started)?;

        let parsed = match self.gateway.call(path).await? {
            Some(body) => parse_envelope(body),
            None => None,
        };

        if parsed.is_none() {
            self.note_unavailable(path, stats);
        }

        Ok(parsed)
    }

    /// Whatever was collected so far is kept; the stats mark the gap
    fn note_unavailable(&self, path: &str, stats: &mut SearchStats) {
        stats.unavailable_calls += 1;
        self.emit(SearchProgress::CallUnavailable {
            path: path.to_string(),
        });
    }

    fn check_deadline(&self, started: DateTime<Utc>) -> Result<()> {
        let Some(deadline) = self.deadline else {
            return Ok(());
        };

        let elapsed = (self.clock.now() - started).to_std().unwrap_or_default();
        if elapsed > deadline {
            warn!("Search gave up after {:?}", elapsed);
            return Err(Error::DeadlineExceeded(deadline));
        }
        Ok(())
    }

    fn emit(&self, event: SearchProgress) {
        emit(self.on_progress.as_ref(), event);
    }
}

fn parse_envelope(body: Value) -> Option<SearchResponse> {
    match serde_json::from_value::<SearchResponse>(body) {
        Ok(response) => {
            if response.incomplete_results {
                warn!("GitHub flagged these search results as incomplete");
            }
            Some(response)
        }
        Err(e) => {
            warn!("Unexpected search response shape: {}", e);
            None
        }
    }
}

fn parse_item(item: Value) -> Option<RepositoryRecord> {
    match serde_json::from_value::<GitHubRepo>(item) {
        Ok(repo) => Some(repo.into()),
        Err(e) => {
            warn!("Skipping malformed search item: {}", e);
            None
        }
    }
}

/// Split a partition into two whose rendered date ranges are both narrower
///
/// The cut is the exact temporal midpoint. Queries only resolve whole days,
/// so when the midpoint shares a day with either end the cut moves to the
/// first midnight after `from` instead. Returns `None` for a partition that
/// renders as a single day - nothing narrower can be asked for.
pub fn bisect(partition: &SearchCriteria) -> Option<(SearchCriteria, SearchCriteria)> {
    let from = partition.created_from();
    let to = partition.created_to();
    let (first_day, last_day) = (from.date_naive(), to.date_naive());

    if first_day >= last_day {
        return None;
    }

    let mid = from + (to - from) / 2;
    let mid_day = mid.date_naive();

    if first_day < mid_day && mid_day < last_day {
        return Some((
            partition.with_created_range(from, mid),
            partition.with_created_range(mid, to),
        ));
    }

    // first_day < last_day, so the next midnight is still within range
    let next_day = first_day.checked_add_days(Days::new(1))?;
    let boundary = start_of_day(next_day);
    Some((
        partition.with_created_range(from, from),
        partition.with_created_range(boundary, to),
    ))
}
