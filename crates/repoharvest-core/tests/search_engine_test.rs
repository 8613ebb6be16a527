mod common;

use chrono::Duration as ChronoDuration;
use common::{date, spread, FakeGitHub, FakeRepo, SteppingClock, ID_BASE};
use repoharvest_core::{
    Error, ProgressCallback, RepositorySearchEngine, SearchCriteria, SearchProgress,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn engine(fake: &Arc<FakeGitHub>) -> RepositorySearchEngine {
    RepositorySearchEngine::new(fake.clone())
}

fn ids(set: &repoharvest_core::ResultSet) -> HashSet<i64> {
    set.records().iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn test_month_over_window_splits_once() {
    let fake = Arc::new(FakeGitHub::new(spread(1500, date(2020, 1, 1), 31)));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31))
        .unwrap()
        .with_min_stars(10)
        .with_forks(false);

    let results = engine(&fake).search(&criteria).await.unwrap();

    // one probe for the month, one for each half, no further splitting
    assert_eq!(fake.count_probes(), 3);
    assert_eq!(results.stats.count_probes, 3);
    assert_eq!(results.stats.partitions_split, 1);
    // 780 + 768 matches, 8 pages each
    assert_eq!(fake.page_calls(), 16);
    assert_eq!(results.len(), 1500);
    assert_eq!(ids(&results).len(), 1500);

    let first = &fake.calls()[0];
    assert!(first.contains("created%3A2020-01-01..2020-01-31"));
    let second = &fake.calls()[1];
    assert!(second.contains("created%3A2020-01-01..2020-01-16"));
}

#[tokio::test]
async fn test_year_of_data_is_fully_enumerated() {
    let dataset = spread(2500, date(2020, 1, 1), 366);
    let expected: HashSet<i64> = dataset.iter().map(|r| r.id).collect();
    let fake = Arc::new(FakeGitHub::new(dataset));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 12, 31)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    assert_eq!(results.len(), 2500);
    assert_eq!(ids(&results), expected);
    assert!(results.stats.partitions_split >= 2);
    assert_eq!(results.stats.saturated_partitions, 0);
    assert!(!results.is_degraded());
}

#[tokio::test]
async fn test_no_duplicates_after_many_splits() {
    // dense enough to force several levels of bisection
    let fake = Arc::new(FakeGitHub::new(spread(6000, date(2021, 1, 1), 60)));
    let criteria = SearchCriteria::for_dates("x", date(2021, 1, 1), date(2021, 3, 1)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    let unique = ids(&results);
    assert_eq!(unique.len(), results.len());
    assert_eq!(results.len(), 6000);
    assert!(results.stats.partitions_split >= 7);
    // neighbouring halves share their boundary day
    assert!(results.stats.duplicates_dropped > 0);
}

#[tokio::test]
async fn test_zero_width_range_fetches_directly() {
    let dataset: Vec<FakeRepo> = spread(1200, date(2020, 1, 1), 1);
    let fake = Arc::new(FakeGitHub::new(dataset));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 1)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    assert_eq!(fake.count_probes(), 1);
    assert_eq!(results.stats.partitions_split, 0);
    assert_eq!(results.stats.saturated_partitions, 1);
    // the window is all GitHub will give us
    assert_eq!(results.len(), 1000);
    assert_eq!(fake.page_calls(), 10);
}

#[tokio::test]
async fn test_exactly_at_window_is_not_split() {
    let fake = Arc::new(FakeGitHub::new(spread(1000, date(2020, 1, 1), 10)));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    assert_eq!(fake.count_probes(), 1);
    assert_eq!(results.stats.partitions_split, 0);
    assert_eq!(fake.page_calls(), 10);
    assert_eq!(results.len(), 1000);
}

#[tokio::test]
async fn test_zero_matches_is_empty_not_error() {
    let fake = Arc::new(FakeGitHub::new(spread(50, date(2019, 1, 1), 10)));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(fake.page_calls(), 0);
    assert!(!results.is_degraded());
}

#[tokio::test]
async fn test_unavailable_platform_is_flagged() {
    let mut fake = FakeGitHub::new(spread(50, date(2020, 1, 1), 10));
    fake.unavailable = true;
    let fake = Arc::new(fake);
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    assert!(results.is_empty());
    assert!(results.is_degraded());
    assert_eq!(results.stats.unavailable_calls, 1);
}

#[tokio::test]
async fn test_missing_items_stops_pagination() {
    let mut fake = FakeGitHub::new(spread(300, date(2020, 1, 1), 10));
    fake.drop_items_from_page = Some(1);
    let fake = Arc::new(fake);
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(fake.page_calls(), 1);
}

#[tokio::test]
async fn test_failed_page_keeps_earlier_pages() {
    let mut fake = FakeGitHub::new(spread(350, date(2020, 1, 1), 10));
    fake.fail_from_page = Some(3);
    let fake = Arc::new(fake);
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    // pages 1 and 2 made it, page 3 failed and nothing after it was asked for
    assert_eq!(results.len(), 200);
    assert_eq!(fake.page_calls(), 3);
    assert_eq!(results.stats.pages_fetched, 2);
    assert_eq!(results.stats.unavailable_calls, 1);
    assert!(results.is_degraded());
}

#[tokio::test]
async fn test_items_less_page_keeps_earlier_pages() {
    let mut fake = FakeGitHub::new(spread(350, date(2020, 1, 1), 10));
    fake.drop_items_from_page = Some(2);
    let fake = Arc::new(fake);
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    assert_eq!(results.len(), 100);
    assert_eq!(fake.page_calls(), 2);
    assert_eq!(results.stats.unavailable_calls, 1);
    assert!(results.is_degraded());
}

#[tokio::test]
async fn test_short_page_ends_partition() {
    let fake = Arc::new(FakeGitHub::new(spread(250, date(2020, 1, 1), 10)));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let results = engine(&fake).search(&criteria).await.unwrap();

    assert_eq!(results.len(), 250);
    assert_eq!(fake.page_calls(), 3);
    assert!(results.records().iter().all(|r| r.id >= ID_BASE));
}

#[tokio::test]
async fn test_star_threshold_reaches_the_platform() {
    let fake = Arc::new(FakeGitHub::new(spread(200, date(2020, 1, 1), 10)));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31))
        .unwrap()
        .with_min_stars(400);

    let results = engine(&fake).search(&criteria).await.unwrap();

    assert!(!results.is_empty());
    assert!(results.records().iter().all(|r| r.stars >= 400));
}

#[tokio::test]
async fn test_configured_search_uses_default_criteria() {
    let fake = Arc::new(FakeGitHub::new(spread(1500, date(2020, 1, 1), 31)));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let engine = engine(&fake).with_default_criteria(criteria);
    let results = engine.search_configured().await.unwrap();

    assert_eq!(results.len(), 1500);
}

#[tokio::test]
async fn test_configured_search_without_criteria_fails() {
    let fake = Arc::new(FakeGitHub::new(Vec::new()));
    let result = engine(&fake).search_configured().await;
    assert!(matches!(result, Err(Error::ConfigError(_))));
}

#[tokio::test]
async fn test_deadline_stops_search() {
    let fake = Arc::new(FakeGitHub::new(spread(1500, date(2020, 1, 1), 31)));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let engine = engine(&fake)
        .with_clock(Arc::new(SteppingClock::new(ChronoDuration::minutes(1))))
        .with_deadline(Duration::from_secs(30));

    let result = engine.search(&criteria).await;

    assert!(matches!(result, Err(Error::DeadlineExceeded(_))));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_progress_events_in_order() {
    let fake = Arc::new(FakeGitHub::new(spread(1500, date(2020, 1, 1), 31)));
    let criteria = SearchCriteria::for_dates("x", date(2020, 1, 1), date(2020, 1, 31)).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: ProgressCallback = Box::new(move |event| sink.lock().unwrap().push(event));

    engine(&fake)
        .with_progress(callback)
        .search(&criteria)
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert!(matches!(
        events.first(),
        Some(SearchProgress::CountProbed {
            total_count: 1500,
            ..
        })
    ));
    assert!(matches!(
        events.get(1),
        Some(SearchProgress::PartitionSplit { .. })
    ));
    assert_eq!(
        events.last(),
        Some(&SearchProgress::SearchComplete { total: 1500 })
    );
    let pages = events
        .iter()
        .filter(|e| matches!(e, SearchProgress::PageFetched { .. }))
        .count();
    assert_eq!(pages, 16);
}
