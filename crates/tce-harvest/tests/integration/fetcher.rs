//! Integration tests for the light-curve fetcher.

use std::sync::Arc;
use std::time::Duration;

use tce_core::{Sector, TaskOutcome, TicId};
use tce_harvest::{LightCurveFetcher, LinearBackoff};
use tce_mast::fits::build_header;
use tce_mast::{CacheLayout, ProductFilter};

use crate::common::{MockArchive, TestHarness, obs_id, partial_files, task};

fn fetcher(harness: &TestHarness, archive: &Arc<MockArchive>) -> LightCurveFetcher {
    LightCurveFetcher::from_config(archive.clone(), &harness.config)
}

fn lc_path(harness: &TestHarness, tic: u64, sector: u16) -> std::path::PathBuf {
    let id = obs_id(TicId::new(tic), Sector::new(sector).unwrap());
    harness
        .cache_dir()
        .join("mastDownload/TESS")
        .join(&id)
        .join(format!("{id}_lc.fits"))
}

#[tokio::test]
async fn test_download_then_cache_hit() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().with_target(25155310, &[1, 2]));
    let fetcher = fetcher(&harness, &archive);

    let outcome = fetcher.fetch(&task(25155310, "[1, 2]")).await;
    let TaskOutcome::Downloaded(record) = &outcome else {
        unreachable!("expected Downloaded, got {outcome:?}")
    };
    assert_eq!(record.tic, TicId::new(25155310));
    assert_eq!(record.sector, Sector::new(1).unwrap());
    assert_eq!(record.path, lc_path(&harness, 25155310, 1));
    assert!(record.path.exists());
    assert!(partial_files(record.path.parent().unwrap()).is_empty());

    let again = fetcher.fetch(&task(25155310, "[1, 2]")).await;
    assert!(matches!(again, TaskOutcome::Cached(_)));
    assert_eq!(archive.fetches(), 1);
}

#[tokio::test]
async fn test_sector_restriction() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().with_target(7, &[5, 6]));
    let fetcher = fetcher(&harness, &archive);

    let outcome = fetcher.fetch(&task(7, "6")).await;
    assert_eq!(outcome.record().unwrap().sector, Sector::new(6).unwrap());

    let outcome = fetcher.fetch(&task(7, "9")).await;
    assert_eq!(outcome, TaskOutcome::NoData);
}

#[tokio::test]
async fn test_unknown_target_is_no_data() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new());

    let outcome = fetcher(&harness, &archive).fetch(&task(99, "1")).await;

    assert_eq!(outcome, TaskOutcome::NoData);
    assert_eq!(archive.searches(), 1);
    assert_eq!(archive.fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_retried_with_linear_backoff() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().failing_transiently(2));
    let fetcher = LightCurveFetcher::new(
        archive.clone(),
        CacheLayout::new(harness.cache_dir()),
        ProductFilter::default(),
        LinearBackoff::new(Duration::from_secs(3), 3),
    );

    let start = tokio::time::Instant::now();
    let outcome = fetcher.fetch(&task(1, "1")).await;

    assert_eq!(outcome, TaskOutcome::NoData);
    assert_eq!(archive.searches(), 3);
    // 3s after the first failure, 6s after the second
    assert!(start.elapsed() >= Duration::from_secs(9));
}

#[tokio::test]
async fn test_retries_exhausted() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().with_target(1, &[1]).failing_transiently(10));

    let outcome = fetcher(&harness, &archive).fetch(&task(1, "1")).await;

    let TaskOutcome::Failed { reason } = &outcome else {
        unreachable!("expected Failed, got {outcome:?}")
    };
    assert!(reason.contains("connection reset"));
    assert_eq!(archive.searches(), harness.config.retry.max_attempts);
}

#[tokio::test]
async fn test_permanent_error_not_retried() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().failing_permanently());

    let outcome = fetcher(&harness, &archive).fetch(&task(1, "1")).await;

    assert!(matches!(outcome, TaskOutcome::Failed { .. }));
    assert_eq!(archive.searches(), 1);
}

#[tokio::test]
async fn test_corrupt_download_rejected() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().with_target(3, &[1]).corrupt_downloads());

    let outcome = fetcher(&harness, &archive).fetch(&task(3, "1")).await;

    let TaskOutcome::Failed { reason } = &outcome else {
        unreachable!("expected Failed, got {outcome:?}")
    };
    assert!(reason.contains("Invalid FITS"));
    // Integrity failures are permanent
    assert_eq!(archive.fetches(), 1);

    let path = lc_path(&harness, 3, 1);
    assert!(!path.exists());
    assert!(partial_files(path.parent().unwrap()).is_empty());
}

#[tokio::test]
async fn test_header_for_wrong_target_rejected() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().with_target(3, &[1]).with_header_tic(4));

    let outcome = fetcher(&harness, &archive).fetch(&task(3, "1")).await;

    let TaskOutcome::Failed { reason } = &outcome else {
        unreachable!("expected Failed, got {outcome:?}")
    };
    assert!(reason.contains("TICID 4 does not match TIC 3"));
}

#[tokio::test]
async fn test_bad_cached_file_replaced() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().with_target(5, &[2]));

    let path = lc_path(&harness, 5, 2);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, build_header(&[("TICID", "6"), ("SECTOR", "2")])).unwrap();

    let outcome = fetcher(&harness, &archive).fetch(&task(5, "2")).await;

    assert!(matches!(outcome, TaskOutcome::Downloaded(_)));
    assert_eq!(archive.fetches(), 1);
    let header = tce_mast::FitsHeader::read(&path).await.unwrap();
    assert_eq!(header.get_int("TICID"), Some(5));
}

#[tokio::test]
async fn test_concurrent_fetches_of_one_product() {
    let harness = TestHarness::new();
    let archive = Arc::new(
        MockArchive::new()
            .with_target(7, &[1])
            .streaming(5, Duration::from_millis(20)),
    );
    let fetcher = fetcher(&harness, &archive);

    // Both tasks resolve to the sector 1 light curve
    let first_task = task(7, "1");
    let second_task = task(7, "[1, 2]");
    let (first, second) = tokio::join!(
        fetcher.fetch(&first_task),
        fetcher.fetch(&second_task)
    );

    for outcome in [&first, &second] {
        assert!(
            matches!(outcome, TaskOutcome::Downloaded(_) | TaskOutcome::Cached(_)),
            "unexpected outcome {outcome:?}"
        );
    }
    assert_eq!(archive.fetches(), 2);

    let path = lc_path(&harness, 7, 1);
    assert_eq!(first.record().unwrap().path, path);
    assert_eq!(second.record().unwrap().path, path);
    let header = tce_mast::FitsHeader::read(&path).await.unwrap();
    assert_eq!(header.get_int("TICID"), Some(7));
    assert!(partial_files(path.parent().unwrap()).is_empty());
}
