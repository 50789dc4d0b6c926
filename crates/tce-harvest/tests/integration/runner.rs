//! Integration tests for whole harvest runs.

use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use tce_catalog::Catalog;
use tce_catalog::schema::TOIS_TABLE;
use tce_core::TicId;
use tce_harvest::{HarvestPlan, Harvester, PlanOptions};

use crate::common::{MockArchive, TestHarness, candidate_table, partial_files};

fn never() -> std::future::Pending<()> {
    std::future::pending()
}

#[tokio::test]
async fn test_run_records_every_success() {
    let harness = TestHarness::new();
    let archive = Arc::new(
        MockArchive::new()
            .with_target(25155310, &[1, 2])
            .with_target(141914082, &[13]),
    );
    let table = candidate_table(&[
        ("25155310", "[1, 2]"),
        ("307210830", "[4]"),
        ("141914082", "13"),
        ("88863718", ""),
    ]);
    let plan = HarvestPlan::from_table(&table, &PlanOptions::from_config(&harness.config)).unwrap();
    assert_eq!(plan.len(), 3);

    let bar = ProgressBar::hidden();
    let harvester =
        Harvester::new(archive.clone(), harness.config.clone()).with_progress(bar.clone());
    let summary = harvester.run(&table, plan, never()).await.unwrap();

    assert_eq!(bar.length(), Some(3));
    assert_eq!(bar.position(), 3);
    assert!(bar.is_finished());
    assert_eq!(summary.planned, 3);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.no_data, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.recorded, 2);
    assert!(!summary.interrupted);

    let catalog = Catalog::open(&harness.config.catalog.database).await.unwrap();
    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.light_curves, 2);
    assert_eq!(stats.targets, 2);
    // Every catalogue row lands in TOIs, with or without sectors
    assert_eq!(stats.tois, 4);
    assert!(catalog.table_exists(TOIS_TABLE).await.unwrap());

    let rows = catalog.light_curves_for(TicId::new(141914082)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sector.get(), 13);
    assert!(rows[0].path.starts_with(harness.cache_dir()));
}

#[tokio::test]
async fn test_rerun_reuses_cache_without_duplicates() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().with_target(1, &[1]).with_target(2, &[1]));
    let table = candidate_table(&[("1", "1"), ("2", "1")]);
    let options = PlanOptions::from_config(&harness.config);
    let harvester = Harvester::new(archive.clone(), harness.config.clone());

    let first = harvester
        .run(&table, HarvestPlan::from_table(&table, &options).unwrap(), never())
        .await
        .unwrap();
    let second = harvester
        .run(&table, HarvestPlan::from_table(&table, &options).unwrap(), never())
        .await
        .unwrap();

    assert_eq!(first.downloaded, 2);
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.cached, 2);
    assert_eq!(archive.fetches(), 2);

    let catalog = Catalog::open(&harness.config.catalog.database).await.unwrap();
    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.light_curves, 2);
    assert_eq!(stats.tois, 2);
}

#[tokio::test]
async fn test_repeated_targets_share_one_download() {
    let harness = TestHarness::new();
    let archive = Arc::new(
        MockArchive::new()
            .with_target(7, &[1])
            .streaming(5, Duration::from_millis(20)),
    );
    // One row per TCE of a multi-planet star
    let table = candidate_table(&[("7", "1"), ("7", "1"), ("7", "[1, 2]")]);
    let plan = HarvestPlan::from_table(&table, &PlanOptions::from_config(&harness.config)).unwrap();
    assert_eq!(plan.len(), 2);

    let summary = Harvester::new(archive.clone(), harness.config.clone())
        .run(&table, plan, never())
        .await
        .unwrap();

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.recorded, 2);

    let catalog = Catalog::open(&harness.config.catalog.database).await.unwrap();
    let rows = catalog.light_curves_for(TicId::new(7)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sector.get(), 1);
    assert!(rows[0].path.is_file());
    assert!(partial_files(rows[0].path.parent().unwrap()).is_empty());
    assert_eq!(catalog.stats().await.unwrap().tois, 3);
}

#[tokio::test]
async fn test_failures_do_not_abort_run() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().with_target(1, &[1]).failing_permanently());
    let table = candidate_table(&[("1", "1"), ("2", "2")]);
    let plan = HarvestPlan::from_table(&table, &PlanOptions::default()).unwrap();

    let summary = Harvester::new(archive, harness.config.clone())
        .run(&table, plan, never())
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.recorded, 0);
    assert!(!summary.interrupted);
}

#[tokio::test]
async fn test_test_mode_limits_tasks() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new());
    let rows: Vec<(String, String)> = (1..=25).map(|i| (i.to_string(), "1".to_string())).collect();
    let rows: Vec<(&str, &str)> = rows.iter().map(|(t, s)| (t.as_str(), s.as_str())).collect();
    let table = candidate_table(&rows);

    let mut config = harness.config.clone();
    config.enable_test_mode();
    let plan = HarvestPlan::from_table(&table, &PlanOptions::from_config(&config)).unwrap();
    assert!(plan.is_truncated());

    let summary = Harvester::new(archive.clone(), config)
        .run(&table, plan, never())
        .await
        .unwrap();

    assert_eq!(summary.planned, 10);
    assert_eq!(summary.no_data, 10);
    assert_eq!(archive.searches(), 10);
    let mut searched: Vec<u64> = archive.searched().iter().map(TicId::get).collect();
    searched.sort_unstable();
    assert_eq!(searched, (1..=10).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_interrupt_commits_recorded_rows() {
    let harness = TestHarness::new();
    let archive = Arc::new(MockArchive::new().with_target(1, &[1]).hanging(2));
    let table = candidate_table(&[("1", "1"), ("2", "1"), ("3", "1")]);
    let plan = HarvestPlan::from_table(&table, &PlanOptions::default()).unwrap();

    let mut config = harness.config.clone();
    config.harvest.workers = 1;
    let entered = archive.hang_entered();
    let shutdown = async move { entered.notified().await };

    let bar = ProgressBar::hidden();
    let summary = Harvester::new(archive.clone(), config)
        .with_progress(bar.clone())
        .run(&table, plan, shutdown)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(bar.position(), 1);
    assert!(bar.is_finished());
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.completed(), 1);
    // The third task never started
    assert_eq!(archive.searches(), 2);

    let catalog = Catalog::open(&harness.config.catalog.database).await.unwrap();
    assert_eq!(catalog.stats().await.unwrap().light_curves, 1);
}

#[tokio::test]
async fn test_missing_cache_parent_is_created() {
    let mut harness = TestHarness::new();
    harness.config.cache.dir = harness.dir.path().join("mnt/data/TCEs_LCs");
    let archive = Arc::new(MockArchive::new().with_target(1, &[1]));
    let table = candidate_table(&[("1", "1")]);
    let plan = HarvestPlan::from_table(&table, &PlanOptions::default()).unwrap();

    let summary = Harvester::new(archive, harness.config.clone())
        .run(&table, plan, never())
        .await
        .unwrap();

    assert_eq!(summary.recorded, 1);
    assert!(harness.cache_dir().is_dir());
}
