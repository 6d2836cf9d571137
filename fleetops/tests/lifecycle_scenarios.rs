//! Lifecycle passes over real log trees
//!
//! Partitions are packaged with the system `tar` and uploaded into an in-memory store so every
//! store call can be asserted.

mod common;

use common::fixtures::*;
use rstest::*;
use std::sync::Arc;

use fleetops::constants::retention;
use fleetops::errors::{ConfigError, LifecycleError};
use fleetops::exec::{CommandExecutor, LocalExecutor};
use fleetops::lifecycle::{
    ArchiveStore, BucketedScanner, LifecycleDriver, LifecycleReport, RetentionPolicy,
};
use fleetops::storage::BlobStore;

struct Harness {
    tree: LogTree,
    staging: tempfile::TempDir,
    store: Arc<MemoryStore>,
}

impl Harness {
    fn driver(&self, executor: Arc<dyn CommandExecutor>, ripe_days: i64, reap_days: i64) -> LifecycleDriver {
        let scanner = Arc::new(BucketedScanner::new(
            executor.clone(),
            retention::PARTITION_DATE_FORMAT,
        ));
        let blobs: Arc<dyn BlobStore> = self.store.clone();
        let archive_store =
            ArchiveStore::new(executor, blobs, self.staging.path().to_str().unwrap());
        let policy = RetentionPolicy::from_days(ripe_days, reap_days, 0).unwrap();
        LifecycleDriver::new(scanner, archive_store, policy)
    }

    fn local_driver(&self, ripe_days: i64, reap_days: i64) -> LifecycleDriver {
        self.driver(Arc::new(LocalExecutor::new()), ripe_days, reap_days)
    }
}

fn new_harness() -> Harness {
    Harness {
        tree: LogTree::new(),
        staging: tempfile::TempDir::new().unwrap(),
        store: Arc::new(MemoryStore::new("logs.test")),
    }
}

#[fixture]
fn harness() -> Harness {
    new_harness()
}

#[rstest]
#[tokio::test]
async fn old_and_recent_partitions_are_archived_then_reaped(harness: Harness) {
    let old = date(2024, 1, 1);
    let recent = date(2024, 2, 1);
    harness.tree.add_partition(HOST_A, old);
    harness.tree.add_partition(HOST_A, recent);
    let now = utc(2024, 2, 10);

    let report = harness
        .local_driver(1, 30)
        .run(harness.tree.base(), now)
        .await
        .unwrap();

    assert_eq!(report.archived, 2, "both partitions should be archived: {}", report);
    assert_eq!(report.removed, 0);
    assert!(harness.tree.exists(HOST_A, old), "expired but freshly archived partition must stay");
    assert_eq!(
        harness.store.keys(),
        vec!["20240101_host-a.tar.gz".to_string(), "20240201_host-a.tar.gz".to_string()]
    );

    // Second pass with a shorter reap age, only the first partition archived beforehand
    let second = harness_with_single_archive(&harness);
    let report = second
        .local_driver(1, 5)
        .run(second.tree.base(), now)
        .await
        .unwrap();

    assert_eq!(report.removed, 1, "exactly one removal expected: {}", report);
    assert_eq!(report.archived, 1);
    assert!(!second.tree.exists(HOST_A, old), "archived expired partition is removed");
    assert!(second.tree.exists(HOST_A, recent));
    assert!(
        !second.store.calls_to("put").contains(&"20240101_host-a.tar.gz".to_string()),
        "an archived partition is never uploaded again"
    );
}

fn harness_with_single_archive(first: &Harness) -> Harness {
    let h = new_harness();
    h.tree.add_partition(HOST_A, date(2024, 1, 1));
    h.tree.add_partition(HOST_A, date(2024, 2, 1));
    let body = first.store.body("20240101_host-a.tar.gz").unwrap();
    h.store
        .seed("20240101_host-a.tar.gz", &body, utc(2024, 1, 2));
    h
}

#[rstest]
#[tokio::test]
async fn not_ripe_partitions_are_left_alone(harness: Harness) {
    harness.tree.add_partition(HOST_A, date(2024, 2, 10));

    let report = harness
        .local_driver(1, 15)
        .run(harness.tree.base(), utc(2024, 2, 10))
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.total(), 1);
    assert!(harness.store.calls_to("exists").is_empty(), "not-ripe partitions never reach the store");
    assert!(harness.store.calls_to("put").is_empty());
}

#[rstest]
#[tokio::test]
async fn second_pass_without_changes_uploads_nothing(harness: Harness) {
    harness.tree.add_partition(HOST_A, date(2024, 2, 5));
    harness.tree.add_partition(HOST_B, date(2024, 2, 6));
    let now = utc(2024, 2, 10);
    let driver = harness.local_driver(1, 15);

    let first = driver.run(harness.tree.base(), now).await.unwrap();
    assert_eq!(first.archived, 2);
    let puts = harness.store.calls_to("put").len();

    let second = driver.run(harness.tree.base(), now).await.unwrap();
    assert_eq!(
        second,
        LifecycleReport {
            skipped: 2,
            ..Default::default()
        }
    );
    assert_eq!(harness.store.calls_to("put").len(), puts, "no duplicate uploads");
}

#[rstest]
#[tokio::test]
async fn archived_and_expired_partition_is_removed_once(harness: Harness) {
    let day = date(2024, 1, 1);
    harness.tree.add_partition(HOST_A, day);
    harness
        .store
        .seed("20240101_host-a.tar.gz", b"archived", utc(2024, 1, 2));

    let report = harness
        .local_driver(1, 15)
        .run(harness.tree.base(), utc(2024, 2, 10))
        .await
        .unwrap();

    assert_eq!(report.removed, 1);
    assert_eq!(report.archived, 0);
    assert!(harness.store.calls_to("put").is_empty());
    assert!(!harness.tree.exists(HOST_A, day));
    assert!(harness.tree.dir.path().join(HOST_A).exists(), "host bucket itself is kept");
}

#[rstest]
#[tokio::test]
async fn malformed_directories_are_excluded(harness: Harness) {
    harness.tree.add_partition(HOST_A, date(2024, 2, 1));
    harness.tree.add_raw_dir(HOST_A, "lost+found");
    harness.tree.add_raw_dir(HOST_A, "2024-13-45");
    harness.tree.add_file("host-a/notes.txt", b"not a partition");

    let report = harness
        .local_driver(1, 15)
        .run(harness.tree.base(), utc(2024, 2, 10))
        .await
        .unwrap();

    assert_eq!(report.total(), 1, "only the dated directory is a partition: {}", report);
    assert_eq!(report.archived, 1);
    assert!(harness.tree.dir.path().join("host-a/lost+found").exists());
}

#[rstest]
#[tokio::test]
async fn unpadded_date_directory_is_never_reaped(harness: Harness) {
    let day = date(2024, 1, 1);
    harness.tree.add_partition(HOST_A, day);
    let unpadded = harness.tree.add_file("host-a/2024-1-1/only-here.log", b"never uploaded");
    harness
        .store
        .seed("20240101_host-a.tar.gz", b"archived", utc(2024, 1, 2));

    let report = harness
        .local_driver(1, 15)
        .run(harness.tree.base(), utc(2024, 2, 10))
        .await
        .unwrap();

    assert_eq!(report.removed, 1, "{}", report);
    assert_eq!(report.total(), 1, "2024-1-1 is not a partition: {}", report);
    assert!(!harness.tree.exists(HOST_A, day));
    assert!(unpadded.exists(), "data that was never archived must survive");
    assert!(harness.store.calls_to("put").is_empty());
}

#[rstest]
#[tokio::test]
async fn archive_holds_the_partition_directory(harness: Harness) {
    harness.tree.add_partition(HOST_A, date(2024, 2, 1));
    harness.tree.add_file("host-a/2024-02-01/nested/kern.log", b"kernel");

    let report = harness
        .local_driver(1, 15)
        .run(harness.tree.base(), utc(2024, 2, 10))
        .await
        .unwrap();
    assert_eq!(report.archived, 1, "{}", report);

    let body = harness.store.body("20240201_host-a.tar.gz").unwrap();
    let tarball = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(tarball.path(), &body).unwrap();
    let listing = std::process::Command::new("tar")
        .arg("-tzf")
        .arg(tarball.path())
        .output()
        .unwrap();
    assert!(listing.status.success(), "not a gzip tar: {:?}", listing);

    let entries: Vec<String> = String::from_utf8_lossy(&listing.stdout)
        .lines()
        .map(|l| l.trim_start_matches("./").to_string())
        .collect();
    assert!(!entries.is_empty());
    assert!(
        entries.iter().all(|e| e.starts_with("2024-02-01/") || e == "2024-02-01"),
        "single top-level member expected: {:?}",
        entries
    );
    assert!(entries.contains(&"2024-02-01/syslog.log".to_string()), "{:?}", entries);
    assert!(entries.contains(&"2024-02-01/nested/kern.log".to_string()), "{:?}", entries);
}

#[rstest]
#[tokio::test]
async fn packaging_failure_is_isolated(harness: Harness) {
    harness.tree.add_partition(HOST_A, date(2024, 2, 1));
    let broken = harness.tree.add_partition(HOST_A, date(2024, 2, 2));
    harness.tree.add_partition(HOST_A, date(2024, 2, 3));

    let executor = Arc::new(ScriptedExecutor::new().fail_when(
        "2024-02-02",
        2,
        "tar: 2024-02-02: Cannot open: Permission denied",
    ));
    let report = harness
        .driver(executor, 1, 15)
        .run(harness.tree.base(), utc(2024, 2, 10))
        .await
        .unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(report.archived, 2);
    assert_eq!(report.failed, vec![broken.to_str().unwrap().to_string()]);
    assert!(broken.join("syslog.log").exists(), "failed partition is untouched");
    assert!(!harness.store.keys().contains(&"20240202_host-a.tar.gz".to_string()));
    assert!(
        file_names(harness.staging.path()).is_empty(),
        "staged archives are cleaned up"
    );
}

#[rstest]
#[tokio::test]
async fn unreachable_store_aborts_before_scanning(harness: Harness) {
    let day = date(2024, 1, 1);
    harness.tree.add_partition(HOST_A, day);
    harness.store.set_unavailable(true);

    let executor = Arc::new(ScriptedExecutor::new());
    let err = harness
        .driver(executor.clone(), 1, 15)
        .run(harness.tree.base(), utc(2024, 2, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::StoreUnavailable(_)), "got {}", err);
    assert!(err.is_fatal());
    assert!(executor.commands().is_empty(), "nothing ran on the host");
    assert!(harness.tree.exists(HOST_A, day));
}

#[rstest]
#[tokio::test]
async fn missing_base_path_is_a_scan_error(harness: Harness) {
    let missing = harness.tree.dir.path().join("nope");
    let err = harness
        .local_driver(1, 15)
        .run(missing.to_str().unwrap(), utc(2024, 2, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Scan { .. }), "got {}", err);
}

#[test]
fn rotated_log_reap_age_below_floor_is_rejected() {
    let err = RetentionPolicy::from_days(
        retention::OSSEC_RIPE_DAYS,
        10,
        retention::OSSEC_REAP_FLOOR_DAYS,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        ConfigError::BelowSafetyFloor {
            days: 10,
            floor_days: 30,
            ..
        }
    ));
}
