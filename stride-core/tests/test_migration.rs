//! Integration tests for local-to-remote migration.
//!
//! Tests:
//! - Files move per-file and local copies are pruned only after upload
//! - Duplicates are skipped without re-upload, runs are idempotent
//! - Per-file failures are reported without aborting the sweep
//! - User scoping and the unscoped namespaces

mod support;

use std::sync::atomic::Ordering;
use support::*;
use tempfile::TempDir;

fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_line_number(true)
        .with_target(false)
        .with_file(true)
        .try_init();
}

fn expected_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

#[tokio::test]
async fn migrates_local_files_and_prunes_them() {
    tracing_init();
    let dir = TempDir::new().expect("tempdir");

    let csv = "t".repeat(512 * 1024);
    seed_local_file(&dir, "users/bob/routes/trip1.json", br#"{"distance_km": 12.4}"#);
    seed_local_file(&dir, "users/bob/fitness/hr.csv", csv.as_bytes());
    seed_local_file(&dir, "models/pace-v3.bin", &[7u8; 128]);

    let (manager, mock) = manager_with_mock(&dir).await;
    let report = manager.migrate_local_to_remote(None).await;

    assert!(report.success, "errors: {:?}", report.errors);
    assert_eq!(report.migrated_count, 3);
    assert_eq!(report.failed_count, 0);
    assert!(report.errors.is_empty());

    let total = br#"{"distance_km": 12.4}"#.len() as u64 + 512 * 1024 + 128;
    assert_eq!(report.total_size_mb, expected_mb(total));

    assert!(mock.contains("users/bob/routes/trip1.json"));
    assert!(mock.contains("users/bob/fitness/hr.csv"));
    assert!(mock.contains("models/pace-v3.bin"));
    assert!(!dir.path().join("users/bob/routes/trip1.json").exists());
    assert!(!dir.path().join("users/bob/fitness/hr.csv").exists());
    assert!(!dir.path().join("models/pace-v3.bin").exists());
}

#[tokio::test]
async fn migration_is_idempotent() {
    tracing_init();
    let dir = TempDir::new().expect("tempdir");

    seed_local_file(&dir, "users/bob/routes/trip1.json", br#"{"n": 1}"#);
    seed_local_file(&dir, "users/bob/routes/trip2.json", br#"{"n": 2}"#);

    let (manager, mock) = manager_with_mock(&dir).await;
    let first = manager.migrate_local_to_remote(None).await;
    assert!(first.success);
    assert_eq!(first.migrated_count, 2);

    let second = manager.migrate_local_to_remote(None).await;
    assert!(second.success);
    assert_eq!(second.migrated_count, 0);
    assert_eq!(second.failed_count, 0);
    assert!(second.errors.is_empty());
    assert_eq!(second.total_size_mb, 0.0);
    assert_eq!(mock.len(), 2);
}

#[tokio::test]
async fn migration_skips_files_already_in_the_bucket() {
    tracing_init();
    let dir = TempDir::new().expect("tempdir");

    let canonical: &[u8] = br#"{"canonical": true}"#;
    let (manager, mock) = manager_with_mock(&dir).await;
    mock.insert_raw("users/bob/routes/trip.json", canonical);
    seed_local_file(&dir, "users/bob/routes/trip.json", br#"{"stale": true}"#);

    let report = manager.migrate_local_to_remote(Some("bob")).await;
    assert!(report.success);
    assert_eq!(report.migrated_count, 0, "duplicates are not re-uploaded");
    assert_eq!(report.failed_count, 0);

    // The remote copy stays authoritative; the stale local one is pruned.
    assert_eq!(
        mock.object("users/bob/routes/trip.json").expect("object").data,
        canonical
    );
    assert!(!dir.path().join("users/bob/routes/trip.json").exists());
}

#[tokio::test]
async fn per_file_failures_are_recorded_without_aborting() {
    tracing_init();
    let dir = TempDir::new().expect("tempdir");

    seed_local_file(&dir, "users/bob/routes/ok.json", br#"{"n": 1}"#);
    // Over the 1 MB test ceiling, so its upload is refused.
    seed_local_file(&dir, "users/bob/routes/huge.bin", &vec![0u8; 2 * 1024 * 1024]);

    let (manager, mock) = manager_with_mock(&dir).await;
    let report = manager.migrate_local_to_remote(Some("bob")).await;

    assert!(report.success, "per-file failures do not fail the run");
    assert_eq!(report.migrated_count, 1);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("huge.bin"), "error: {}", report.errors[0]);

    assert!(mock.contains("users/bob/routes/ok.json"));
    assert!(!mock.contains("users/bob/routes/huge.bin"));
    assert!(
        dir.path().join("users/bob/routes/huge.bin").exists(),
        "a file that failed to upload must keep its local copy"
    );
    assert!(!dir.path().join("users/bob/routes/ok.json").exists());
}

#[tokio::test]
async fn migration_reports_failure_when_remote_is_down() {
    tracing_init();
    let dir = TempDir::new().expect("tempdir");

    seed_local_file(&dir, "users/bob/routes/trip.json", br#"{"n": 1}"#);
    let manager = local_only_manager(&dir).await;

    let report = manager.migrate_local_to_remote(None).await;
    assert!(!report.success);
    assert_eq!(report.migrated_count, 0);
    assert_eq!(report.errors, vec!["remote backend unavailable".to_string()]);
    assert!(dir.path().join("users/bob/routes/trip.json").exists());
}

#[tokio::test]
async fn migration_flags_a_broken_remote_listing_as_process_failure() {
    tracing_init();
    let dir = TempDir::new().expect("tempdir");

    seed_local_file(&dir, "users/bob/routes/trip.json", br#"{"n": 1}"#);
    let (manager, mock) = manager_with_mock(&dir).await;
    mock.fail_all.store(true, Ordering::SeqCst);

    let report = manager.migrate_local_to_remote(Some("bob")).await;
    assert!(!report.success, "a namespace that cannot be checked fails the run");
    assert_eq!(report.failed_count, 0, "no per-file attempt was made");
    assert_eq!(report.errors.len(), 1);
    assert!(dir.path().join("users/bob/routes/trip.json").exists());
}

#[tokio::test]
async fn migration_scopes_to_one_user() {
    tracing_init();
    let dir = TempDir::new().expect("tempdir");

    seed_local_file(&dir, "users/bob/routes/bob.json", br#"{"n": 1}"#);
    seed_local_file(&dir, "users/alice/routes/alice.json", br#"{"n": 2}"#);
    seed_local_file(&dir, "models/shared.bin", &[1u8; 16]);

    let (manager, mock) = manager_with_mock(&dir).await;
    let report = manager.migrate_local_to_remote(Some("bob")).await;

    assert!(report.success);
    assert_eq!(report.migrated_count, 1);
    assert!(mock.contains("users/bob/routes/bob.json"));
    assert!(!mock.contains("users/alice/routes/alice.json"));
    assert!(!mock.contains("models/shared.bin"));
    assert!(dir.path().join("users/alice/routes/alice.json").exists());
    assert!(dir.path().join("models/shared.bin").exists());
}

#[tokio::test]
async fn unscoped_migration_covers_every_user_and_the_shared_namespaces() {
    tracing_init();
    let dir = TempDir::new().expect("tempdir");

    seed_local_file(&dir, "users/bob/routes/bob.json", br#"{"n": 1}"#);
    seed_local_file(&dir, "users/alice/fitness/alice.csv", b"time,hr\n");
    seed_local_file(&dir, "training_data/batch-01.bin", &[9u8; 64]);

    let (manager, mock) = manager_with_mock(&dir).await;
    let report = manager.migrate_local_to_remote(None).await;

    assert!(report.success);
    assert_eq!(report.migrated_count, 3);
    assert!(mock.contains("users/bob/routes/bob.json"));
    assert!(mock.contains("users/alice/fitness/alice.csv"));
    assert!(mock.contains("training_data/batch-01.bin"));
}
