//! One-way migration of locally stored objects into the remote backend.
//!
//! Per-file and deliberately non-atomic: each file is uploaded, confirmed,
//! and only then removed locally. A crash mid-run leaves files either
//! migrated or untouched, and a second run picks up where the first left
//! off.

use super::local::LocalStore;
use super::remote::RemoteStore;
use super::usage::mb;
use super::{key, DataType};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of one migration run.
///
/// `success` reflects the run as a process; files that could not move are
/// counted and listed without aborting the sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub success: bool,
    pub migrated_count: usize,
    pub failed_count: usize,
    pub total_size_mb: f64,
    pub errors: Vec<String>,
}

pub(crate) async fn run(
    local: &LocalStore,
    remote: &RemoteStore,
    user: Option<&str>,
) -> MigrationReport {
    let mut report = MigrationReport {
        success: true,
        ..Default::default()
    };
    if !remote.is_available() {
        report.success = false;
        report.errors.push("remote backend unavailable".to_string());
        return report;
    }

    // Scopes to sweep: the requested user, or every user on disk plus the
    // unscoped namespaces.
    let mut scopes: Vec<Option<String>> = Vec::new();
    match user {
        Some(user) => scopes.push(Some(user.to_string())),
        None => {
            match local.list_users().await {
                Ok(users) => scopes.extend(users.into_iter().map(Some)),
                Err(e) => {
                    report.success = false;
                    report
                        .errors
                        .push(format!("cannot enumerate local users: {e}"));
                    return report;
                }
            }
            scopes.push(None);
        }
    }

    let mut migrated_bytes: u64 = 0;
    for scope in &scopes {
        for data_type in DataType::ALL {
            migrate_namespace(
                local,
                remote,
                scope.as_deref(),
                data_type,
                &mut report,
                &mut migrated_bytes,
            )
            .await;
        }
    }
    report.total_size_mb = mb(migrated_bytes);
    info!(
        "migration finished: {} migrated, {} failed, {} error(s)",
        report.migrated_count,
        report.failed_count,
        report.errors.len()
    );
    report
}

async fn migrate_namespace(
    local: &LocalStore,
    remote: &RemoteStore,
    user: Option<&str>,
    data_type: DataType,
    report: &mut MigrationReport,
    migrated_bytes: &mut u64,
) {
    let prefix = match key::prefix(user, data_type) {
        Ok(prefix) => prefix,
        Err(e) => {
            report.success = false;
            report.errors.push(e.to_string());
            return;
        }
    };
    let files = match local.list(&prefix).await {
        Ok(files) => files,
        Err(e) => {
            report.success = false;
            report.errors.push(format!("list local {prefix}: {e}"));
            return;
        }
    };
    if files.is_empty() {
        return;
    }

    // One remote listing per namespace answers every duplicate check.
    let existing: HashSet<String> = match remote.list_keys(&prefix).await {
        Ok(keys) => keys.into_iter().collect(),
        Err(e) => {
            report.success = false;
            report.errors.push(format!("list remote {prefix}: {e}"));
            return;
        }
    };

    for file in files {
        let object_key = format!("{prefix}{}", file.filename);
        if existing.contains(&object_key) {
            // The remote copy is authoritative; drop the stale local one
            // without re-uploading.
            debug!("{object_key} already in the bucket, pruning local copy");
            if let Err(e) = local.delete(&object_key).await {
                warn!("failed to prune {object_key}: {e}");
                report.errors.push(format!("prune {object_key}: {e}"));
            }
            continue;
        }

        let payload = match local.load(&object_key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => continue,
            Err(e) => {
                report.failed_count += 1;
                report.errors.push(format!("read {object_key}: {e}"));
                continue;
            }
        };
        if let Err(e) = remote.save(&object_key, &payload, user, data_type).await {
            report.failed_count += 1;
            report.errors.push(format!("upload {object_key}: {e}"));
            continue;
        }
        // Upload confirmed; only now does the local copy go away.
        if let Err(e) = local.delete(&object_key).await {
            warn!("uploaded {object_key} but could not remove the local copy: {e}");
            report.errors.push(format!("cleanup {object_key}: {e}"));
        }
        report.migrated_count += 1;
        *migrated_bytes += file.size_bytes;
    }
}
