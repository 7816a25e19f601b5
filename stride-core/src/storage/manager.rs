//! The storage façade applications talk to.

use super::local::LocalStore;
use super::migrate::{self, MigrationReport};
use super::remote::RemoteStore;
use super::usage::{BucketUsage, CombinedUsage, UsageRecord};
use super::{key, BackendKind, DataType, ObjectMeta, StorageError};
use crate::config::Config;
use crate::data_dir::DataDir;
use crate::payload::Payload;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Snapshot returned by [`StorageManager::info`].
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub preferred_backend: BackendKind,
    pub available_backends: Vec<BackendKind>,
    /// Distinct facts: a remote that was never asked for reads
    /// `enabled: false`, one asked for with incomplete settings reads
    /// `enabled: true, configured: false`.
    pub remote_enabled: bool,
    pub remote_configured: bool,
    pub local_directory: PathBuf,
    /// Fresh bucket accounting, when the remote backend is reachable.
    pub bucket_usage: Option<BucketUsage>,
}

/// One façade over both backends.
///
/// Built once through [`StorageManager::initialize`] (or assembled from
/// parts) and handed to whoever stores things; there is no global
/// instance. Remote is preferred whenever its startup probe succeeded;
/// local is the fallback and never refuses a write.
///
/// The success-or-not surface (`bool`, `Option`, empty `Vec`) is the
/// public API. Backend internals return typed errors and every degradation
/// is logged here before it is absorbed.
pub struct StorageManager {
    local: LocalStore,
    remote: RemoteStore,
    user_quota_bytes: Option<u64>,
}

impl StorageManager {
    /// Wire up both backends from config. The remote probe runs here,
    /// once; a failed probe leaves remote unavailable until restart.
    pub async fn initialize(config: &Config) -> Result<Self, StorageError> {
        let data_dir = DataDir::new(config.data_dir.clone());
        tokio::fs::create_dir_all(&data_dir).await?;
        let local = LocalStore::new(data_dir);
        let remote = RemoteStore::connect(config).await;
        let manager = StorageManager {
            local,
            remote,
            user_quota_bytes: config.limits().user_quota_bytes,
        };
        info!(
            "storage manager ready (preferred backend: {})",
            manager.preferred_backend()
        );
        Ok(manager)
    }

    /// Assemble from already-built backends. Tests and embedders inject
    /// here.
    pub fn new(local: LocalStore, remote: RemoteStore) -> Self {
        let user_quota_bytes = remote.limits().user_quota_bytes;
        StorageManager {
            local,
            remote,
            user_quota_bytes,
        }
    }

    /// Explicit end of the storage lifecycle.
    pub fn shutdown(self) {
        info!(
            "storage manager shut down (remote was {})",
            if self.remote.is_available() {
                "available"
            } else {
                "unavailable"
            }
        );
    }

    pub fn preferred_backend(&self) -> BackendKind {
        if self.remote.is_available() {
            BackendKind::Remote
        } else {
            BackendKind::Local
        }
    }

    /// Store a payload under its derived key. Remote first when available;
    /// a confirmed remote write prunes any stale local copy so exactly one
    /// backend holds the object. Returns whether anything stored it.
    pub async fn save(
        &self,
        payload: &Payload,
        user: Option<&str>,
        data_type: DataType,
        filename: &str,
    ) -> bool {
        let key = match key::object_key(user, data_type, filename) {
            Ok(key) => key,
            Err(e) => {
                error!("save rejected: {e}");
                return false;
            }
        };
        if self.remote.is_available() {
            match self.remote.save(&key, payload, user, data_type).await {
                Ok(()) => {
                    self.prune_local(&key).await;
                    return true;
                }
                Err(e) => {
                    warn!("remote save of {key} failed, falling back to local: {e}");
                }
            }
        }
        match self.local.save(&key, payload).await {
            Ok(()) => true,
            Err(e) => {
                error!("local save of {key} failed: {e}");
                false
            }
        }
    }

    /// Drop the local copy after a confirmed remote write. Best effort; a
    /// leftover copy is shadowed by remote precedence until a later save
    /// or migration prunes it.
    async fn prune_local(&self, key: &str) {
        match self.local.delete(key).await {
            Ok(true) => debug!("pruned local copy of {key}"),
            Ok(false) => {}
            Err(e) => warn!("failed to prune local copy of {key}: {e}"),
        }
    }

    /// Fetch a payload, remote first. Remote misses and errors fall
    /// through to the local copy.
    pub async fn load(
        &self,
        user: Option<&str>,
        data_type: DataType,
        filename: &str,
    ) -> Option<Payload> {
        let key = match key::object_key(user, data_type, filename) {
            Ok(key) => key,
            Err(e) => {
                error!("load rejected: {e}");
                return None;
            }
        };
        if self.remote.is_available() {
            match self.remote.load(&key).await {
                Ok(Some(payload)) => return Some(payload),
                Ok(None) => debug!("{key} not in the bucket, trying local"),
                Err(e) => warn!("remote load of {key} failed, trying local: {e}"),
            }
        }
        match self.local.load(&key).await {
            Ok(found) => found,
            Err(e) => {
                error!("local load of {key} failed: {e}");
                None
            }
        }
    }

    /// Merged listing for a namespace. Remote entries win filename
    /// collisions; newest first, entries without a timestamp last.
    pub async fn list(&self, user: Option<&str>, data_type: DataType) -> Vec<ObjectMeta> {
        let prefix = match key::prefix(user, data_type) {
            Ok(prefix) => prefix,
            Err(e) => {
                error!("list rejected: {e}");
                return Vec::new();
            }
        };
        let mut merged: Vec<ObjectMeta> = Vec::new();
        if self.remote.is_available() {
            match self.remote.list(&prefix).await {
                Ok(entries) => merged = entries,
                Err(e) => warn!("remote list of {prefix} failed: {e}"),
            }
        }
        match self.local.list(&prefix).await {
            Ok(entries) => {
                for entry in entries {
                    if !merged.iter().any(|m| m.filename == entry.filename) {
                        merged.push(entry);
                    }
                }
            }
            Err(e) => warn!("local list of {prefix} failed: {e}"),
        }
        merged.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        merged
    }

    /// Remove an object wherever it lives. True when either backend
    /// actually removed something.
    pub async fn delete(&self, user: Option<&str>, data_type: DataType, filename: &str) -> bool {
        let key = match key::object_key(user, data_type, filename) {
            Ok(key) => key,
            Err(e) => {
                error!("delete rejected: {e}");
                return false;
            }
        };
        let mut removed = false;
        if self.remote.is_available() {
            match self.remote.delete(&key).await {
                Ok(hit) => removed |= hit,
                Err(e) => warn!("remote delete of {key} failed: {e}"),
            }
        }
        match self.local.delete(&key).await {
            Ok(hit) => removed |= hit,
            Err(e) => warn!("local delete of {key} failed: {e}"),
        }
        removed
    }

    /// Merged usage for one user, computed fresh on every call.
    pub async fn usage(&self, user: &str) -> CombinedUsage {
        let remote = if self.remote.is_available() {
            match self.remote.usage(user).await {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("remote usage for {user} failed: {e}");
                    None
                }
            }
        } else {
            None
        };
        let local = match self.local.usage(user, self.user_quota_bytes).await {
            Ok(record) => record,
            Err(e) => {
                warn!("local usage for {user} failed: {e}");
                UsageRecord::default()
            }
        };
        CombinedUsage::merge(remote, local)
    }

    /// Move local objects into the bucket. See [`MigrationReport`] for how
    /// failures are accounted.
    pub async fn migrate_local_to_remote(&self, user: Option<&str>) -> MigrationReport {
        info!(
            "starting local-to-remote migration ({})",
            user.unwrap_or("all users")
        );
        migrate::run(&self.local, &self.remote, user).await
    }

    /// Current shape of the subsystem.
    pub async fn info(&self) -> StorageInfo {
        let bucket_usage = if self.remote.is_available() {
            match self.remote.bucket_usage().await {
                Ok(usage) => Some(usage),
                Err(e) => {
                    warn!("bucket usage unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };
        let mut available_backends = Vec::new();
        if self.remote.is_available() {
            available_backends.push(BackendKind::Remote);
        }
        available_backends.push(BackendKind::Local);
        StorageInfo {
            preferred_backend: self.preferred_backend(),
            available_backends,
            remote_enabled: self.remote.is_enabled(),
            remote_configured: self.remote.is_configured(),
            local_directory: self.local.data_dir().to_path_buf(),
            bucket_usage,
        }
    }
}
