//! Unified storage over a local directory and a remote object store.
//!
//! Object keys look like `users/{user}/{data_type}/{filename}` for
//! user-scoped data and `{data_type}/{filename}` for shared artifacts. The
//! same key is a relative filesystem path locally and an object key in the
//! bucket, so objects move between backends without renaming.
//!
//! [`manager::StorageManager`] is the façade applications talk to. It
//! prefers the remote backend whenever its startup probe succeeded and
//! keeps a single authoritative copy of every object.

pub mod key;
pub mod local;
pub mod manager;
pub mod migrate;
pub mod remote;
pub mod usage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use key::{object_key, prefix, user_prefix, DataType};
pub use local::LocalStore;
pub use manager::{StorageInfo, StorageManager};
pub use migrate::MigrationReport;
pub use remote::RemoteStore;
pub use usage::{BucketUsage, CombinedUsage, UsageRecord};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid key segment: {0}")]
    InvalidKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("object store error: {0}")]
    Remote(String),
    #[error("remote backend unavailable")]
    Unavailable,
    #[error("object too large: {size_bytes} bytes (limit {max_bytes})")]
    TooLarge { size_bytes: u64, max_bytes: u64 },
}

/// Which backend produced or holds an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Remote,
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One listing entry, normalized across backends.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectMeta {
    pub filename: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub last_modified: Option<DateTime<Utc>>,
    pub origin: BackendKind,
}

impl ObjectMeta {
    pub fn new(
        filename: String,
        size_bytes: u64,
        last_modified: Option<DateTime<Utc>>,
        origin: BackendKind,
    ) -> Self {
        ObjectMeta {
            filename,
            size_bytes,
            size_mb: usage::mb(size_bytes),
            last_modified,
            origin,
        }
    }
}

/// Capacity settings the remote backend enforces or reports against.
///
/// Only `max_object_bytes` is enforced (per save). Quotas shape usage
/// reports; nothing refuses a write because a quota is full.
#[derive(Debug, Clone, Copy)]
pub struct StorageLimits {
    pub max_object_bytes: u64,
    pub user_quota_bytes: Option<u64>,
    pub bucket_quota_bytes: Option<u64>,
    pub cleanup_threshold_percent: f64,
}
