//! Local filesystem backend.

use super::usage::UsageRecord;
use super::{key, BackendKind, DataType, ObjectMeta, StorageError};
use crate::data_dir::DataDir;
use crate::payload::Payload;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Filesystem-backed store rooted at a [`DataDir`].
///
/// Always available. No size ceiling and no quota enforcement; `usage`
/// reports what is there.
pub struct LocalStore {
    data_dir: DataDir,
}

impl LocalStore {
    pub fn new(data_dir: DataDir) -> Self {
        LocalStore { data_dir }
    }

    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    /// Write a payload, creating parent directories as needed. Overwrites
    /// silently; the newest write wins.
    pub async fn save(&self, key: &str, payload: &Payload) -> Result<(), StorageError> {
        let path = self.data_dir.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = payload.to_bytes()?;
        tokio::fs::write(&path, &bytes).await?;
        debug!("saved {key} locally ({} bytes)", bytes.len());
        Ok(())
    }

    /// Read a payload back. A missing file is `Ok(None)`; a present but
    /// malformed `.json` file is an error.
    pub async fn load(&self, key: &str) -> Result<Option<Payload>, StorageError> {
        let path = self.data_dir.object_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let filename = key.rsplit('/').next().unwrap_or(key);
        Ok(Some(Payload::from_bytes(filename, bytes)?))
    }

    /// Files directly under a namespace prefix. A namespace that was never
    /// written to lists as empty.
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let dir = self.data_dir.object_path(prefix);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            objects.push(ObjectMeta::new(
                filename,
                meta.len(),
                modified_time(&meta),
                BackendKind::Local,
            ));
        }
        Ok(objects)
    }

    /// Remove a stored object. `Ok(false)` when nothing was there.
    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.data_dir.object_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("deleted local {key}");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Aggregate usage over every namespace of one user.
    pub async fn usage(
        &self,
        user: &str,
        quota_bytes: Option<u64>,
    ) -> Result<UsageRecord, StorageError> {
        let mut record = UsageRecord::default();
        for data_type in DataType::ALL {
            let prefix = key::prefix(Some(user), data_type)?;
            for meta in self.list(&prefix).await? {
                record.add(data_type.as_str(), meta.size_bytes);
            }
        }
        Ok(record.finish(quota_bytes))
    }

    /// User scopes present on disk, for migration sweeps.
    pub async fn list_users(&self) -> Result<Vec<String>, StorageError> {
        let users_dir = self.data_dir.users_dir();
        let mut entries = match tokio::fs::read_dir(&users_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut users = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.metadata().await?.is_dir() {
                users.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        users.sort();
        Ok(users)
    }
}

fn modified_time(meta: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    meta.modified().ok().map(DateTime::<Utc>::from)
}
