//! Remote object-store backend.

use super::usage::{self, BucketUsage, UsageRecord};
use super::{key, BackendKind, DataType, ObjectMeta, StorageError, StorageLimits};
use crate::cloud_storage::{ObjectStore, ObjectStoreError, S3ObjectStore};
use crate::config::Config;
use crate::payload::Payload;
use chrono::Utc;
use md5::{Digest, Md5};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Schema tag attached to every uploaded object.
const FORMAT_VERSION: &str = "1";

/// Object-store backend with a one-shot availability decision.
///
/// The bucket is probed exactly once, at construction. A failed probe
/// leaves the store unavailable for the life of the process; every
/// operation then fails fast with [`StorageError::Unavailable`] and the
/// manager stays on the local backend.
pub struct RemoteStore {
    client: Option<Arc<dyn ObjectStore>>,
    limits: StorageLimits,
    verify_writes: bool,
    enabled: bool,
    configured: bool,
}

impl RemoteStore {
    /// Connect per the loaded config: build the S3 client and probe the
    /// bucket. Disabled or incomplete remote settings skip the probe.
    pub async fn connect(config: &Config) -> Self {
        let limits = config.limits();
        let verify_writes = config.verify_remote_writes;
        if !config.remote_enabled {
            info!("remote storage disabled, running local-only");
            return Self::offline(false, false, limits, verify_writes);
        }
        let s3_config = match config.s3_config() {
            Some(s3_config) => s3_config,
            None => {
                warn!("remote storage enabled but not fully configured, running local-only");
                return Self::offline(true, false, limits, verify_writes);
            }
        };
        let client = match S3ObjectStore::new(s3_config).await {
            Ok(client) => client,
            Err(e) => {
                warn!("failed to build S3 client: {e}");
                return Self::offline(true, true, limits, verify_writes);
            }
        };
        Self::with_client(Arc::new(client), limits, verify_writes).await
    }

    /// Wrap an already-built client. The probe still runs here; tests and
    /// alternative stores inject through this constructor.
    pub async fn with_client(
        client: Arc<dyn ObjectStore>,
        limits: StorageLimits,
        verify_writes: bool,
    ) -> Self {
        match client.head_bucket().await {
            Ok(()) => {
                info!("remote storage available");
                RemoteStore {
                    client: Some(client),
                    limits,
                    verify_writes,
                    enabled: true,
                    configured: true,
                }
            }
            Err(e) => {
                warn!("remote storage probe failed, running local-only: {e}");
                Self::offline(true, true, limits, verify_writes)
            }
        }
    }

    fn offline(
        enabled: bool,
        configured: bool,
        limits: StorageLimits,
        verify_writes: bool,
    ) -> Self {
        RemoteStore {
            client: None,
            limits,
            verify_writes,
            enabled,
            configured,
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    /// Whether config asked for remote storage at all. False means the
    /// local-only mode was chosen, not degraded into.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether complete remote settings were present, regardless of how
    /// the probe went.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn limits(&self) -> StorageLimits {
        self.limits
    }

    fn client(&self) -> Result<&Arc<dyn ObjectStore>, StorageError> {
        self.client.as_ref().ok_or(StorageError::Unavailable)
    }

    /// Upload one payload. The size ceiling applies to the serialized
    /// form; object metadata carries provenance for later auditing.
    pub async fn save(
        &self,
        key: &str,
        payload: &Payload,
        user: Option<&str>,
        data_type: DataType,
    ) -> Result<(), StorageError> {
        let client = self.client()?;
        let bytes = payload.to_bytes()?;
        let size_bytes = bytes.len() as u64;
        if size_bytes > self.limits.max_object_bytes {
            return Err(StorageError::TooLarge {
                size_bytes,
                max_bytes: self.limits.max_object_bytes,
            });
        }

        let mut metadata = HashMap::new();
        metadata.insert("uploaded-at".to_string(), Utc::now().to_rfc3339());
        metadata.insert("data-type".to_string(), data_type.as_str().to_string());
        metadata.insert("format-version".to_string(), FORMAT_VERSION.to_string());
        if let Some(user) = user {
            metadata.insert("user-scope".to_string(), user.to_string());
        }

        let etag = client
            .put_object(key, &bytes, payload.content_type().as_str(), &metadata)
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;

        if self.verify_writes {
            if let Err(e) = self.verify_upload(key, &bytes, etag.as_deref()).await {
                // Remove the bad write so it cannot shadow the local copy
                // the caller keeps on failure.
                if let Err(del) = client.delete_object(key).await {
                    warn!("failed to remove unverified {key}: {del}");
                }
                return Err(e);
            }
        }

        debug!("saved {key} remotely ({size_bytes} bytes, {})", payload.kind());
        Ok(())
    }

    /// Confirm an upload before the caller prunes its local copy. Simple
    /// puts return an MD5 ETag; anything else falls back to a re-fetch.
    async fn verify_upload(
        &self,
        key: &str,
        bytes: &[u8],
        etag: Option<&str>,
    ) -> Result<(), StorageError> {
        let digest = hex::encode(Md5::digest(bytes));
        if let Some(etag) = etag {
            if etag.eq_ignore_ascii_case(&digest) {
                return Ok(());
            }
        }
        let fetched = self
            .client()?
            .get_object(key)
            .await
            .map_err(|e| StorageError::Remote(format!("verify {key}: {e}")))?;
        if fetched != bytes {
            return Err(StorageError::Remote(format!(
                "verify {key}: stored bytes differ from upload"
            )));
        }
        Ok(())
    }

    pub async fn load(&self, key: &str) -> Result<Option<Payload>, StorageError> {
        let client = self.client()?;
        let bytes = match client.get_object(key).await {
            Ok(bytes) => bytes,
            Err(ObjectStoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(StorageError::Remote(e.to_string())),
        };
        let filename = key.rsplit('/').next().unwrap_or(key);
        Ok(Some(Payload::from_bytes(filename, bytes)?))
    }

    /// Listing under a namespace prefix. Zero-length keys are directory
    /// markers left by some S3 tools, not real objects.
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let client = self.client()?;
        let objects = client
            .list_objects(prefix)
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        Ok(objects
            .into_iter()
            .filter(|o| o.size_bytes > 0)
            .map(|o| {
                let filename = o.key.rsplit('/').next().unwrap_or(&o.key).to_string();
                ObjectMeta::new(filename, o.size_bytes, o.last_modified, BackendKind::Remote)
            })
            .collect())
    }

    /// Just the key set under a prefix, for duplicate checks.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let client = self.client()?;
        let objects = client
            .list_objects(prefix)
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        Ok(objects
            .into_iter()
            .filter(|o| o.size_bytes > 0)
            .map(|o| o.key)
            .collect())
    }

    /// Delete with an exact-key probe first, so callers learn whether
    /// anything was actually removed. The client contract has no
    /// head-object; one LIST page answers the question.
    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let client = self.client()?;
        let existing = client
            .list_objects(key)
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        if !existing.iter().any(|o| o.key == key) {
            return Ok(false);
        }
        client
            .delete_object(key)
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        debug!("deleted remote {key}");
        Ok(true)
    }

    /// Fresh per-user usage from a live listing.
    pub async fn usage(&self, user: &str) -> Result<UsageRecord, StorageError> {
        let client = self.client()?;
        let prefix = key::user_prefix(user)?;
        let objects = client
            .list_objects(&prefix)
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        let mut record = UsageRecord::default();
        for obj in objects.iter().filter(|o| o.size_bytes > 0) {
            record.add(usage::data_type_segment(&obj.key), obj.size_bytes);
        }
        Ok(record.finish(self.limits.user_quota_bytes))
    }

    /// Whole-bucket accounting with a per-user breakdown and the cleanup
    /// recommendation flag.
    pub async fn bucket_usage(&self) -> Result<BucketUsage, StorageError> {
        let client = self.client()?;
        let objects = client
            .list_objects("")
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        let mut totals = UsageRecord::default();
        let mut by_user: BTreeMap<String, u64> = BTreeMap::new();
        for obj in objects.iter().filter(|o| o.size_bytes > 0) {
            totals.add(usage::data_type_segment(&obj.key), obj.size_bytes);
            *by_user
                .entry(usage::user_segment(&obj.key).to_string())
                .or_insert(0) += obj.size_bytes;
        }
        let totals = totals.finish(self.limits.bucket_quota_bytes);
        let cleanup_recommended = totals
            .quota_percent
            .map(|p| p >= self.limits.cleanup_threshold_percent)
            .unwrap_or(false);
        Ok(BucketUsage {
            totals,
            by_user,
            cleanup_recommended,
        })
    }
}
