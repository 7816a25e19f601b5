//! Shared fixtures for storage integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use stride_core::cloud_storage::{ObjectStore, ObjectStoreError, RemoteObject};
use stride_core::data_dir::DataDir;
use stride_core::storage::{LocalStore, RemoteStore, StorageLimits, StorageManager};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// In-memory stand-in for the S3 client.
///
/// `fail_all` simulates a full outage (including the startup probe);
/// `fail_puts` rejects uploads only; `corrupt_puts` stores flipped bytes
/// so write verification can catch them.
#[derive(Default)]
pub struct MockObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    pub fail_all: AtomicBool,
    pub fail_puts: AtomicBool,
    pub corrupt_puts: AtomicBool,
}

impl MockObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed an object as if something else had uploaded it.
    pub fn insert_raw(&self, key: &str, data: &[u8]) {
        self.insert_raw_at(key, data, Some(Utc::now()));
    }

    pub fn insert_raw_at(&self, key: &str, data: &[u8], last_modified: Option<DateTime<Utc>>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: "application/octet-stream".to_string(),
                metadata: HashMap::new(),
                last_modified,
            },
        );
    }

    fn check_up(&self) -> Result<(), ObjectStoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::S3("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<Option<String>, ObjectStoreError> {
        self.check_up()?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::S3("simulated put failure".to_string()));
        }
        let mut stored = data.to_vec();
        if self.corrupt_puts.load(Ordering::SeqCst) {
            for byte in stored.iter_mut() {
                *byte = !*byte;
            }
        }
        let etag = hex::encode(Md5::digest(&stored));
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: stored,
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
                last_modified: Some(Utc::now()),
            },
        );
        Ok(Some(etag))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        self.check_up()?;
        match self.objects.lock().unwrap().get(key) {
            Some(obj) => Ok(obj.data.clone()),
            None => Err(ObjectStoreError::NotFound(key.to_string())),
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>, ObjectStoreError> {
        self.check_up()?;
        let objects = self.objects.lock().unwrap();
        let mut listed: Vec<RemoteObject> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| RemoteObject {
                key: key.clone(),
                size_bytes: obj.data.len() as u64,
                last_modified: obj.last_modified,
            })
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.check_up()?;
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn head_bucket(&self) -> Result<(), ObjectStoreError> {
        self.check_up()
    }
}

/// 1 MB object ceiling, small quotas so usage math is visible in tests.
pub fn test_limits() -> StorageLimits {
    StorageLimits {
        max_object_bytes: 1024 * 1024,
        user_quota_bytes: Some(10 * 1024 * 1024),
        bucket_quota_bytes: Some(20 * 1024 * 1024),
        cleanup_threshold_percent: 80.0,
    }
}

pub async fn manager_with_mock(dir: &TempDir) -> (StorageManager, Arc<MockObjectStore>) {
    manager_with_options(dir, false).await
}

pub async fn manager_with_verified_mock(dir: &TempDir) -> (StorageManager, Arc<MockObjectStore>) {
    manager_with_options(dir, true).await
}

async fn manager_with_options(
    dir: &TempDir,
    verify_writes: bool,
) -> (StorageManager, Arc<MockObjectStore>) {
    let mock = MockObjectStore::new();
    let local = LocalStore::new(DataDir::new(dir.path()));
    let remote = RemoteStore::with_client(mock.clone(), test_limits(), verify_writes).await;
    (StorageManager::new(local, remote), mock)
}

/// A manager whose remote probe failed at startup.
pub async fn local_only_manager(dir: &TempDir) -> StorageManager {
    let mock = MockObjectStore::new();
    mock.fail_all.store(true, Ordering::SeqCst);
    let local = LocalStore::new(DataDir::new(dir.path()));
    let remote = RemoteStore::with_client(mock, test_limits(), false).await;
    StorageManager::new(local, remote)
}

/// Write a file under the data dir directly, bypassing the manager.
pub fn seed_local_file(dir: &TempDir, key: &str, data: &[u8]) {
    let path = dir.path().join(key);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("create namespace dir");
    std::fs::write(path, data).expect("write seed file");
}
