use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("S3 error: {0}")]
    S3(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Connection settings for an S3-compatible object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
}

impl S3Config {
    pub fn validate(&self) -> Result<(), ObjectStoreError> {
        if self.bucket.trim().is_empty() {
            return Err(ObjectStoreError::Config(
                "bucket cannot be empty".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(ObjectStoreError::Config(
                "region cannot be empty".to_string(),
            ));
        }
        if self.access_key_id.trim().is_empty() {
            return Err(ObjectStoreError::Config(
                "access key ID cannot be empty".to_string(),
            ));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(ObjectStoreError::Config(
                "secret access key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One object as reported by LIST.
#[derive(Debug, Clone)]
pub struct RemoteObject {
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Operations the storage layer needs from an object store.
///
/// Kept narrow so tests can substitute an in-memory implementation and so
/// another store could slot in behind the same surface.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object. Returns the ETag when the service reports one.
    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<Option<String>, ObjectStoreError>;

    /// Fetch an object. A missing key is `NotFound`, not a generic error.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Every object under a prefix, paginating as needed.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>, ObjectStoreError>;

    /// Delete an object. Deleting an absent key is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Liveness and access probe against the configured bucket.
    async fn head_bucket(&self) -> Result<(), ObjectStoreError>;
}

/// Production S3 implementation.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from static credentials. Construction does not touch
    /// the network; `head_bucket` is the probe.
    pub async fn new(config: S3Config) -> Result<Self, ObjectStoreError> {
        config.validate()?;
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "stride-s3-config",
        );
        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint_url {
            let normalized = endpoint.trim_end_matches('/').to_string();
            info!("using custom S3 endpoint: {normalized}");
            aws_config_builder = aws_config_builder.endpoint_url(normalized);
        }
        let aws_config = aws_config_builder.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(true)
            .build();
        Ok(S3ObjectStore {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<Option<String>, ObjectStoreError> {
        debug!("put {key} ({} bytes)", data.len());
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(data.to_vec().into())
            .content_type(content_type);
        for (name, value) in metadata {
            req = req.metadata(name.as_str(), value.as_str());
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ObjectStoreError::S3(format!("put {key}: {e}")))?;
        Ok(resp.e_tag().map(|t| t.trim_matches('"').to_string()))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("{e}");
                if msg.contains("NoSuchKey") || msg.contains("not found") || msg.contains("404") {
                    ObjectStoreError::NotFound(key.to_string())
                } else {
                    ObjectStoreError::S3(format!("get {key}: {e}"))
                }
            })?;
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::S3(format!("read {key}: {e}")))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>, ObjectStoreError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token.take() {
                req = req.continuation_token(token);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| ObjectStoreError::S3(format!("list {prefix}: {e}")))?;

            for obj in resp.contents() {
                let Some(key) = obj.key() else { continue };
                objects.push(RemoteObject {
                    key: key.to_string(),
                    size_bytes: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }

            if resp.is_truncated() == Some(true) {
                continuation_token = resp.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::S3(format!("delete {key}: {e}")))?;
        debug!("deleted {key}");
        Ok(())
    }

    async fn head_bucket(&self) -> Result<(), ObjectStoreError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| ObjectStoreError::S3(format!("head bucket {}: {e}", self.bucket)))?;
        Ok(())
    }
}
