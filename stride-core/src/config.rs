use crate::cloud_storage::S3Config;
use crate::storage::StorageLimits;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

fn default_max_object_mb() -> u64 {
    100
}

fn default_user_quota_gb() -> Option<u64> {
    Some(5)
}

fn default_bucket_quota_gb() -> Option<u64> {
    Some(50)
}

fn default_cleanup_threshold() -> f64 {
    80.0
}

/// YAML config file structure for non-secret settings.
///
/// Credentials never live here; they come from the environment in every
/// mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigYaml {
    /// Base directory for locally stored objects
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Whether the remote backend should be attempted at all
    #[serde(default)]
    pub remote_enabled: bool,
    /// S3 bucket holding remote objects
    pub remote_bucket: Option<String>,
    /// S3 region
    pub remote_region: Option<String>,
    /// S3 endpoint (custom endpoint for MinIO etc.)
    pub remote_endpoint: Option<String>,
    /// Per-object ceiling enforced on remote saves, in MB
    #[serde(default = "default_max_object_mb")]
    pub max_object_mb: u64,
    /// Reported (not enforced) per-user quota, in GB. None = unlimited.
    #[serde(default = "default_user_quota_gb")]
    pub user_quota_gb: Option<u64>,
    /// Bucket quota the cleanup recommendation is computed against, in GB
    #[serde(default = "default_bucket_quota_gb")]
    pub bucket_quota_gb: Option<u64>,
    /// Bucket usage percent past which cleanup is recommended
    #[serde(default = "default_cleanup_threshold")]
    pub cleanup_threshold_percent: f64,
    /// Confirm remote writes (ETag/MD5 or re-fetch) before pruning local
    /// copies
    #[serde(default)]
    pub verify_remote_writes: bool,
}

/// Storage configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub remote_enabled: bool,
    pub remote_bucket: Option<String>,
    pub remote_region: Option<String>,
    pub remote_endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub max_object_mb: u64,
    pub user_quota_gb: Option<u64>,
    pub bucket_quota_gb: Option<u64>,
    pub cleanup_threshold_percent: f64,
    pub verify_remote_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            remote_enabled: false,
            remote_bucket: None,
            remote_region: None,
            remote_endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            max_object_mb: default_max_object_mb(),
            user_quota_gb: default_user_quota_gb(),
            bucket_quota_gb: default_bucket_quota_gb(),
            cleanup_threshold_percent: default_cleanup_threshold(),
            verify_remote_writes: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stride")
        .join("data")
}

impl Config {
    /// Load configuration. Dev mode (`STRIDE_DEV_MODE` set, or a `.env`
    /// file present) reads everything from the environment; otherwise
    /// `~/.stride/config.yaml` is consulted. A missing or unreadable file
    /// is not fatal: the result degrades to local-only defaults.
    pub fn load() -> Self {
        let dev_mode = std::env::var("STRIDE_DEV_MODE").is_ok() || dotenvy::dotenv().is_ok();
        if dev_mode {
            info!("loading config from environment (dev mode)");
            return Self::from_env();
        }
        let path = Self::config_yaml_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_yaml::from_str::<ConfigYaml>(&content) {
                Ok(yaml) => Self::from_yaml(yaml),
                Err(e) => {
                    warn!("invalid config at {}: {e}, using defaults", path.display());
                    Config::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no config file at {}, using defaults", path.display());
                Config::default()
            }
            Err(e) => {
                warn!("cannot read config at {}: {e}, using defaults", path.display());
                Config::default()
            }
        }
    }

    fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            data_dir: std::env::var("STRIDE_DATA_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            remote_enabled: std::env::var("STRIDE_REMOTE_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            remote_bucket: std::env::var("STRIDE_S3_BUCKET")
                .ok()
                .filter(|s| !s.is_empty()),
            remote_region: std::env::var("STRIDE_S3_REGION")
                .ok()
                .filter(|s| !s.is_empty()),
            remote_endpoint: std::env::var("STRIDE_S3_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            access_key_id: std::env::var("STRIDE_S3_ACCESS_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            secret_access_key: std::env::var("STRIDE_S3_SECRET_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            max_object_mb: std::env::var("STRIDE_MAX_OBJECT_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_object_mb),
            user_quota_gb: std::env::var("STRIDE_USER_QUOTA_GB")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.user_quota_gb),
            bucket_quota_gb: std::env::var("STRIDE_BUCKET_QUOTA_GB")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.bucket_quota_gb),
            cleanup_threshold_percent: std::env::var("STRIDE_CLEANUP_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cleanup_threshold_percent),
            verify_remote_writes: std::env::var("STRIDE_VERIFY_WRITES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    fn from_yaml(yaml: ConfigYaml) -> Self {
        let defaults = Config::default();
        Config {
            // STRIDE_DATA_DIR wins over the file in every mode.
            data_dir: std::env::var("STRIDE_DATA_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .or_else(|| yaml.data_dir.map(PathBuf::from))
                .unwrap_or(defaults.data_dir),
            remote_enabled: yaml.remote_enabled,
            remote_bucket: yaml.remote_bucket,
            remote_region: yaml.remote_region,
            remote_endpoint: yaml.remote_endpoint,
            access_key_id: std::env::var("STRIDE_S3_ACCESS_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            secret_access_key: std::env::var("STRIDE_S3_SECRET_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            max_object_mb: yaml.max_object_mb,
            user_quota_gb: yaml.user_quota_gb,
            bucket_quota_gb: yaml.bucket_quota_gb,
            cleanup_threshold_percent: yaml.cleanup_threshold_percent,
            verify_remote_writes: yaml.verify_remote_writes,
        }
    }

    fn config_yaml_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stride")
            .join("config.yaml")
    }

    /// Complete S3 settings, when everything needed is present.
    pub fn s3_config(&self) -> Option<S3Config> {
        Some(S3Config {
            bucket: self.remote_bucket.clone()?,
            region: self.remote_region.clone()?,
            access_key_id: self.access_key_id.clone()?,
            secret_access_key: self.secret_access_key.clone()?,
            endpoint_url: self.remote_endpoint.clone(),
        })
    }

    pub fn limits(&self) -> StorageLimits {
        StorageLimits {
            max_object_bytes: self.max_object_mb * 1024 * 1024,
            user_quota_bytes: self.user_quota_gb.map(|gb| gb * 1024 * 1024 * 1024),
            bucket_quota_bytes: self.bucket_quota_gb.map(|gb| gb * 1024 * 1024 * 1024),
            cleanup_threshold_percent: self.cleanup_threshold_percent,
        }
    }
}
