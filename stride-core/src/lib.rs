//! Unified storage for per-user fitness and route data plus shared ML
//! artifacts.
//!
//! One façade ([`storage::StorageManager`]) over two backends: the local
//! filesystem (always available) and an S3-compatible bucket (preferred
//! when its startup probe succeeds). Objects keep a single authoritative
//! copy; listings, usage, and migration work across both backends.

pub mod cloud_storage;
pub mod config;
pub mod content_type;
pub mod data_dir;
pub mod payload;
pub mod storage;

pub use config::Config;
pub use payload::Payload;
pub use storage::{DataType, StorageManager};
