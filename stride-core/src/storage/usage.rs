//! Usage accounting shared by both backends.
//!
//! Records are always computed fresh from a live listing; nothing here is
//! cached.

use serde::Serialize;
use std::collections::BTreeMap;

/// Bytes to MB with 2 decimals, the unit reports use.
pub(crate) fn mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// Namespace segment of a key: third segment for `users/{u}/{dt}/...`,
/// first segment for global `{dt}/...` keys.
pub(crate) fn data_type_segment(key: &str) -> &str {
    let mut parts = key.split('/');
    match parts.next() {
        Some("users") => {
            parts.next();
            parts.next().unwrap_or("unknown")
        }
        Some(first) => first,
        None => "unknown",
    }
}

/// Owner segment of a key; `global` for unscoped namespaces.
pub(crate) fn user_segment(key: &str) -> &str {
    let mut parts = key.split('/');
    match parts.next() {
        Some("users") => parts.next().unwrap_or("unknown"),
        _ => "global",
    }
}

/// Aggregated usage for one scope: a user on one backend, or a whole
/// bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageRecord {
    pub object_count: usize,
    pub total_bytes: u64,
    pub total_mb: f64,
    /// Bytes per data-type namespace.
    pub by_data_type: BTreeMap<String, u64>,
    /// Percent of the configured quota, when one applies.
    pub quota_percent: Option<f64>,
}

impl UsageRecord {
    pub(crate) fn add(&mut self, data_type: &str, size_bytes: u64) {
        self.object_count += 1;
        self.total_bytes += size_bytes;
        *self
            .by_data_type
            .entry(data_type.to_string())
            .or_insert(0) += size_bytes;
    }

    pub(crate) fn finish(mut self, quota_bytes: Option<u64>) -> Self {
        self.total_mb = mb(self.total_bytes);
        self.quota_percent = quota_bytes
            .filter(|q| *q > 0)
            .map(|q| (self.total_bytes as f64 / q as f64 * 10_000.0).round() / 100.0);
        self
    }
}

/// Whole-bucket view with a per-user breakdown.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BucketUsage {
    #[serde(flatten)]
    pub totals: UsageRecord,
    /// Bytes per user scope; unscoped namespaces bucket under `global`.
    pub by_user: BTreeMap<String, u64>,
    /// Set once usage crosses the cleanup threshold of the bucket quota.
    pub cleanup_recommended: bool,
}

/// Merged usage across backends for one user.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedUsage {
    pub total_bytes: u64,
    pub total_mb: f64,
    pub by_data_type: BTreeMap<String, u64>,
    pub remote: Option<UsageRecord>,
    pub local: UsageRecord,
}

impl CombinedUsage {
    pub(crate) fn merge(remote: Option<UsageRecord>, local: UsageRecord) -> Self {
        let mut by_data_type = local.by_data_type.clone();
        let mut total_bytes = local.total_bytes;
        if let Some(remote) = &remote {
            total_bytes += remote.total_bytes;
            for (dt, bytes) in &remote.by_data_type {
                *by_data_type.entry(dt.clone()).or_insert(0) += bytes;
            }
        }
        CombinedUsage {
            total_bytes,
            total_mb: mb(total_bytes),
            by_data_type,
            remote,
            local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mb_rounds_to_two_decimals() {
        assert_eq!(mb(0), 0.0);
        assert_eq!(mb(1_572_864), 1.5);
        assert_eq!(mb(1_058_062), 1.01);
        assert_eq!(mb(1), 0.0);
    }

    #[test]
    fn segments_from_both_key_shapes() {
        assert_eq!(data_type_segment("users/bob/routes/trip1.json"), "routes");
        assert_eq!(data_type_segment("models/pace-v3.bin"), "models");
        assert_eq!(user_segment("users/bob/routes/trip1.json"), "bob");
        assert_eq!(user_segment("models/pace-v3.bin"), "global");
    }

    #[test]
    fn record_accumulates_and_finishes() {
        let mut record = UsageRecord::default();
        record.add("routes", 600);
        record.add("routes", 400);
        record.add("fitness", 1_000);
        let record = record.finish(Some(4_000));

        assert_eq!(record.object_count, 3);
        assert_eq!(record.total_bytes, 2_000);
        assert_eq!(record.by_data_type["routes"], 1_000);
        assert_eq!(record.by_data_type["fitness"], 1_000);
        assert_eq!(record.quota_percent, Some(50.0));
    }

    #[test]
    fn no_quota_means_no_percent() {
        let mut record = UsageRecord::default();
        record.add("routes", 100);
        assert_eq!(record.finish(None).quota_percent, None);
    }

    #[test]
    fn merge_combines_backends() {
        let mut remote = UsageRecord::default();
        remote.add("routes", 1_000);
        let remote = remote.finish(None);

        let mut local = UsageRecord::default();
        local.add("routes", 200);
        local.add("fitness", 300);
        let local = local.finish(None);

        let combined = CombinedUsage::merge(Some(remote), local);
        assert_eq!(combined.total_bytes, 1_500);
        assert_eq!(combined.by_data_type["routes"], 1_200);
        assert_eq!(combined.by_data_type["fitness"], 300);
    }

    #[test]
    fn merge_without_remote_is_local_only() {
        let mut local = UsageRecord::default();
        local.add("models", 700);
        let combined = CombinedUsage::merge(None, local.finish(None));
        assert_eq!(combined.total_bytes, 700);
        assert!(combined.remote.is_none());
    }
}
