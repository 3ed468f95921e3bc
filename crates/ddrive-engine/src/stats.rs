//! Storage usage summary over the cached record set.

use ddrive_core::FileRecord;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveStats {
    /// Bytes the user's own (non-duplicate) uploads occupy
    pub used_bytes: u64,
    /// Bytes that deduplicated against content already in the store
    pub saved_bytes: u64,
    /// Records with content (placeholders excluded)
    pub file_count: usize,
    pub quota_bytes: u64,
    pub remaining_bytes: u64,
    /// `used / quota * 100`, capped at 100
    pub usage_percent: f64,
}

impl DriveStats {
    pub fn compute(records: &[FileRecord], quota_bytes: u64) -> Self {
        let used_bytes: u64 = records
            .iter()
            .filter(|r| !r.is_duplicate)
            .map(|r| r.size)
            .sum();
        let saved_bytes: u64 = records
            .iter()
            .filter(|r| r.is_duplicate)
            .map(|r| r.size)
            .sum();
        let file_count = records.iter().filter(|r| r.size != 0).count();

        let usage_percent = if quota_bytes == 0 {
            100.0
        } else {
            (used_bytes as f64 / quota_bytes as f64 * 100.0).min(100.0)
        };

        DriveStats {
            used_bytes,
            saved_bytes,
            file_count,
            quota_bytes,
            remaining_bytes: quota_bytes.saturating_sub(used_bytes),
            usage_percent,
        }
    }
}
