//! Upload batch inputs and results

use bytes::Bytes;
use ddrive_core::{DriveError, DriveResult, FileRecord};
use std::path::Path;

/// Progress callback type (items_done, items_total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// One file to upload into the current directory.
#[derive(Debug, Clone)]
pub struct UploadInput {
    /// Bare file name; the destination is `current_path + name`
    pub name: String,
    pub bytes: Bytes,
    pub media_type: String,
}

impl UploadInput {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        UploadInput {
            name: name.into(),
            bytes: bytes.into(),
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Read a local file into memory, named after its final path component.
    pub async fn from_path(path: &Path) -> DriveResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DriveError::Validation(format!("not a file path: {}", path.display()))
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(UploadInput::new(name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Result of one item in a batch.
#[derive(Debug)]
pub struct ItemOutcome {
    pub name: String,
    /// Destination record path
    pub path: String,
    pub result: DriveResult<FileRecord>,
}

/// Per-item outcomes of an upload batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &FileRecord> {
        self.items.iter().filter_map(|i| i.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&ItemOutcome, &DriveError)> {
        self.items
            .iter()
            .filter_map(|i| i.result.as_ref().err().map(|e| (i, e)))
    }

    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|i| i.result.is_ok())
    }

    /// Successfully stored bytes the server already held (deduplicated).
    pub fn deduplicated_bytes(&self) -> u64 {
        self.succeeded()
            .filter(|r| r.is_duplicate)
            .map(|r| r.size)
            .sum()
    }
}
