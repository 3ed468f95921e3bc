use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Final path segment of the zero-byte record that keeps an empty
/// directory visible in the flat record set (e.g. `docs/work/.keep`).
pub const PLACEHOLDER_NAME: &str = ".keep";

/// Opaque server-assigned record identifier.
///
/// The store may emit it as a JSON string or integer; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        FileId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => FileId(s),
            RawId::Number(n) => FileId(n.to_string()),
        })
    }
}

/// A file as the remote store reports it. Records are created by upload and
/// destroyed by delete; they are never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// `/`-delimited path, no leading slash, unique per user
    #[serde(rename = "filename")]
    pub path: String,
    pub size: u64,
    /// SHA-256 of the content (64 hex chars)
    #[serde(rename = "hash")]
    pub content_hash: String,
    #[serde(rename = "content_type", default = "default_media_type")]
    pub media_type: String,
    #[serde(rename = "upload_timestamp")]
    pub uploaded_at: DateTime<Utc>,
    /// true if another record already held this content when it was uploaded
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(rename = "download_url", default)]
    pub download_locator: Option<String>,
}

fn default_media_type() -> String {
    "application/octet-stream".into()
}

impl FileRecord {
    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// True for the zero-byte directory marker records.
    pub fn is_placeholder(&self) -> bool {
        self.name() == PLACEHOLDER_NAME
    }
}
