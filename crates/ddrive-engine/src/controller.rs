//! Drive controller: owns the cached record set and the navigation state,
//! and drives every mutation through [`DriveApi`].
//!
//! The record set is the only state; the directory view is projected from it
//! on every [`DriveController::view`] call.

use bytes::Bytes;
use ddrive_client::{DriveApi, UploadForm};
use ddrive_core::{DriveError, DriveResult, FileId, FileRecord, PLACEHOLDER_NAME};
use ddrive_hash::{fingerprint, EMPTY_FINGERPRINT};
use ddrive_view::{breadcrumbs, file_name, normalize_dir, parent_dir, project, sanitize_folder_name, ProjectedView};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::stats::DriveStats;
use crate::upload::{BatchReport, ItemOutcome, ProgressFn, UploadInput, DEFAULT_MEDIA_TYPE};

/// Default cap on files per upload batch.
pub const DEFAULT_MAX_BATCH_FILES: usize = 20;

/// How a download ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Content written to this local file
    Saved(PathBuf),
    /// Transfer failed; open the locator directly instead
    Navigate(String),
}

pub struct DriveController {
    api: DriveApi,
    records: Vec<FileRecord>,
    current_path: String,
    search_query: String,
    max_batch_files: usize,
}

impl DriveController {
    pub fn new(api: DriveApi) -> Self {
        DriveController {
            api,
            records: Vec::new(),
            current_path: String::new(),
            search_query: String::new(),
            max_batch_files: DEFAULT_MAX_BATCH_FILES,
        }
    }

    pub fn with_max_batch_files(mut self, max: usize) -> Self {
        self.max_batch_files = max;
        self
    }

    pub fn api(&self) -> &DriveApi {
        &self.api
    }

    // ── Record set ────────────────────────────────────────────────────────────

    /// Replace the cached record set with the server's listing.
    pub async fn load(&mut self) -> DriveResult<()> {
        self.records = self.api.list_files().await?;
        debug!(records = self.records.len(), "record set loaded");
        Ok(())
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn find_by_path(&self, path: &str) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.path == path)
    }

    fn find(&self, id: &FileId) -> DriveResult<&FileRecord> {
        self.records
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| DriveError::NotFound(format!("no record with id {id}")))
    }

    // ── Navigation ────────────────────────────────────────────────────────────

    pub fn view(&self) -> ProjectedView<'_> {
        project(&self.records, &self.current_path, &self.search_query)
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn is_searching(&self) -> bool {
        !self.search_query.is_empty()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Enter a directory. Clears any active search.
    pub fn navigate(&mut self, path: &str) {
        self.current_path = normalize_dir(path);
        self.search_query.clear();
    }

    pub fn navigate_up(&mut self) {
        let parent = parent_dir(&self.current_path);
        self.navigate(&parent);
    }

    pub fn breadcrumbs(&self) -> Vec<(String, String)> {
        breadcrumbs(&self.current_path)
    }

    pub fn search(&mut self, query: &str) {
        self.search_query = query.to_string();
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Upload a batch into the current directory, one file at a time.
    ///
    /// A failed item is logged and recorded in the report; the remaining
    /// items are still attempted. The record set is reloaded afterwards.
    pub async fn upload(
        &mut self,
        inputs: Vec<UploadInput>,
        progress: Option<&ProgressFn>,
    ) -> DriveResult<BatchReport> {
        if inputs.len() > self.max_batch_files {
            return Err(DriveError::Validation(format!(
                "batch of {} files exceeds the limit of {}",
                inputs.len(),
                self.max_batch_files
            )));
        }

        let total = inputs.len() as u64;
        let mut report = BatchReport::default();

        for (i, input) in inputs.into_iter().enumerate() {
            let path = format!("{}{}", self.current_path, input.name);
            if let Some(cb) = progress {
                cb(i as u64, total, &format!("[{}/{}] {}", i + 1, total, path));
            }

            let result = self.upload_one(&path, input.name.clone(), input.bytes, input.media_type).await;
            match &result {
                Ok(record) => info!(
                    path = %record.path,
                    size = record.size,
                    duplicate = record.is_duplicate,
                    "uploaded"
                ),
                Err(e) => warn!(path = %path, "upload failed: {e}"),
            }
            report.items.push(ItemOutcome {
                name: input.name,
                path,
                result,
            });
        }

        if let Some(cb) = progress {
            cb(total, total, "done");
        }
        self.reload_after("upload").await;
        Ok(report)
    }

    async fn upload_one(
        &self,
        path: &str,
        name: String,
        bytes: Bytes,
        media_type: String,
    ) -> DriveResult<FileRecord> {
        let form = UploadForm {
            path: path.to_string(),
            fingerprint: fingerprint(&bytes),
            size: bytes.len() as u64,
            file_name: name,
            media_type,
            bytes,
        };
        self.api.upload_file(form).await
    }

    /// Remove a record: drop it locally first, then delete it remotely.
    /// If the remote delete fails, the record set is reloaded from the
    /// server and the error is returned.
    pub async fn delete(&mut self, id: &FileId) -> DriveResult<()> {
        self.find(id)?;
        self.records.retain(|r| &r.id != id);

        match self.api.delete_file(id).await {
            Ok(()) => {
                info!(id = %id, "deleted");
                Ok(())
            }
            Err(e) => {
                warn!(id = %id, "delete failed, reconciling with server: {e}");
                self.reload_after("delete").await;
                Err(e)
            }
        }
    }

    /// Create `name` under the current directory by uploading its
    /// zero-byte placeholder.
    pub async fn create_folder(&mut self, name: &str) -> DriveResult<String> {
        let name = sanitize_folder_name(name)
            .ok_or_else(|| DriveError::Validation(format!("invalid folder name: {name:?}")))?;
        let folder = format!("{}{}/", self.current_path, name);
        let placeholder = format!("{folder}{PLACEHOLDER_NAME}");

        if self.find_by_path(&placeholder).is_some() {
            return Err(DriveError::Validation(format!("folder {folder} already exists")));
        }

        let form = UploadForm {
            path: placeholder,
            fingerprint: EMPTY_FINGERPRINT.to_string(),
            size: 0,
            file_name: PLACEHOLDER_NAME.to_string(),
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            bytes: Bytes::new(),
        };
        self.api.upload_file(form).await?;
        info!(folder = %folder, "folder created");

        self.reload_after("create_folder").await;
        Ok(folder)
    }

    /// Fetch a record's content into `dest_dir`, named after the record.
    ///
    /// Any transfer or write failure degrades to
    /// [`DownloadOutcome::Navigate`] with the record's locator.
    pub async fn download(&self, id: &FileId, dest_dir: &Path) -> DriveResult<DownloadOutcome> {
        let record = self.find(id)?;
        let locator = record.download_locator.clone().ok_or_else(|| {
            DriveError::Validation(format!("{} has no download locator", record.path))
        })?;

        let name = match file_name(&record.path) {
            "" | "." | ".." => record.id.as_str(),
            name => name,
        };
        let dest = dest_dir.join(name);

        match self.fetch_to(&locator, &dest).await {
            Ok(bytes) => {
                info!(path = %record.path, dest = %dest.display(), bytes, "downloaded");
                Ok(DownloadOutcome::Saved(dest))
            }
            Err(e) => {
                warn!(path = %record.path, "download failed, falling back to locator: {e}");
                Ok(DownloadOutcome::Navigate(locator))
            }
        }
    }

    async fn fetch_to(&self, locator: &str, dest: &Path) -> DriveResult<u64> {
        let bytes = self.api.fetch(locator).await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    pub fn stats(&self, quota_bytes: u64) -> DriveStats {
        DriveStats::compute(&self.records, quota_bytes)
    }

    /// Best-effort refresh after a mutation; a failure leaves the current
    /// set in place.
    async fn reload_after(&mut self, operation: &str) {
        if let Err(e) = self.load().await {
            warn!(operation, "reloading record set failed: {e}");
        }
    }
}
