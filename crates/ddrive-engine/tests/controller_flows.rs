//! Integration tests: DriveController against an in-memory remote store
//! plugged in at the Transport seam.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use ddrive_client::{
    ApiRequest, ApiResponse, DriveApi, MemorySessionStore, Method, Pipeline, RateLimiter,
    RequestBody, Session, Transport,
};
use ddrive_core::{DriveError, DriveResult, FileId, FileRecord};
use ddrive_engine::{DownloadOutcome, DriveController, ProgressFn, UploadInput};
use ddrive_hash::{fingerprint, EMPTY_FINGERPRINT};
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct FakeStore {
    records: Mutex<Vec<FileRecord>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    next_id: Mutex<u64>,
    /// Record paths whose upload is answered with 500
    reject_uploads: Mutex<HashSet<String>>,
    reject_deletes: Mutex<bool>,
    requests: Mutex<Vec<(Method, String)>>,
    uploads: Mutex<Vec<(String, String, u64)>>,
}

impl FakeStore {
    fn seed(&self, path: &str, content: &[u8]) -> FileId {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = FileId::new(next.to_string());
        let locator = format!("https://media.test/{id}");
        self.contents
            .lock()
            .unwrap()
            .insert(locator.clone(), content.to_vec());
        self.records.lock().unwrap().push(FileRecord {
            id: id.clone(),
            path: path.into(),
            size: content.len() as u64,
            content_hash: fingerprint(content),
            media_type: "application/octet-stream".into(),
            uploaded_at: Utc::now(),
            is_duplicate: false,
            download_locator: Some(locator),
        });
        id
    }

    fn paths(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.path.clone())
            .collect()
    }

    fn json(status: u16, value: &impl serde::Serialize) -> DriveResult<ApiResponse> {
        Ok(ApiResponse::new(status, serde_json::to_vec(value).unwrap()))
    }
}

#[async_trait]
impl Transport for FakeStore {
    async fn send(&self, request: &ApiRequest) -> DriveResult<ApiResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((request.method, request.path.clone()));

        match (request.method, request.path.as_str(), &request.body) {
            (Method::Get, "drive/files/", _) => Self::json(200, &*self.records.lock().unwrap()),
            (Method::Post, "drive/upload/", RequestBody::Upload(form)) => {
                self.uploads
                    .lock()
                    .unwrap()
                    .push((form.path.clone(), form.fingerprint.clone(), form.size));
                if self.reject_uploads.lock().unwrap().contains(&form.path) {
                    return Ok(ApiResponse::new(500, "storage unavailable"));
                }
                let mut records = self.records.lock().unwrap();
                let is_duplicate = records
                    .iter()
                    .any(|r| r.content_hash == form.fingerprint);
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                let record = FileRecord {
                    id: FileId::new(next.to_string()),
                    path: form.path.clone(),
                    size: form.size,
                    content_hash: form.fingerprint.clone(),
                    media_type: form.media_type.clone(),
                    uploaded_at: Utc::now(),
                    is_duplicate,
                    download_locator: None,
                };
                records.push(record.clone());
                Self::json(201, &record)
            }
            (Method::Delete, path, _) if path.starts_with("drive/delete/") => {
                if *self.reject_deletes.lock().unwrap() {
                    return Ok(ApiResponse::new(500, "delete failed"));
                }
                let id = path
                    .trim_start_matches("drive/delete/")
                    .trim_end_matches('/');
                self.records.lock().unwrap().retain(|r| r.id.as_str() != id);
                Ok(ApiResponse::new(204, ""))
            }
            _ => Ok(ApiResponse::new(404, "no route")),
        }
    }

    async fn fetch(&self, locator: &str) -> DriveResult<Bytes> {
        self.contents
            .lock()
            .unwrap()
            .get(locator)
            .map(|c| Bytes::from(c.clone()))
            .ok_or_else(|| DriveError::Transport(format!("connection reset fetching {locator}")))
    }
}

fn controller(store: Arc<FakeStore>) -> DriveController {
    let session = MemorySessionStore::with_session(Session {
        username: "alice".into(),
        access_token: SecretString::from("access".to_string()),
        refresh_token: SecretString::from("refresh".to_string()),
    });
    let pipeline = Pipeline::new(
        store,
        Arc::new(session),
        Arc::new(RateLimiter::new(Duration::ZERO)),
    );
    DriveController::new(DriveApi::new(Arc::new(pipeline)))
}

fn input(name: &str, content: &'static [u8]) -> UploadInput {
    UploadInput::new(name, Bytes::from_static(content))
}

#[tokio::test]
async fn failed_item_does_not_abort_batch() {
    let store = Arc::new(FakeStore::default());
    store
        .reject_uploads
        .lock()
        .unwrap()
        .insert("two.txt".into());
    let mut drive = controller(store.clone());

    let report = drive
        .upload(
            vec![
                input("one.txt", b"1"),
                input("two.txt", b"2"),
                input("three.txt", b"3"),
            ],
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.items.len(), 3);
    assert!(report.items[0].result.is_ok());
    assert_eq!(report.items[1].result.as_ref().unwrap_err().status(), Some(500));
    assert!(report.items[2].result.is_ok());
    assert_eq!(report.failed().count(), 1);

    let attempted: Vec<String> = store.uploads.lock().unwrap().iter().map(|u| u.0.clone()).collect();
    assert_eq!(attempted, vec!["one.txt", "two.txt", "three.txt"]);

    // Reloaded after the batch
    let mut cached: Vec<&str> = drive.records().iter().map(|r| r.path.as_str()).collect();
    cached.sort();
    assert_eq!(cached, vec!["one.txt", "three.txt"]);
}

#[tokio::test]
async fn oversized_batch_is_rejected_before_dispatch() {
    let store = Arc::new(FakeStore::default());
    let mut drive = controller(store.clone()).with_max_batch_files(2);

    let err = drive
        .upload(
            vec![input("a", b"a"), input("b", b"b"), input("c", b"c")],
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DriveError::Validation(_)));
    assert!(store.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn upload_targets_current_directory_with_fingerprint() {
    let store = Arc::new(FakeStore::default());
    let mut drive = controller(store.clone());
    drive.navigate("docs");

    let progress_log = Arc::new(Mutex::new(Vec::new()));
    let log = progress_log.clone();
    let progress: ProgressFn = Box::new(move |done, total, _msg| {
        log.lock().unwrap().push((done, total));
    });

    let report = drive
        .upload(vec![input("hello.txt", b"hello")], Some(&progress))
        .await
        .unwrap();
    assert!(report.is_complete());

    let uploads = store.uploads.lock().unwrap().clone();
    assert_eq!(
        uploads,
        vec![("docs/hello.txt".to_string(), fingerprint(b"hello"), 5)]
    );
    assert_eq!(*progress_log.lock().unwrap(), vec![(0, 1), (1, 1)]);

    let view = drive.view();
    let files: Vec<&str> = view.files().map(|r| r.path.as_str()).collect();
    assert_eq!(files, vec!["docs/hello.txt"]);
}

#[tokio::test]
async fn identical_content_is_reported_as_duplicate() {
    let store = Arc::new(FakeStore::default());
    store.seed("original.bin", b"same bytes");
    let mut drive = controller(store);

    let report = drive
        .upload(vec![input("copy.bin", b"same bytes")], None)
        .await
        .unwrap();

    let stored: Vec<&FileRecord> = report.succeeded().collect();
    assert!(stored[0].is_duplicate);
    assert_eq!(report.deduplicated_bytes(), 10);

    let stats = drive.stats(1024);
    assert_eq!(stats.used_bytes, 10);
    assert_eq!(stats.saved_bytes, 10);
    assert_eq!(stats.file_count, 2);
}

#[tokio::test]
async fn delete_removes_record() {
    let store = Arc::new(FakeStore::default());
    let id = store.seed("a.txt", b"a");
    store.seed("b.txt", b"b");
    let mut drive = controller(store.clone());
    drive.load().await.unwrap();

    drive.delete(&id).await.unwrap();

    assert_eq!(store.paths(), vec!["b.txt"]);
    let cached: Vec<&str> = drive.records().iter().map(|r| r.path.as_str()).collect();
    assert_eq!(cached, vec!["b.txt"]);
}

#[tokio::test]
async fn failed_delete_reconciles_from_server() {
    let store = Arc::new(FakeStore::default());
    let id = store.seed("keep-me.txt", b"x");
    *store.reject_deletes.lock().unwrap() = true;
    let mut drive = controller(store.clone());
    drive.load().await.unwrap();

    let err = drive.delete(&id).await.unwrap_err();
    assert_eq!(err.status(), Some(500));

    // The optimistic removal was undone by reloading, not by rollback.
    assert!(drive.find_by_path("keep-me.txt").is_some());
    let calls: Vec<Method> = store.requests.lock().unwrap().iter().map(|r| r.0).collect();
    assert_eq!(calls, vec![Method::Get, Method::Delete, Method::Get]);
}

#[tokio::test]
async fn delete_unknown_record_sends_nothing() {
    let store = Arc::new(FakeStore::default());
    let mut drive = controller(store.clone());

    let err = drive.delete(&FileId::new("404")).await.unwrap_err();
    assert!(matches!(err, DriveError::NotFound(_)));
    assert!(store.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn create_folder_uploads_placeholder() {
    let store = Arc::new(FakeStore::default());
    let mut drive = controller(store.clone());

    let folder = drive.create_folder("  new/folder ").await.unwrap();
    assert_eq!(folder, "newfolder/");

    let uploads = store.uploads.lock().unwrap().clone();
    assert_eq!(
        uploads,
        vec![("newfolder/.keep".to_string(), EMPTY_FINGERPRINT.to_string(), 0)]
    );

    let view = drive.view();
    let folders: Vec<(&str, usize)> = view
        .folders()
        .map(|f| (f.path.as_str(), f.item_count))
        .collect();
    assert_eq!(folders, vec![("newfolder/", 0)]);
    assert_eq!(view.files().count(), 0);

    drive.navigate("newfolder/");
    assert!(drive.view().is_empty());
}

#[tokio::test]
async fn create_folder_rejects_blank_and_existing() {
    let store = Arc::new(FakeStore::default());
    store.seed("docs/.keep", b"");
    let mut drive = controller(store.clone());
    drive.load().await.unwrap();

    assert!(matches!(
        drive.create_folder(" / ").await,
        Err(DriveError::Validation(_))
    ));
    assert!(matches!(
        drive.create_folder("docs").await,
        Err(DriveError::Validation(_))
    ));
    assert!(store.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn download_writes_under_record_name() {
    let store = Arc::new(FakeStore::default());
    let id = store.seed("photos/cat.jpg", b"meow");
    let mut drive = controller(store);
    drive.load().await.unwrap();
    let tmp = TempDir::new().unwrap();

    let outcome = drive.download(&id, tmp.path()).await.unwrap();

    let expected = tmp.path().join("cat.jpg");
    assert_eq!(outcome, DownloadOutcome::Saved(expected.clone()));
    assert_eq!(std::fs::read(expected).unwrap(), b"meow");
}

#[tokio::test]
async fn failed_download_falls_back_to_locator() {
    let store = Arc::new(FakeStore::default());
    let id = store.seed("doc.txt", b"text");
    store.contents.lock().unwrap().clear();
    let mut drive = controller(store);
    drive.load().await.unwrap();
    let tmp = TempDir::new().unwrap();

    let outcome = drive.download(&id, tmp.path()).await.unwrap();

    assert_eq!(
        outcome,
        DownloadOutcome::Navigate(format!("https://media.test/{id}"))
    );
    assert!(!tmp.path().join("doc.txt").exists());
}

#[tokio::test]
async fn navigation_and_search_state() {
    let store = Arc::new(FakeStore::default());
    store.seed("a/x.txt", b"x");
    store.seed("a/b/y.txt", b"y");
    store.seed("a/.keep", b"");
    let mut drive = controller(store);
    drive.load().await.unwrap();

    drive.navigate("/a//b");
    assert_eq!(drive.current_path(), "a/b/");
    assert_eq!(
        drive.breadcrumbs(),
        vec![
            ("a".to_string(), "a/".to_string()),
            ("b".to_string(), "a/b/".to_string())
        ]
    );

    drive.navigate_up();
    assert_eq!(drive.current_path(), "a/");
    let view = drive.view();
    let folders: Vec<(&str, usize)> = view.folders().map(|f| (f.name.as_str(), f.item_count)).collect();
    assert_eq!(folders, vec![("b", 1)]);
    let files: Vec<&str> = view.files().map(|r| r.path.as_str()).collect();
    assert_eq!(files, vec!["a/x.txt"]);

    drive.search("Y.TXT");
    assert!(drive.is_searching());
    let view = drive.view();
    assert!(view.is_searching);
    let hits: Vec<&str> = view.files().map(|r| r.path.as_str()).collect();
    assert_eq!(hits, vec!["a/b/y.txt"]);

    drive.navigate("");
    assert!(!drive.is_searching());
    assert_eq!(drive.current_path(), "");
}
