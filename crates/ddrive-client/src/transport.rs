//! Request/response model shared by the pipeline and its transports.

use async_trait::async_trait;
use bytes::Bytes;
use ddrive_core::{DriveError, DriveResult};
use secrecy::SecretString;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// Multipart upload payload for `drive/upload/`.
#[derive(Debug, Clone)]
pub struct UploadForm {
    /// Destination record path (current directory + file name)
    pub path: String,
    pub fingerprint: String,
    pub size: u64,
    /// Name of the multipart file part
    pub file_name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Upload(UploadForm),
}

/// One outbound call. `path` is relative to the transport's base URL.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    /// Set by the pipeline right before dispatch
    pub bearer: Option<SecretString>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn upload(mut self, form: UploadForm) -> Self {
        self.body = RequestBody::Upload(form);
        self
    }
}

/// Any response the store produced, successful or not.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn json<T: DeserializeOwned>(&self) -> DriveResult<T> {
        serde_json::from_slice(&self.body).map_err(DriveError::from)
    }

    /// Convert a non-2xx response into the error handed to callers.
    pub fn into_rejection(self) -> DriveError {
        DriveError::Remote {
            status: self.status,
            body: String::from_utf8_lossy(&self.body).into_owned(),
        }
    }
}

/// Moves requests to the remote store.
///
/// `send` returns `Ok` for every response, whatever its status; `Err` means
/// no response was received (`DriveError::Transport`).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> DriveResult<ApiResponse>;

    /// Fetch a download locator (an absolute URL handed out by the store).
    async fn fetch(&self, locator: &str) -> DriveResult<Bytes>;
}
