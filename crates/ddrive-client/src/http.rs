//! `reqwest` transport for the remote store's HTTP API

use async_trait::async_trait;
use bytes::Bytes;
use ddrive_core::{DriveError, DriveResult};
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use std::time::Duration;

use crate::transport::{ApiRequest, ApiResponse, Method, RequestBody, Transport, UploadForm};

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport rooted at `base_url` (e.g. `http://127.0.0.1:8000/api`).
    pub fn new(base_url: &str, timeout: Duration) -> DriveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ddrive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DriveError::Config(format!("building HTTP client: {e}")))?;

        Ok(HttpTransport {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a transport from ddrive-core config.
    ///
    /// If `enforce_tls` is true and the base URL uses HTTP, this returns an error.
    /// Otherwise, a warning is logged for non-HTTPS endpoints.
    pub fn from_config(server: &ddrive_core::config::ServerConfig) -> DriveResult<Self> {
        if server.base_url.starts_with("http://") {
            if server.enforce_tls {
                return Err(DriveError::Config(format!(
                    "server base_url uses plaintext HTTP ({}), but enforce_tls is enabled. \
                     Use an HTTPS endpoint or set server.enforce_tls = false for local development.",
                    server.base_url
                )));
            }
            tracing::warn!(
                base_url = %server.base_url,
                "server uses plaintext HTTP; tokens are transmitted unencrypted. \
                 Set server.enforce_tls = true and use HTTPS in production."
            );
        }

        Self::new(&server.base_url, server.timeout())
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn upload_form(form: &UploadForm) -> DriveResult<Form> {
    let file = Part::bytes(form.bytes.to_vec())
        .file_name(form.file_name.clone())
        .mime_str(&form.media_type)
        .map_err(|e| DriveError::Validation(format!("media type {}: {e}", form.media_type)))?;

    Ok(Form::new()
        .part("file", file)
        .text("filename", form.path.clone())
        .text("hash", form.fingerprint.clone())
        .text("size", form.size.to_string()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> DriveResult<ApiResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, self.url(&request.path));

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Upload(form) => builder.multipart(upload_form(form)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| DriveError::Transport(format!("{}: {e}", request.path)))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| DriveError::Transport(format!("reading response body: {e}")))?;

        Ok(ApiResponse { status, body })
    }

    async fn fetch(&self, locator: &str) -> DriveResult<Bytes> {
        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| DriveError::Transport(format!("fetching {locator}: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| DriveError::Transport(format!("reading {locator}: {e}")))?;

        let response = ApiResponse { status, body };
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(response.into_rejection())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddrive_core::config::ServerConfig;

    #[test]
    fn test_url_joining() {
        let t = HttpTransport::new("http://localhost:8000/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(t.url("drive/files/"), "http://localhost:8000/api/drive/files/");
        assert_eq!(t.url("/user/profile/"), "http://localhost:8000/api/user/profile/");
    }

    #[test]
    fn test_from_config_http_warning() {
        // HTTP base URL with enforce_tls=false should succeed (but log warning)
        let server = ServerConfig {
            base_url: "http://localhost:8000/api".into(),
            enforce_tls: false,
            ..Default::default()
        };
        assert!(HttpTransport::from_config(&server).is_ok());
    }

    #[test]
    fn test_from_config_http_enforce_tls() {
        let server = ServerConfig {
            base_url: "http://insecure:8000/api".into(),
            enforce_tls: true,
            ..Default::default()
        };
        let result = HttpTransport::from_config(&server);
        assert!(result.is_err(), "HTTP + enforce_tls must fail");
        assert!(
            result.err().unwrap().to_string().contains("enforce_tls"),
            "error message should mention enforce_tls"
        );
    }

    #[test]
    fn test_from_config_https() {
        let server = ServerConfig {
            base_url: "https://drive.example.com/api".into(),
            enforce_tls: true,
            ..Default::default()
        };
        assert!(HttpTransport::from_config(&server).is_ok());
    }
}
