//! Typed remote-store operations. Every call goes through the [`Pipeline`].

use ddrive_core::{DriveResult, FileId, FileRecord};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::pipeline::{CallContext, Pipeline};
use crate::session::Session;
use crate::transport::{ApiRequest, UploadForm};

/// The signed-in user as reported by `user/profile/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub date_joined: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

#[derive(Clone)]
pub struct DriveApi {
    pipeline: Arc<Pipeline>,
}

impl DriveApi {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        DriveApi { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    pub async fn list_files(&self) -> DriveResult<Vec<FileRecord>> {
        let response = self
            .pipeline
            .execute(CallContext::new(ApiRequest::get("drive/files/")))
            .await?;
        response.json()
    }

    pub async fn delete_file(&self, id: &FileId) -> DriveResult<()> {
        self.pipeline
            .execute(CallContext::new(ApiRequest::delete(format!(
                "drive/delete/{id}/"
            ))))
            .await?;
        Ok(())
    }

    /// Submit one file. The store decides `is_duplicate` and returns the
    /// canonical record.
    pub async fn upload_file(&self, form: UploadForm) -> DriveResult<FileRecord> {
        let response = self
            .pipeline
            .execute(CallContext::new(ApiRequest::post("drive/upload/").upload(form)))
            .await?;
        response.json()
    }

    /// Fetch a download locator through the transport (outside the pipeline;
    /// locators are pre-authorized media URLs).
    pub async fn fetch(&self, locator: &str) -> DriveResult<bytes::Bytes> {
        self.pipeline.transport().fetch(locator).await
    }

    // ── Session ───────────────────────────────────────────────────────────────

    /// Exchange credentials for a token pair and store it.
    pub async fn login(&self, username: &str, password: &SecretString) -> DriveResult<()> {
        let request = ApiRequest::post("user/token/obtain/").json(serde_json::json!({
            "username": username,
            "password": password.expose_secret(),
        }));
        let response = self
            .pipeline
            .execute(CallContext::anonymous(request))
            .await?;
        let tokens: TokenPair = response.json()?;

        self.pipeline.session().set_session(Session {
            username: username.to_string(),
            access_token: SecretString::from(tokens.access),
            refresh_token: SecretString::from(tokens.refresh),
        })?;
        info!(username, "signed in");
        Ok(())
    }

    /// End the session on the server (best effort) and always clear it locally.
    pub async fn logout(&self) -> DriveResult<()> {
        let session = self.pipeline.session();
        if let (Some(refresh), Some(_)) = (session.refresh_token(), session.access_token()) {
            let request = ApiRequest::post("user/logout/")
                .json(serde_json::json!({ "refresh": refresh.expose_secret() }));
            if let Err(e) = self.pipeline.execute(CallContext::new(request)).await {
                warn!(error = %e, "server logout failed, clearing local session");
            }
        }
        session.clear_all()?;
        info!("signed out");
        Ok(())
    }

    pub async fn profile(&self) -> DriveResult<UserProfile> {
        let response = self
            .pipeline
            .execute(CallContext::new(ApiRequest::get("user/profile/")))
            .await?;
        response.json()
    }
}
