//! The request pipeline wrapped around every remote-store call.
//!
//! Outbound: throttle through the shared [`RateLimiter`], then inject the
//! stored access token as a bearer credential (if any).
//!
//! Inbound: 2xx passes through. A 401 on a renewable call that has not been
//! retried yet triggers one token renewal and one redispatch. If renewal is
//! impossible the session is cleared, the re-auth hook fires, and the caller
//! gets [`DriveError::AuthExpired`] describing the renewal failure. Every
//! other outcome propagates unchanged.

use ddrive_core::{DriveError, DriveResult};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::limiter::RateLimiter;
use crate::session::SessionStore;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Token renewal endpoint (relative to the API base URL)
pub const RENEW_PATH: &str = "user/token/refresh/";

/// Called after a failed renewal cleared the session; the presentation layer
/// uses it to send the user back to the login boundary.
pub type ReauthHook = Box<dyn Fn() + Send + Sync>;

/// Per-call state carried through the pipeline.
#[derive(Debug)]
pub struct CallContext {
    request: ApiRequest,
    authenticated: bool,
    retried: bool,
}

impl CallContext {
    /// A call that carries the stored bearer token and may be renewed once.
    pub fn new(request: ApiRequest) -> Self {
        CallContext {
            request,
            authenticated: true,
            retried: false,
        }
    }

    /// A call that never carries a bearer token and never triggers renewal
    /// (session obtain, renewal itself).
    pub fn anonymous(request: ApiRequest) -> Self {
        CallContext {
            request,
            authenticated: false,
            retried: false,
        }
    }

    pub fn retried(&self) -> bool {
        self.retried
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }
}

#[derive(Debug, Deserialize)]
struct RenewedToken {
    access: String,
}

pub struct Pipeline {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionStore>,
    limiter: Arc<RateLimiter>,
    // Serializes renewals so concurrent 401s exchange the refresh token once.
    renewal: tokio::sync::Mutex<()>,
    on_reauth: Option<ReauthHook>,
}

impl Pipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionStore>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Pipeline {
            transport,
            session,
            limiter,
            renewal: tokio::sync::Mutex::new(()),
            on_reauth: None,
        }
    }

    pub fn with_reauth_hook(mut self, hook: ReauthHook) -> Self {
        self.on_reauth = Some(hook);
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one call through the pipeline. Non-2xx responses become errors.
    pub async fn execute(&self, mut call: CallContext) -> DriveResult<ApiResponse> {
        let response = self.dispatch(&mut call).await?;
        if response.is_success() {
            return Ok(response);
        }

        if !(response.is_unauthorized() && call.authenticated && !call.retried) {
            return Err(response.into_rejection());
        }

        call.retried = true;
        let sent_with = call
            .request
            .bearer
            .as_ref()
            .map(|t| t.expose_secret().to_owned());
        self.recover_session(sent_with.as_deref()).await?;

        debug!(path = %call.request.path, "redispatching after session renewal");
        let response = self.dispatch(&mut call).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(response.into_rejection())
        }
    }

    /// Throttle, inject credentials, send.
    async fn dispatch(&self, call: &mut CallContext) -> DriveResult<ApiResponse> {
        self.limiter.acquire().await;
        call.request.bearer = if call.authenticated {
            self.session.access_token()
        } else {
            None
        };
        debug!(
            method = ?call.request.method,
            path = %call.request.path,
            authenticated = call.request.bearer.is_some(),
            "dispatch"
        );
        self.transport.send(&call.request).await
    }

    /// Make a fresh access token available, or end the session.
    ///
    /// `sent_with` is the token the rejected call carried; if the store
    /// already holds a different one, a concurrent call renewed it first.
    async fn recover_session(&self, sent_with: Option<&str>) -> DriveResult<()> {
        let _gate = self.renewal.lock().await;

        match (sent_with, self.session.access_token()) {
            (Some(sent), Some(current)) if current.expose_secret() != sent => {
                debug!("access token already renewed by a concurrent call");
                return Ok(());
            }
            (Some(_), None) => {
                return Err(DriveError::AuthExpired {
                    reason: "session ended while the call was in flight".into(),
                });
            }
            _ => {}
        }

        match self.renew_session().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "session renewal failed, clearing session");
                if let Err(clear_err) = self.session.clear_all() {
                    warn!(error = %clear_err, "clearing session store failed");
                }
                if let Some(hook) = &self.on_reauth {
                    hook();
                }
                Err(DriveError::AuthExpired {
                    reason: format!("renewal failed: {e}"),
                })
            }
        }
    }

    /// Exchange the stored refresh token for a new access token and persist it.
    pub async fn renew_session(&self) -> DriveResult<()> {
        let refresh = self
            .session
            .refresh_token()
            .ok_or_else(|| DriveError::Validation("no refresh credential stored".into()))?;

        let request = ApiRequest::post(RENEW_PATH)
            .json(serde_json::json!({ "refresh": refresh.expose_secret() }));
        let mut call = CallContext::anonymous(request);
        let response = self.dispatch(&mut call).await?;
        if !response.is_success() {
            return Err(response.into_rejection());
        }

        let renewed: RenewedToken = response.json()?;
        self.session
            .set_access_token(SecretString::from(renewed.access))?;
        info!("access token renewed");
        Ok(())
    }
}
