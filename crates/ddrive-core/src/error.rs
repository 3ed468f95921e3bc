use thiserror::Error;

pub type DriveResult<T> = Result<T, DriveError>;

#[derive(Debug, Error)]
pub enum DriveError {
    /// Rejected locally; never reached the network.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The access credential expired and could not be renewed.
    /// The local session has been cleared when this is returned.
    #[error("session expired, re-authentication required: {reason}")]
    AuthExpired { reason: String },

    /// No response from the remote store.
    #[error("transport error: {0}")]
    Transport(String),

    /// Any non-2xx response not recovered by the request pipeline.
    #[error("remote store rejected request ({status}): {body}")]
    Remote { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriveError {
    /// HTTP status of a remote rejection, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            DriveError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, DriveError::AuthExpired { .. })
    }
}

impl From<serde_json::Error> for DriveError {
    fn from(e: serde_json::Error) -> Self {
        DriveError::Decode(e.to_string())
    }
}
