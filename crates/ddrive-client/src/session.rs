//! Session token storage.
//!
//! The pipeline reads and writes tokens through [`SessionStore`]; logging in
//! and out happen elsewhere. Two stores are provided: an in-memory one and a
//! JSON file persisted between runs (atomic temp+rename writes, owner-only
//! permissions on unix).

use ddrive_core::{DriveError, DriveResult};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// A signed-in user's credentials.
#[derive(Debug)]
pub struct Session {
    pub username: String,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

pub trait SessionStore: Send + Sync {
    fn access_token(&self) -> Option<SecretString>;
    fn refresh_token(&self) -> Option<SecretString>;
    fn username(&self) -> Option<String>;
    /// Replace the access token after a renewal.
    fn set_access_token(&self, token: SecretString) -> DriveResult<()>;
    /// Store a freshly obtained session.
    fn set_session(&self, session: Session) -> DriveResult<()>;
    /// Forget everything (logout or failed renewal).
    fn clear_all(&self) -> DriveResult<()>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh: Option<String>,
}

impl StoredSession {
    fn from_session(session: Session) -> Self {
        StoredSession {
            username: Some(session.username),
            access: Some(session.access_token.expose_secret().to_owned()),
            refresh: Some(session.refresh_token.expose_secret().to_owned()),
        }
    }
}

fn secret(value: &Option<String>) -> Option<SecretString> {
    value.as_ref().map(|v| SecretString::from(v.clone()))
}

// ── In-memory store ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: RwLock<StoredSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        MemorySessionStore {
            inner: RwLock::new(StoredSession::from_session(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn access_token(&self) -> Option<SecretString> {
        secret(&read(&self.inner).access)
    }

    fn refresh_token(&self) -> Option<SecretString> {
        secret(&read(&self.inner).refresh)
    }

    fn username(&self) -> Option<String> {
        read(&self.inner).username.clone()
    }

    fn set_access_token(&self, token: SecretString) -> DriveResult<()> {
        write(&self.inner).access = Some(token.expose_secret().to_owned());
        Ok(())
    }

    fn set_session(&self, session: Session) -> DriveResult<()> {
        *write(&self.inner) = StoredSession::from_session(session);
        Ok(())
    }

    fn clear_all(&self) -> DriveResult<()> {
        *write(&self.inner) = StoredSession::default();
        Ok(())
    }
}

// ── File-backed store ─────────────────────────────────────────────────────────

/// Session persisted as JSON, mirrored in memory.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    inner: RwLock<StoredSession>,
}

impl FileSessionStore {
    /// Load the session file at `path`, or start empty if it does not exist.
    pub fn open(path: &Path) -> DriveResult<Self> {
        let stored = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                DriveError::Config(format!("parsing session file {}: {e}", path.display()))
            })?
        } else {
            StoredSession::default()
        };

        Ok(FileSessionStore {
            path: path.to_path_buf(),
            inner: RwLock::new(stored),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, stored: &StoredSession) -> DriveResult<()> {
        if stored.access.is_none() && stored.refresh.is_none() && stored.username.is_none() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(stored)?;

        // Atomic write: write to temp file, then rename
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut StoredSession)) -> DriveResult<()> {
        let mut guard = write(&self.inner);
        let mut next = guard.clone();
        f(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn access_token(&self) -> Option<SecretString> {
        secret(&read(&self.inner).access)
    }

    fn refresh_token(&self) -> Option<SecretString> {
        secret(&read(&self.inner).refresh)
    }

    fn username(&self) -> Option<String> {
        read(&self.inner).username.clone()
    }

    fn set_access_token(&self, token: SecretString) -> DriveResult<()> {
        self.update(|s| s.access = Some(token.expose_secret().to_owned()))
    }

    fn set_session(&self, session: Session) -> DriveResult<()> {
        self.update(|s| *s = StoredSession::from_session(session))
    }

    fn clear_all(&self) -> DriveResult<()> {
        self.update(|s| *s = StoredSession::default())
    }
}

// Session state stays consistent even if a writer panicked mid-update:
// every write replaces whole fields.
fn read(lock: &RwLock<StoredSession>) -> std::sync::RwLockReadGuard<'_, StoredSession> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write(lock: &RwLock<StoredSession>) -> std::sync::RwLockWriteGuard<'_, StoredSession> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
