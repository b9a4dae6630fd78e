//! Session identity
//!
//! One opaque token per session, created on first access and reused by both
//! controllers (and across restarts when backed by a file store). Never parsed.

use crate::message::random_base36;
use chrono::Utc;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

const SESSION_SUFFIX_LEN: usize = 9;

/// Opaque correlation key shared with the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(format!(
            "session_{}_{}",
            Utc::now().timestamp_millis(),
            random_base36(SESSION_SUFFIX_LEN)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a session id survives between controller instantiations
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, id: &str) -> io::Result<()>;
}

/// File-backed store, the analogue of browser session storage surviving a reload
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let id = contents.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, id: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, id)
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    slot: Mutex<Option<String>>,
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self
            .slot
            .lock()
            .map_err(|_| io::Error::other("identity store poisoned"))?
            .clone())
    }

    fn save(&self, id: &str) -> io::Result<()> {
        *self
            .slot
            .lock()
            .map_err(|_| io::Error::other("identity store poisoned"))? = Some(id.to_string());
        Ok(())
    }
}

pub struct SessionIdentity;

impl SessionIdentity {
    /// Load the persisted id, or create and persist a new one.
    ///
    /// Store failures never prevent a session from starting: an unreadable
    /// store yields a fresh id, an unwritable one just isn't persisted.
    pub fn resolve(store: &dyn IdentityStore) -> SessionId {
        match store.load() {
            Ok(Some(existing)) => {
                tracing::debug!(session_id = %existing, "Reusing persisted session id");
                return SessionId(existing);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted session id");
            }
        }

        let id = SessionId::generate();
        if let Err(e) = store.save(id.as_str()) {
            tracing::warn!(error = %e, session_id = %id, "Failed to persist session id");
        }
        tracing::info!(session_id = %id, "Created session id");
        id
    }
}

static PROCESS_SESSION: OnceLock<SessionId> = OnceLock::new();

/// Process-wide identity: resolved once, then returned verbatim for the life of the process
pub fn process_session(store: &dyn IdentityStore) -> &'static SessionId {
    PROCESS_SESSION.get_or_init(|| SessionIdentity::resolve(store))
}
