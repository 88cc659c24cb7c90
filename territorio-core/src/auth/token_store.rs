//! Bearer token persistence.
//!
//! Exactly one value survives a restart: the bearer token, stored under the
//! fixed key [`TOKEN_KEY`] in a per-origin file. User and assignment data are
//! re-fetched on every bootstrap.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use url::Url;

/// Key under which the token is stored in the session file.
pub const TOKEN_KEY: &str = "token";

/// A bearer token that never shows up in logs.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the token value. Only for building the Authorization header
    /// and for persisting.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether two tokens carry the same value.
    pub fn same_as(&self, other: &AccessToken) -> bool {
        self.expose_secret() == other.expose_secret()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken([REDACTED])")
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccessToken {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for AccessToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(AccessToken::new)
    }
}

/// Errors from a token store backend.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode session file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable storage for the bearer token.
///
/// Only [`SessionManager`](super::SessionManager) writes to a store.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the persisted token, if any.
    async fn get(&self) -> Result<Option<AccessToken>, TokenStoreError>;

    /// Persist a token, replacing any previous one.
    async fn set(&self, token: &AccessToken) -> Result<(), TokenStoreError>;

    /// Remove the persisted token. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), TokenStoreError>;
}

#[derive(Serialize, Deserialize)]
struct SessionFile {
    token: String,
}

/// File-backed token store scoped to one API origin.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store the token at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store the token in `dir`, in a file named after the origin of `api_base`.
    pub fn for_origin(dir: &Path, api_base: &Url) -> Self {
        Self::new(dir.join(format!("{}.json", origin_file_stem(api_base))))
    }

    /// Store the token in the default sessions directory.
    pub fn default_for(api_base: &Url) -> Self {
        Self::for_origin(&territorio_paths::sessions_dir(), api_base)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self) -> Result<Option<AccessToken>, TokenStoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_str::<SessionFile>(&content) {
            Ok(file) if !file.token.is_empty() => Ok(Some(AccessToken::new(file.token))),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    async fn set(&self, token: &AccessToken) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let content = serde_json::to_string(&SessionFile {
            token: token.expose_secret().to_string(),
        })?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| self.io_error(e))?;
        }

        debug!(path = %self.path.display(), "persisted session token");
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed session token");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// File name stem for an origin: scheme, host and port, with anything
/// outside `[A-Za-z0-9.]` replaced by `-`.
fn origin_file_stem(url: &Url) -> String {
    let host = url.host_str().unwrap_or("local");
    let port = url
        .port_or_known_default()
        .map(|p| p.to_string())
        .unwrap_or_default();
    format!("{}_{}_{}", url.scheme(), host, port)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// In-process token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<AccessToken>>,
    sets: AtomicUsize,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `token`, as after a previous run.
    pub fn with_token(token: impl Into<AccessToken>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
            sets: AtomicUsize::new(0),
        }
    }

    /// Number of times [`TokenStore::set`] has been called.
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<AccessToken>> {
        self.token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self) -> Result<Option<AccessToken>, TokenStoreError> {
        Ok(self.slot().clone())
    }

    async fn set(&self, token: &AccessToken) -> Result<(), TokenStoreError> {
        *self.slot() = Some(token.clone());
        self.sets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        *self.slot() = None;
        Ok(())
    }
}
