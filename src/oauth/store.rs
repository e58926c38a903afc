use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::SwiftyError;

/// Durable home of the refresh token. Nothing else about a session is stored.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, SwiftyError>;
    fn save(&self, refresh_token: &str) -> Result<(), SwiftyError>;
    fn clear(&self) -> Result<(), SwiftyError>;
}

impl std::fmt::Debug for dyn TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish()
    }
}

pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("swiftyhub")
        .join("session.json")
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    refresh_token: String,
    saved_at: chrono::DateTime<chrono::Utc>,
}

/// JSON file holding the refresh token, written owner-only on unix.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, SwiftyError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<StoredToken>(&data) {
            Ok(stored) if !stored.refresh_token.is_empty() => Ok(Some(stored.refresh_token)),
            Ok(_) => Ok(None),
            Err(e) => {
                // A corrupt file is as good as no file; the next save overwrites it.
                tracing::warn!("Ignoring unreadable token store {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    fn save(&self, refresh_token: &str) -> Result<(), SwiftyError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredToken {
            refresh_token: refresh_token.to_string(),
            saved_at: chrono::Utc::now(),
        };
        let data = serde_json::to_string_pretty(&stored)
            .map_err(|e| SwiftyError::StorageError(format!("Failed to serialize token: {e}")))?;
        std::fs::write(&self.path, data)?;
        restrict_permissions(&self.path)?;
        tracing::debug!("Persisted refresh token to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), SwiftyError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Cleared token store {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), SwiftyError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), SwiftyError> {
    Ok(())
}

/// Process-local store, used for `--ephemeral` runs and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(refresh_token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(refresh_token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, SwiftyError> {
        Ok(self.slot().clone())
    }

    fn save(&self, refresh_token: &str) -> Result<(), SwiftyError> {
        *self.slot() = Some(refresh_token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SwiftyError> {
        *self.slot() = None;
        Ok(())
    }
}
