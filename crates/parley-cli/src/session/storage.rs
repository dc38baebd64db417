//! File-backed session store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use parley_core::{AccessToken, Credential, RefreshToken, SessionStore};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Stored session data.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    api_url: String,
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    fn new(api_url: &str, credential: &Credential) -> Self {
        Self {
            api_url: api_url.to_string(),
            access_token: credential.access_token().as_str().to_string(),
            refresh_token: credential.refresh_token().map(|t| t.as_str().to_string()),
            issued_at: credential.issued_at(),
            expires_at: credential.expires_at(),
        }
    }

    fn into_credential(self) -> Credential {
        let mut credential = Credential::new(
            AccessToken::new(self.access_token),
            self.refresh_token.map(RefreshToken::new),
        );
        if let Some(issued_at) = self.issued_at {
            credential = credential.with_issued_at(issued_at);
        }
        if let Some(expires_at) = self.expires_at {
            credential = credential.with_expiry(expires_at);
        }
        credential
    }
}

/// Get the default session file path.
pub fn default_session_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "parley").context("Could not determine data directory")?;

    Ok(dirs.data_dir().join("session.json"))
}

/// Session store persisted as a JSON file.
///
/// The session is bound to the API it was issued by; a file written for a
/// different API URL is ignored. Every refresh rewrites the file, so the
/// next invocation starts from the newest tokens.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    api_url: String,
    credential: RwLock<Option<Credential>>,
}

impl FileSessionStore {
    /// Open the store, loading any session saved for `api_url`.
    pub fn open(path: impl Into<PathBuf>, api_url: &str) -> Result<Self> {
        let path = path.into();
        let credential = load(&path, api_url)?;

        Ok(Self {
            path,
            api_url: api_url.to_string(),
            credential: RwLock::new(credential),
        })
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create data directory")?;
        }

        let stored = StoredSession::new(&self.api_url, credential);
        let json = serde_json::to_string_pretty(&stored)?;

        fs::write(&self.path, &json).context("Failed to write session file")?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Credential) {
        if let Err(e) = self.save(&credential) {
            warn!(error = %e, "Failed to persist session");
        }
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    fn clear(&self) {
        if let Err(e) = self.remove() {
            warn!(error = %e, "Failed to remove session file");
        }
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn load(path: &Path, api_url: &str) -> Result<Option<Credential>> {
    if !path.exists() {
        return Ok(None);
    }

    let json = fs::read_to_string(path).context("Failed to read session file")?;
    let stored: StoredSession = serde_json::from_str(&json).context("Invalid session file")?;

    if stored.api_url != api_url {
        debug!(stored = %stored.api_url, current = %api_url, "Ignoring session for another API");
        return Ok(None);
    }

    Ok(Some(stored.into_credential()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const API: &str = "http://localhost:8000/api";

    fn credential() -> Credential {
        Credential::new(
            AccessToken::new("access-1"),
            Some(RefreshToken::new("refresh-1")),
        )
        .expiring_in(1800)
    }

    #[test]
    fn session_survives_reopening() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileSessionStore::open(&path, API).unwrap();
        assert!(store.get().is_none());
        let saved = credential();
        store.set(saved.clone());

        let reopened = FileSessionStore::open(&path, API).unwrap();
        let loaded = reopened.get().unwrap();
        assert_eq!(loaded.access_token().as_str(), "access-1");
        assert_eq!(loaded.refresh_token().unwrap().as_str(), "refresh-1");
        assert_eq!(loaded.issued_at(), saved.issued_at());
        assert_eq!(loaded.expires_at(), saved.expires_at());
    }

    #[test]
    fn clear_removes_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let store = FileSessionStore::open(&path, API).unwrap();
        store.set(credential());
        assert!(path.exists());

        store.clear();
        assert!(!path.exists());
        assert!(store.get().is_none());
    }

    #[test]
    fn session_for_another_api_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        FileSessionStore::open(&path, API).unwrap().set(credential());

        let other = FileSessionStore::open(&path, "https://support.example.com/api").unwrap();
        assert!(other.get().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        FileSessionStore::open(&path, API).unwrap().set(credential());

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        assert!(FileSessionStore::open(&path, API).is_err());
    }
}
