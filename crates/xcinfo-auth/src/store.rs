use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};
use xcinfo_fs::{AtomicWriteOptions, atomic_read, atomic_write, ensure_dir};

use crate::data::AuthAssets;
use crate::error::BoxError;

/// Persistence for per-account session assets.
pub trait SessionStore: Send + Sync {
    /// Stored assets for `account`, or `None` when nothing usable is stored.
    fn load(&self, account: &str) -> Option<AuthAssets>;

    fn save(&self, account: &str, assets: &AuthAssets) -> Result<(), BoxError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, AuthAssets>>,
}

impl MemorySessionStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_session(self, account: impl Into<String>, assets: AuthAssets) -> Self {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.into(), assets);
        self
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, account: &str) -> Option<AuthAssets> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account)
            .cloned()
    }

    fn save(&self, account: &str, assets: &AuthAssets) -> Result<(), BoxError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.to_owned(), assets.clone());
        Ok(())
    }
}

/// One JSON file per account under `<root>/sessions`.
///
/// File names are the hex-encoded account so arbitrary account names map to
/// valid paths.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    /// Store under `<user-config>/xcinfo`, if that directory can be resolved.
    pub fn in_app_config() -> Option<Self> { xcinfo_platform::dir::app_config().map(Self::new) }

    pub fn root(&self) -> &Path { &self.root }

    pub fn path_for(&self, account: &str) -> PathBuf {
        self.root
            .join("sessions")
            .join(format!("{}.json", hex::encode(account)))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, account: &str) -> Option<AuthAssets> {
        let path = self.path_for(account);
        let bytes = match atomic_read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("no stored session at {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(assets) => Some(assets),
            Err(e) => {
                warn!("ignoring unreadable session file {}: {e}", path.display());
                None
            }
        }
    }

    fn save(&self, account: &str, assets: &AuthAssets) -> Result<(), BoxError> {
        let path = self.path_for(account);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let bytes = serde_json::to_vec(assets)?;
        atomic_write(
            &path,
            &bytes,
            AtomicWriteOptions::new().permissions(0o600).sync(true),
        )?;
        Ok(())
    }
}
