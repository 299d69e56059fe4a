//! Persisted resume tokens, one file per source URL.
//!
//! A token for `https://host/path/Xcode_15.xip` lives at
//! `<cache-root>/Xcode_15.xip.resume`, where the default root is
//! `<user-cache>/xcinfo`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::Url;
use xcinfo_fs::{AtomicWriteOptions, atomic_read, atomic_write, ensure_dir, remove_if_exists};

use crate::data::ResumeToken;
use crate::error::{Error, Result};

const RESUME_EXTENSION: &str = "resume";

#[derive(Debug, Clone)]
pub struct ResumeDataCache {
    root: Option<PathBuf>,
}

impl Default for ResumeDataCache {
    fn default() -> Self { Self::new() }
}

impl ResumeDataCache {
    /// Cache under the per-user application cache directory.
    pub fn new() -> Self {
        Self {
            root: xcinfo_platform::dir::app_cache(),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self { Self { root: Some(root.into()) } }

    /// A cache that never persists anything.
    pub fn disabled() -> Self { Self { root: None } }

    pub fn root(&self) -> Option<&Path> { self.root.as_deref() }

    /// Where the token for `url` is stored, creating the cache directory on
    /// demand. `None` when the directory cannot be resolved or created, or
    /// the URL has no last path component.
    pub fn location_for(&self, url: &Url) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        let name = resume_file_name(url)?;
        if let Err(e) = ensure_dir(root) {
            warn!(error = %e, "resume data cache directory unavailable");
            return None;
        }
        Some(root.join(name))
    }

    /// Store `token` for `url`, replacing any previous token.
    pub fn save(&self, token: &ResumeToken, url: &Url) -> Result<PathBuf> {
        let path = self.location_for(url).ok_or(Error::CacheUnavailable)?;
        atomic_write(
            &path,
            token.as_bytes(),
            AtomicWriteOptions::new().permissions(0o600).sync(true),
        )?;
        debug!(url = %url, path = %path.display(), bytes = token.len(), "resume data saved");
        Ok(path)
    }

    /// Token previously saved for `url`, if one exists and is readable.
    pub fn load(&self, url: &Url) -> Option<ResumeToken> {
        let path = self.location_for(url)?;
        if !path.exists() {
            return None;
        }
        match atomic_read(&path) {
            Ok(bytes) if !bytes.is_empty() => Some(ResumeToken::new(bytes)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "unreadable resume data ignored");
                None
            }
        }
    }

    /// Drop the token for `url`. Removing a missing entry is a no-op.
    pub fn remove(&self, url: &Url) -> Result<()> {
        let Some(path) = self.location_for(url) else {
            return Ok(());
        };
        if remove_if_exists(&path)? {
            debug!(url = %url, "resume data removed");
        }
        Ok(())
    }
}

/// `<last path component>.resume`, or `None` for URLs without one.
fn resume_file_name(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(format!("{last}.{RESUME_EXTENSION}"))
}
