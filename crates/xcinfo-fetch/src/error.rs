//! Error types for xcinfo-fetch.

use thiserror::Error;
use url::Url;

use crate::data::ResumeToken;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The engine reported success but produced no usable file.
    #[error("could not move to final location")]
    ArtifactMissing,

    /// Cancelled, or a partial artifact had to be discarded.
    #[error("download interrupted")]
    Interrupted,

    /// Resumable failure; retry by starting again with `resume_token`.
    #[error("download of {url} failed and can be resumed")]
    Recoverable { url: Url, resume_token: ResumeToken },

    #[error("unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("remote file changed since the transfer started: {url}")]
    RemoteChanged { url: String },

    #[error("invalid resume token: {0}")]
    InvalidResumeToken(#[source] serde_json::Error),

    #[error("resume data cache is unavailable")]
    CacheUnavailable,

    #[cfg(feature = "reqwest")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transfer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fs(#[from] xcinfo_fs::Error),
}

impl Error {
    /// Resume token carried by a [`Error::Recoverable`] failure.
    pub fn resume_token(&self) -> Option<&ResumeToken> {
        match self {
            Error::Recoverable { resume_token, .. } => Some(resume_token),
            _ => None,
        }
    }
}
