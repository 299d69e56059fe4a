//! Data layer: transfer states, resume tokens and transfer requests.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Content-negotiation headers sent on fresh (non-resumed) requests only.
pub const FRESH_HEADERS: [(&str, &str); 2] = [("Accept", "*/*"), ("Accept-Encoding", "identity")];

/// Opaque data that lets an engine continue an interrupted transfer.
///
/// Only an engine of the kind that produced the token can interpret it.
#[derive(Clone, PartialEq, Eq)]
pub struct ResumeToken(Vec<u8>);

impl ResumeToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self { Self(bytes.into()) }

    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<Vec<u8>> for ResumeToken {
    fn from(bytes: Vec<u8>) -> Self { Self(bytes) }
}

impl fmt::Debug for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResumeToken({} bytes)", self.0.len())
    }
}

/// Observable state of one transfer engine run.
///
/// `Downloading` may repeat any number of times; exactly one of `Finished`
/// or `Failed` ends the run.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferState {
    Downloading {
        total_bytes:    Option<u64>,
        bytes_received: u64,
        /// Bytes per second.
        speed:          f64,
    },
    Finished {
        final_location: Option<PathBuf>,
    },
    Failed {
        final_location: Option<PathBuf>,
        resume_token:   Option<ResumeToken>,
        cancelled:      bool,
    },
}

impl TransferState {
    pub fn starting() -> Self {
        TransferState::Downloading {
            total_bytes:    None,
            bytes_received: 0,
            speed:          0.0,
        }
    }

    pub fn is_terminal(&self) -> bool { !matches!(self, TransferState::Downloading { .. }) }

    /// Progress view of a `Downloading` state with a known size.
    pub fn snapshot(&self) -> Option<ProgressSnapshot> {
        match *self {
            TransferState::Downloading {
                total_bytes: Some(total),
                bytes_received,
                speed,
            } => ProgressSnapshot::from_metrics(total, bytes_received, speed),
            _ => None,
        }
    }
}

/// Derived, render-only view of a running transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Completed fraction in `[0, 1]`.
    pub ratio:           f64,
    pub remaining_bytes: u64,
    /// Bytes per second.
    pub speed:           f64,
}

impl ProgressSnapshot {
    /// `None` when the total size is zero, since no ratio can be derived.
    pub fn from_metrics(total_bytes: u64, bytes_received: u64, speed: f64) -> Option<Self> {
        if total_bytes == 0 {
            return None;
        }
        let received = bytes_received.min(total_bytes);
        Some(Self {
            ratio:           received as f64 / total_bytes as f64,
            remaining_bytes: total_bytes - received,
            speed:           if speed.is_finite() { speed.max(0.0) } else { 0.0 },
        })
    }

    pub fn complete() -> Self {
        Self {
            ratio:           1.0,
            remaining_bytes: 0,
            speed:           0.0,
        }
    }

    /// Rounded percentage in `0..=100`.
    pub fn percent(&self) -> u8 { (self.ratio.clamp(0.0, 1.0) * 100.0).round() as u8 }

    /// Estimated time left at the current speed.
    pub fn eta(&self) -> Option<Duration> {
        if self.remaining_bytes == 0 {
            return Some(Duration::ZERO);
        }
        (self.speed > 0.0).then(|| Duration::from_secs_f64(self.remaining_bytes as f64 / self.speed))
    }
}

/// Everything a transfer engine needs to start one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub url:           Url,
    pub resume_token:  Option<ResumeToken>,
    /// Number of parallel segments the engine may use; at least 1.
    pub concurrency:   u32,
    pub headers:       Vec<(String, String)>,
    /// Download authorization sent with every request, if any.
    pub authorization: Option<String>,
}

impl TransferRequest {
    /// A fresh request carrying the fixed content-negotiation headers.
    pub fn fresh(url: Url) -> Self {
        Self {
            url,
            resume_token: None,
            concurrency: 1,
            headers: FRESH_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            authorization: None,
        }
    }

    /// A request continuing from `token`; no content-negotiation headers.
    pub fn resume(url: Url, token: ResumeToken) -> Self {
        Self {
            url,
            resume_token: Some(token),
            concurrency: 1,
            headers: Vec::new(),
            authorization: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_authorization(mut self, authorization: Option<String>) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn is_resume(&self) -> bool { self.resume_token.is_some() }
}
