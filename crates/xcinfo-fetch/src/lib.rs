//! Resumable downloads collapsed into a single awaitable result.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Transfer states, resume tokens and requests
//! - [`core`] - Pure transformations: segment planning, terminal-state
//!   classification, progress text
//! - [`effects`] - I/O: transfer engines, the resume data cache, the progress
//!   reporter, the subscription registry and the [`Orchestrator`]
//!
//! The orchestrator owns one transfer engine run per call, watches its state
//! channel, and resolves exactly one `Result<PathBuf, Error>`.

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use core::{Outcome, PlainProgress, Segment, calculate_segments, classify};
pub use data::{
    FRESH_HEADERS, ProgressSnapshot, ResumeToken, TransferRequest, TransferState,
};
pub use effects::{
    CancelSignal, Canceller, Orchestrator, PROGRESS_INTERVAL, ProgressMode, ProgressReporter,
    ResumeDataCache, StatePublisher, Subscription, SubscriptionId, SubscriptionRegistry,
    TransferEngine, TransferHandle, transfer_channel,
};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestEngine;

pub use error::{Error, Result};
