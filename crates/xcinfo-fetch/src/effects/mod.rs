//! I/O operations: engines, persistence, rendering and orchestration.

mod engine;
#[cfg(feature = "reqwest")]
mod http;
mod orchestrator;
mod progress;
mod registry;
mod resume;

pub use engine::{
    CancelSignal, Canceller, StatePublisher, TransferEngine, TransferHandle, transfer_channel,
};
#[cfg(feature = "reqwest")]
pub use http::ReqwestEngine;
pub use orchestrator::Orchestrator;
pub use progress::{PROGRESS_INTERVAL, ProgressMode, ProgressReporter};
pub use registry::{Subscription, SubscriptionId, SubscriptionRegistry};
pub use resume::ResumeDataCache;
