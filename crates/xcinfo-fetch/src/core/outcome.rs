use std::path::PathBuf;

use crate::data::{ResumeToken, TransferState};

/// What the orchestrator does with a terminal transfer state.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(PathBuf),
    ArtifactMissing,
    Interrupted {
        /// Token to store in the resume data cache.
        persist: Option<ResumeToken>,
        /// Partial artifact left by the engine that must be removed.
        discard: Option<PathBuf>,
    },
    /// Handed back to the caller, never persisted here.
    Recoverable(ResumeToken),
}

/// Classify a terminal state. `None` while the transfer is still running.
///
/// | final location | resume token | cancelled | outcome |
/// |---|---|---|---|
/// | absent | present | true | interrupted, token persisted |
/// | absent | present | false | recoverable |
/// | absent | absent | any | artifact missing |
/// | present | any | any | interrupted, artifact discarded |
pub fn classify(state: TransferState) -> Option<Outcome> {
    let outcome = match state {
        TransferState::Downloading { .. } => return None,
        TransferState::Finished {
            final_location: Some(path),
        } => Outcome::Completed(path),
        TransferState::Finished { final_location: None } => Outcome::ArtifactMissing,
        TransferState::Failed {
            final_location: Some(path),
            ..
        } => Outcome::Interrupted {
            persist: None,
            discard: Some(path),
        },
        TransferState::Failed {
            final_location: None,
            resume_token: Some(token),
            cancelled: true,
        } => Outcome::Interrupted {
            persist: Some(token),
            discard: None,
        },
        TransferState::Failed {
            final_location: None,
            resume_token: Some(token),
            cancelled: false,
        } => Outcome::Recoverable(token),
        TransferState::Failed {
            final_location: None,
            resume_token: None,
            ..
        } => Outcome::ArtifactMissing,
    };
    Some(outcome)
}
