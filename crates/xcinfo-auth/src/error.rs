use std::fmt;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The only failure callers see; the failing step is logged, not returned.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication failed")]
    Authentication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ValidateSession,
    ServiceKey,
    SignIn,
    Challenge,
    VerificationCode,
    SubmitCode,
    TrustDevice,
    Session,
    Authorization,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::ValidateSession => "session validation",
            Step::ServiceKey => "service key lookup",
            Step::SignIn => "credential submission",
            Step::Challenge => "challenge request",
            Step::VerificationCode => "verification code entry",
            Step::SubmitCode => "verification code submission",
            Step::TrustDevice => "device trust",
            Step::Session => "session materialization",
            Step::Authorization => "download authorization",
        };
        f.write_str(name)
    }
}

/// A failed pipeline step, kept for logging.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct StepError {
    pub step:   Step,
    #[source]
    pub source: BoxError,
}

impl StepError {
    /// `map_err` adapter tagging an error with the step that raised it.
    pub fn at<E>(step: Step) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |e| Self {
            step,
            source: Box::new(e),
        }
    }
}
