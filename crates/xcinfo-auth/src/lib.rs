//! Multi-step remote sign-in collapsed into one download authorization.
//!
//! [`Pipeline::authenticate`] first tries a stored session for the account.
//! When that is missing or rejected it runs the full chain: service key,
//! credentials, challenge, verification code, device trust, session. Either
//! way the resulting assets are exchanged for a [`DownloadAuthorization`].
//!
//! The remote operations live behind [`AuthService`]; where sessions are kept
//! is up to the [`SessionStore`].

mod data;
mod error;
mod pipeline;
mod service;
mod store;

pub use data::{AuthAssets, Challenge, DownloadAuthorization, ServiceKey, VerificationCode};
pub use error::{AuthError, BoxError, Step, StepError};
pub use pipeline::Pipeline;
pub use service::{AuthService, CodeProvider, FixedCode};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
