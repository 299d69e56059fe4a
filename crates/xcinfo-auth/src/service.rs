use std::convert::Infallible;
use std::future::Future;

use crate::data::{AuthAssets, Challenge, DownloadAuthorization, ServiceKey, VerificationCode};

/// Remote operations of the sign-in chain.
///
/// Every step that changes session state returns a new [`AuthAssets`]
/// superseding the one it was given.
pub trait AuthService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Check whether previously stored assets still form a live session.
    fn validate_session(
        &self,
        account: &str,
        assets: &AuthAssets,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn service_key(&self) -> impl Future<Output = Result<ServiceKey, Self::Error>> + Send;

    fn sign_in(
        &self,
        key: &ServiceKey,
        account: &str,
        secret: &str,
    ) -> impl Future<Output = Result<AuthAssets, Self::Error>> + Send;

    fn request_challenge(
        &self,
        assets: &AuthAssets,
    ) -> impl Future<Output = Result<Challenge, Self::Error>> + Send;

    fn submit_code(
        &self,
        assets: &AuthAssets,
        code: &VerificationCode,
    ) -> impl Future<Output = Result<AuthAssets, Self::Error>> + Send;

    fn trust_device(
        &self,
        assets: &AuthAssets,
    ) -> impl Future<Output = Result<AuthAssets, Self::Error>> + Send;

    fn materialize_session(
        &self,
        account: &str,
        assets: &AuthAssets,
    ) -> impl Future<Output = Result<AuthAssets, Self::Error>> + Send;

    fn download_authorization(
        &self,
        assets: &AuthAssets,
    ) -> impl Future<Output = Result<DownloadAuthorization, Self::Error>> + Send;
}

/// Source of the verification code answering a [`Challenge`].
pub trait CodeProvider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn code(
        &self,
        challenge: &Challenge,
    ) -> impl Future<Output = Result<VerificationCode, Self::Error>> + Send;
}

/// Answers every challenge with the same, already known code.
#[derive(Debug, Clone)]
pub struct FixedCode(pub VerificationCode);

impl CodeProvider for FixedCode {
    type Error = Infallible;

    async fn code(&self, _: &Challenge) -> Result<VerificationCode, Self::Error> {
        Ok(self.0.clone())
    }
}
