use tracing::{debug, info, warn};

use crate::data::{AuthAssets, DownloadAuthorization};
use crate::error::{AuthError, Step, StepError};
use crate::service::{AuthService, CodeProvider};
use crate::store::SessionStore;

/// Drives an [`AuthService`] from credentials to a download authorization.
///
/// `authenticate` takes `&mut self`, so one pipeline never runs two sign-ins
/// at once.
pub struct Pipeline<S, C, T> {
    service: S,
    codes:   C,
    store:   T,
}

impl<S, C, T> Pipeline<S, C, T>
where
    S: AuthService,
    C: CodeProvider,
    T: SessionStore,
{
    pub fn new(service: S, codes: C, store: T) -> Self {
        Self {
            service,
            codes,
            store,
        }
    }

    pub fn service(&self) -> &S { &self.service }

    pub fn store(&self) -> &T { &self.store }

    /// Reuse a valid stored session or run the full sign-in chain, then
    /// exchange the session for a download authorization.
    ///
    /// Any step failing yields [`AuthError::Authentication`]; which step
    /// failed is only logged.
    pub async fn authenticate(
        &mut self,
        account: &str,
        secret: &str,
    ) -> Result<DownloadAuthorization, AuthError> {
        self.run(account, secret).await.map_err(|e| {
            warn!(account, step = %e.step, "authentication failed: {e}");
            AuthError::Authentication
        })
    }

    async fn run(&self, account: &str, secret: &str) -> Result<DownloadAuthorization, StepError> {
        let assets = match self.stored_session(account).await {
            Some(stored) => stored,
            None => {
                let fresh = self.sign_in(account, secret).await?;
                if let Err(e) = self.store.save(account, &fresh) {
                    warn!(account, "failed to store session: {e}");
                }
                fresh
            }
        };

        self.service
            .download_authorization(&assets)
            .await
            .map_err(StepError::at(Step::Authorization))
    }

    async fn stored_session(&self, account: &str) -> Option<AuthAssets> {
        let Some(stored) = self.store.load(account) else {
            debug!(account, "no stored session");
            return None;
        };
        match self.service.validate_session(account, &stored).await {
            Ok(()) => {
                debug!(account, "reusing stored session");
                Some(stored)
            }
            Err(e) => {
                let e = StepError::at(Step::ValidateSession)(e);
                info!(account, step = %e.step, "stored session rejected, signing in again: {e}");
                None
            }
        }
    }

    async fn sign_in(&self, account: &str, secret: &str) -> Result<AuthAssets, StepError> {
        let key = self
            .service
            .service_key()
            .await
            .map_err(StepError::at(Step::ServiceKey))?;
        let assets = self
            .service
            .sign_in(&key, account, secret)
            .await
            .map_err(StepError::at(Step::SignIn))?;
        let challenge = self
            .service
            .request_challenge(&assets)
            .await
            .map_err(StepError::at(Step::Challenge))?;
        let code = self
            .codes
            .code(&challenge)
            .await
            .map_err(StepError::at(Step::VerificationCode))?;
        let assets = self
            .service
            .submit_code(&assets, &code)
            .await
            .map_err(StepError::at(Step::SubmitCode))?;
        let assets = self
            .service
            .trust_device(&assets)
            .await
            .map_err(StepError::at(Step::TrustDevice))?;
        self.service
            .materialize_session(account, &assets)
            .await
            .map_err(StepError::at(Step::Session))
    }
}
