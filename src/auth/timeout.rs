use std::{future::Future, time::Duration};

use async_trait::async_trait;
use tracing::warn;

use crate::{
    auth::{AuthGate, Credentials},
    config::Settings,
    domain::{error::AuthError, props::AccountId},
};

pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounds every provider call so a stalled provider surfaces as
/// [`AuthError::Timeout`] instead of hanging the caller.
pub struct TimeoutGate<G> {
    inner: G,
    limit: Duration,
}

impl<G: AuthGate> TimeoutGate<G> {
    pub fn new(inner: G) -> Self {
        Self::with_limit(inner, DEFAULT_AUTH_TIMEOUT)
    }

    pub fn with_limit(inner: G, limit: Duration) -> Self {
        TimeoutGate { inner, limit }
    }

    pub fn from_settings(inner: G, settings: &Settings) -> Self {
        Self::with_limit(inner, settings.auth_timeout)
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} timed out after {:?}", operation, self.limit);
                Err(AuthError::Timeout)
            }
        }
    }
}

#[async_trait]
impl<G: AuthGate> AuthGate for TimeoutGate<G> {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AccountId, AuthError> {
        self.bounded("sign in", self.inner.sign_in(credentials)).await
    }

    async fn register(
        &self,
        credentials: &Credentials,
        display_name: &str,
    ) -> Result<AccountId, AuthError> {
        self.bounded("register", self.inner.register(credentials, display_name))
            .await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.bounded("sign out", self.inner.sign_out()).await
    }

    fn current_account_id(&self) -> Option<AccountId> {
        self.inner.current_account_id()
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.bounded("password reset", self.inner.request_password_reset(email))
            .await
    }

    async fn delete_current_user(&self) -> Result<(), AuthError> {
        self.bounded("delete user", self.inner.delete_current_user())
            .await
    }
}
