//! Boundary to the external identity provider.
//!
//! The ledger only needs a stable [`AccountId`] for the signed-in user; all
//! credential handling stays on the provider's side of this trait.

use async_trait::async_trait;

use crate::domain::{error::AuthError, props::AccountId};

pub mod memory;
pub mod timeout;
pub mod validate;

pub use memory::MemoryIdentityProvider;
pub use timeout::{DEFAULT_AUTH_TIMEOUT, TimeoutGate};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
pub trait AuthGate: Send + Sync {
    /// Signs in and makes the user current.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AccountId, AuthError>;

    /// Creates a user and signs them in.
    async fn register(
        &self,
        credentials: &Credentials,
        display_name: &str,
    ) -> Result<AccountId, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn current_account_id(&self) -> Option<AccountId>;

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Removes the signed-in user. Used to undo a registration whose account
    /// document could not be written.
    async fn delete_current_user(&self) -> Result<(), AuthError>;
}
