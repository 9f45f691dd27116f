use derive_more::Display;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum BankError {
    #[display("InvalidAmount")]
    InvalidAmount,
    #[display("InsufficientFunds")]
    InsufficientFunds,
    #[display("AccountUnresolved")]
    AccountUnresolved,
    #[display("StoreUnavailable: {_0}")]
    StoreUnavailable(String),
    #[display("{_0}")]
    Auth(AuthError),
}

impl std::error::Error for BankError {}

impl BankError {
    /// Text shown to the end user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            BankError::InvalidAmount => "Amount must be a positive number".to_owned(),
            BankError::InsufficientFunds => "Insufficient funds".to_owned(),
            BankError::AccountUnresolved => "User account data is not loaded".to_owned(),
            BankError::StoreUnavailable(_) => {
                "Service unavailable. Please try again later".to_owned()
            }
            BankError::Auth(e) => e.user_message().to_owned(),
        }
    }

    /// Whether re-invoking the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            BankError::StoreUnavailable(_) => true,
            BankError::Auth(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<AuthError> for BankError {
    fn from(e: AuthError) -> Self {
        BankError::Auth(e)
    }
}

impl From<StoreError> for BankError {
    fn from(e: StoreError) -> Self {
        BankError::StoreUnavailable(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum AuthError {
    #[display("InvalidCredentials")]
    InvalidCredentials,
    #[display("UserNotFound")]
    UserNotFound,
    #[display("WeakCredential")]
    WeakCredential,
    #[display("EmailInUse")]
    EmailInUse,
    #[display("InvalidInput: {_0}")]
    InvalidInput(&'static str),
    #[display("Network")]
    Network,
    #[display("RateLimited")]
    RateLimited,
    #[display("Timeout")]
    Timeout,
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Invalid email or password",
            AuthError::UserNotFound => "No account found for this email",
            AuthError::WeakCredential => "Password is too weak. Use at least 6 characters",
            AuthError::EmailInUse => "Account already exists",
            AuthError::InvalidInput(message) => *message,
            AuthError::Network => "Network error. Please check your connection",
            AuthError::RateLimited => "Too many attempts. Please try again later",
            AuthError::Timeout => "Request timed out",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::Network | AuthError::RateLimited | AuthError::Timeout
        )
    }
}
