use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    auth::{AuthGate, Credentials, validate::MIN_PASSWORD_LEN},
    domain::{error::AuthError, props::AccountId},
};

pub const DEFAULT_MAX_FAILED_SIGN_INS: u32 = 5;

/// In-memory identity provider with the failure modes of a hosted one.
pub struct MemoryIdentityProvider {
    state: Mutex<State>,
    latency: Option<Duration>,
    max_failed_sign_ins: u32,
}

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    current: Option<AccountId>,
    failed_sign_ins: HashMap<String, u32>,
    reset_requests: Vec<String>,
    next_uid: u64,
    offline: bool,
}

struct User {
    uid: AccountId,
    password: String,
    display_name: String,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        MemoryIdentityProvider {
            state: Mutex::new(State::default()),
            latency: None,
            max_failed_sign_ins: DEFAULT_MAX_FAILED_SIGN_INS,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_max_failed_sign_ins(mut self, max: u32) -> Self {
        self.max_failed_sign_ins = max;
        self
    }

    /// While offline every call fails with [`AuthError::Network`].
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn password_reset_requests(&self) -> Vec<String> {
        self.state().reset_requests.clone()
    }

    pub fn display_name(&self, email: &str) -> Option<String> {
        self.state()
            .users
            .get(&normalize(email))
            .map(|u| u.display_name.clone())
    }

    pub fn user_count(&self) -> usize {
        self.state().users.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self) -> Result<MutexGuard<'_, State>, AuthError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state();
        if state.offline {
            return Err(AuthError::Network);
        }

        Ok(state)
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthGate for MemoryIdentityProvider {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AccountId, AuthError> {
        let mut state = self.round_trip().await?;
        let email = normalize(&credentials.email);

        if state.failed_sign_ins.get(&email).copied().unwrap_or(0) >= self.max_failed_sign_ins {
            debug!("Sign-in for {} rate limited", email);
            return Err(AuthError::RateLimited);
        }

        let uid = match state.users.get(&email) {
            None => return Err(AuthError::UserNotFound),
            Some(user) if user.password != credentials.password => None,
            Some(user) => Some(user.uid.clone()),
        };

        match uid {
            Some(uid) => {
                state.failed_sign_ins.remove(&email);
                state.current = Some(uid.clone());
                Ok(uid)
            }
            None => {
                *state.failed_sign_ins.entry(email).or_insert(0) += 1;
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    async fn register(
        &self,
        credentials: &Credentials,
        display_name: &str,
    ) -> Result<AccountId, AuthError> {
        let mut state = self.round_trip().await?;
        let email = normalize(&credentials.email);

        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakCredential);
        }
        if state.users.contains_key(&email) {
            return Err(AuthError::EmailInUse);
        }

        state.next_uid += 1;
        let uid = AccountId(format!("uid-{:06}", state.next_uid));
        state.users.insert(
            email,
            User {
                uid: uid.clone(),
                password: credentials.password.clone(),
                display_name: display_name.to_owned(),
            },
        );
        state.current = Some(uid.clone());

        debug!("Registered {}", uid);
        Ok(uid)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // local only, never reaches the provider
        self.state().current = None;
        Ok(())
    }

    fn current_account_id(&self) -> Option<AccountId> {
        self.state().current.clone()
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let mut state = self.round_trip().await?;
        let email = normalize(email);

        if !state.users.contains_key(&email) {
            return Err(AuthError::UserNotFound);
        }
        state.reset_requests.push(email);

        Ok(())
    }

    async fn delete_current_user(&self) -> Result<(), AuthError> {
        let mut state = self.round_trip().await?;

        let Some(current) = state.current.take() else {
            return Err(AuthError::UserNotFound);
        };
        state.users.retain(|_, user| user.uid != current);

        Ok(())
    }
}
