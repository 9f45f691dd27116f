use std::{sync::Arc, time::Duration};

use futures::stream::BoxStream;
use tracing::{debug, warn};

use crate::{
    auth::{
        AuthGate, Credentials, TimeoutGate,
        validate::{
            RegistrationForm, require_registration_input, require_reset_input,
            require_sign_in_input,
        },
    },
    config::Settings,
    domain::{
        account::{Account, Profile},
        error::BankError,
        props::{AccountId, Amount, TxKind},
    },
    ledger::{AccountReader, TransactionApplier},
    store::{DEFAULT_MAX_ATTEMPTS, DocumentStore},
};

// Session-level entry point. Resolves the signed-in account through the gate
// and hands off to the ledger; it keeps no balance of its own, so the only
// funds check is the one the applier runs at commit time.
pub struct Banking<S: ?Sized, G: ?Sized> {
    gate: Arc<G>,
    applier: TransactionApplier<S>,
    reader: AccountReader<S>,
}

impl<S, G> Banking<S, G>
where
    S: DocumentStore + ?Sized + 'static,
    G: AuthGate + ?Sized,
{
    pub fn new(store: Arc<S>, gate: Arc<G>) -> Self {
        Self::with_max_attempts(store, gate, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(store: Arc<S>, gate: Arc<G>, max_attempts: u32) -> Self {
        Banking {
            gate,
            applier: TransactionApplier::new(store.clone()).with_max_attempts(max_attempts),
            reader: AccountReader::new(store),
        }
    }

    pub fn current_account_id(&self) -> Option<AccountId> {
        self.gate.current_account_id()
    }

    /// Creates the provider user and its account document. If the document
    /// cannot be written the provider user is deleted again.
    pub async fn register(&self, form: &RegistrationForm) -> Result<AccountId, BankError> {
        require_registration_input(form)?;

        let credentials = Credentials::new(form.email.trim(), form.password.as_str());
        let account_id = self.gate.register(&credentials, form.full_name.trim()).await?;

        let profile = Profile {
            full_name: form.full_name.trim().to_owned(),
            email: form.email.trim().to_owned(),
            phone_number: form.phone_number.trim().to_owned(),
        };

        if let Err(e) = self.applier.update_profile(Some(&account_id), profile).await {
            warn!("Registration of {} failed, removing user: {}", account_id, e);
            if let Err(cleanup) = self.gate.delete_current_user().await {
                warn!("Could not remove user {}: {}", account_id, cleanup);
            }
            return Err(e);
        }

        debug!("Registered {}", account_id);
        Ok(account_id)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AccountId, BankError> {
        require_sign_in_input(email, password)?;

        Ok(self
            .gate
            .sign_in(&Credentials::new(email.trim(), password))
            .await?)
    }

    pub async fn sign_out(&self) -> Result<(), BankError> {
        Ok(self.gate.sign_out().await?)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), BankError> {
        require_reset_input(email)?;

        Ok(self.gate.request_password_reset(email.trim()).await?)
    }

    pub async fn deposit<A>(&self, amount: A) -> Result<Account, BankError>
    where
        A: TryInto<Amount, Error = BankError>,
    {
        self.transact(amount, TxKind::Deposit).await
    }

    pub async fn withdraw<A>(&self, amount: A) -> Result<Account, BankError>
    where
        A: TryInto<Amount, Error = BankError>,
    {
        self.transact(amount, TxKind::Withdrawal).await
    }

    async fn transact<A>(&self, amount: A, kind: TxKind) -> Result<Account, BankError>
    where
        A: TryInto<Amount, Error = BankError>,
    {
        let account_id = self.gate.current_account_id();
        self.applier
            .apply_transaction(account_id.as_ref(), amount, kind)
            .await
    }

    /// Current account state, empty if nothing was committed yet.
    pub async fn account(&self) -> Result<Account, BankError> {
        let account_id = self
            .gate
            .current_account_id()
            .ok_or(BankError::AccountUnresolved)?;

        self.reader.fetch_or_empty(&account_id).await
    }

    pub fn watch_account(
        &self,
        retry_delay: Duration,
    ) -> Result<BoxStream<'static, Option<Account>>, BankError> {
        let account_id = self
            .gate
            .current_account_id()
            .ok_or(BankError::AccountUnresolved)?;

        Ok(self.reader.watch(account_id, retry_delay))
    }
}

impl<S, G> Banking<S, TimeoutGate<G>>
where
    S: DocumentStore + ?Sized + 'static,
    G: AuthGate,
{
    /// Bounds every provider call by the configured auth timeout and uses the
    /// configured retry limit for account writes.
    pub fn from_settings(store: Arc<S>, provider: G, settings: &Settings) -> Self {
        Self::with_max_attempts(
            store,
            Arc::new(TimeoutGate::from_settings(provider, settings)),
            settings.max_attempts,
        )
    }
}
