use std::sync::Arc;

use tracing::debug;

use crate::{
    domain::{
        account::{Account, Profile, account_path},
        error::BankError,
        props::{AccountId, Amount, TxKind},
    },
    store::{DEFAULT_MAX_ATTEMPTS, DocumentStore, run_transaction},
};

/// Applies deposits and withdrawals to account documents.
///
/// Every mutation is a single atomic read-check-write on the account
/// document. The funds check runs inside it, so it sees the balance the write
/// is conditioned on rather than whatever a caller read earlier.
pub struct TransactionApplier<S: ?Sized> {
    store: Arc<S>,
    max_attempts: u32,
}

impl<S: DocumentStore + ?Sized> TransactionApplier<S> {
    pub fn new(store: Arc<S>) -> Self {
        TransactionApplier {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Applies `amount` of `kind` and returns the committed account.
    ///
    /// The amount is validated before the account is resolved or the store is
    /// touched.
    pub async fn apply_transaction<A>(
        &self,
        account_id: Option<&AccountId>,
        amount: A,
        kind: TxKind,
    ) -> Result<Account, BankError>
    where
        A: TryInto<Amount, Error = BankError>,
    {
        let amount = amount.try_into()?;
        let account_id = require_account(account_id)?;

        debug!("Applying {} of {} to {}", kind, amount, account_id);

        run_transaction(
            &*self.store,
            &account_path(account_id),
            self.max_attempts,
            |doc, now| -> Result<_, BankError> {
                let updated = Account::from_document(doc, account_id)?.apply(kind, amount, now)?;
                Ok((updated.to_document()?, updated))
            },
        )
        .await
        .inspect_err(|e| debug!("Rejected {} of {} to {}: {}", kind, amount, account_id, e))
    }

    /// Writes identity fields, creating the account if needed. Balance and
    /// history are left as stored.
    pub async fn update_profile(
        &self,
        account_id: Option<&AccountId>,
        profile: Profile,
    ) -> Result<Account, BankError> {
        let account_id = require_account(account_id)?;

        debug!("Updating profile of {}", account_id);

        run_transaction(
            &*self.store,
            &account_path(account_id),
            self.max_attempts,
            |doc, _| -> Result<_, BankError> {
                let updated = Account::from_document(doc, account_id)?.with_profile(profile.clone());
                Ok((updated.to_document()?, updated))
            },
        )
        .await
    }
}

fn require_account(account_id: Option<&AccountId>) -> Result<&AccountId, BankError> {
    account_id
        .filter(|id| !id.is_empty())
        .ok_or(BankError::AccountUnresolved)
}
