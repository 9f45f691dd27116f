use std::{sync::Arc, time::Duration};

use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use tracing::{debug, warn};

use crate::{
    domain::{
        account::{Account, account_path},
        error::BankError,
        props::AccountId,
    },
    store::DocumentStore,
};

pub type AccountStream = BoxStream<'static, Result<Option<Account>, BankError>>;

/// Read side of the ledger: one-shot fetches and live subscriptions.
///
/// `None` means the account document does not exist yet, which callers treat
/// as an empty account.
pub struct AccountReader<S: ?Sized> {
    store: Arc<S>,
}

impl<S: DocumentStore + ?Sized + 'static> AccountReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        AccountReader { store }
    }

    pub async fn fetch(&self, account_id: &AccountId) -> Result<Option<Account>, BankError> {
        let snapshot = self.store.get_document(&account_path(account_id)).await?;

        snapshot
            .map(|s| Account::from_document(Some(&s.body), account_id))
            .transpose()
    }

    pub async fn fetch_or_empty(&self, account_id: &AccountId) -> Result<Account, BankError> {
        Ok(self
            .fetch(account_id)
            .await?
            .unwrap_or_else(|| Account::empty(account_id.clone())))
    }

    /// Current state first, then one item per observed commit. Ends after an
    /// error item when the underlying listener fails.
    pub async fn subscribe(&self, account_id: &AccountId) -> Result<AccountStream, BankError> {
        subscribe_account(&*self.store, account_id).await
    }

    /// Never-ending view of the account that survives listener failures by
    /// resubscribing after `retry_delay`. Only successful snapshots are
    /// yielded; failures are logged.
    pub fn watch(
        &self,
        account_id: AccountId,
        retry_delay: Duration,
    ) -> BoxStream<'static, Option<Account>> {
        let store = Arc::clone(&self.store);

        stream::unfold(None::<AccountStream>, move |mut current| {
            let store = Arc::clone(&store);
            let account_id = account_id.clone();

            async move {
                loop {
                    if current.is_none() {
                        match subscribe_account(&*store, &account_id).await {
                            Ok(updates) => current = Some(updates),
                            Err(e) => {
                                warn!("Subscribing to {} failed: {}", account_id, e);
                                tokio::time::sleep(retry_delay).await;
                                continue;
                            }
                        }
                    }

                    let Some(updates) = current.as_mut() else {
                        continue;
                    };
                    let item = updates.next().await;

                    match item {
                        Some(Ok(account)) => return Some((account, current)),
                        Some(Err(e)) => {
                            warn!("Subscription to {} dropped: {}", account_id, e);
                            current = None;
                            tokio::time::sleep(retry_delay).await;
                        }
                        None => {
                            debug!("Subscription to {} ended, resubscribing", account_id);
                            current = None;
                            tokio::time::sleep(retry_delay).await;
                        }
                    }
                }
            }
        })
        .boxed()
    }
}

async fn subscribe_account<S>(store: &S, account_id: &AccountId) -> Result<AccountStream, BankError>
where
    S: DocumentStore + ?Sized,
{
    let account_id = account_id.clone();
    let snapshots = store.subscribe_document(&account_path(&account_id)).await?;

    let accounts = snapshots.map(move |item| {
        item.map_err(BankError::from).and_then(|snapshot| {
            snapshot
                .map(|s| Account::from_document(Some(&s.body), &account_id))
                .transpose()
        })
    });

    // the listener is released as soon as an error item is produced
    Ok(stream::unfold(Some(accounts), |accounts| async move {
        let mut accounts = accounts?;
        let item = accounts.next().await?;
        let rest = if item.is_ok() { Some(accounts) } else { None };
        Some((item, rest))
    })
    .boxed())
}
