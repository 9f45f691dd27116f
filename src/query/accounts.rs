use std::io;

use color_eyre::eyre::{Result, eyre};
use csv::WriterBuilder;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::{
    domain::account::{Account, accounts_collection},
    store::SqliteStore,
};

#[derive(Clone, Debug, Serialize, PartialEq)]
pub(crate) struct AccountRow {
    #[serde(rename = "account")]
    pub account_id: String,
    pub balance: Decimal,
    pub transactions: usize,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        AccountRow {
            account_id: account.account_id.to_string(),
            balance: account.balance,
            transactions: account.transactions.len(),
        }
    }
}

pub async fn load_accounts(store: &SqliteStore) -> Result<Vec<Account>> {
    let documents = store
        .documents(accounts_collection())
        .await
        .map_err(|e| eyre!(e))?;

    Ok(documents
        .into_iter()
        .filter_map(
            |(path, snapshot)| match serde_json::from_value::<Account>(snapshot.body) {
                Ok(account) => Some(account),
                Err(e) => {
                    warn!("Skipping unreadable account {}: {}", path, e);
                    None
                }
            },
        )
        .collect())
}

pub fn write_accounts_csv<W: io::Write>(accounts: &[Account], writer: W) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().from_writer(writer);

    for account in accounts {
        csv_writer.serialize(AccountRow::from(account))?;
    }
    csv_writer.flush()?;

    Ok(())
}

pub async fn print_accounts_csv(store: &SqliteStore) -> Result<()> {
    let accounts = load_accounts(store).await?;
    write_accounts_csv(&accounts, io::stdout())
}
