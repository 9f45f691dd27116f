use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    domain::{
        error::BankError,
        props::{AccountId, Amount, TxKind},
    },
    store::{Document, DocumentPath},
};

const ACCOUNTS_COLLECTION: &str = "users";

/// Persisted state of one user's account.
///
/// `transactions` is append-only and ordered by commit, which is not
/// necessarily timestamp order when commits race.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: AccountId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Transaction {
    pub amount: Amount,
    pub kind: TxKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
}

impl Account {
    pub fn empty(account_id: AccountId) -> Self {
        Account {
            account_id,
            full_name: String::new(),
            email: String::new(),
            phone_number: String::new(),
            balance: Decimal::ZERO,
            transactions: Vec::new(),
        }
    }

    /// Decodes a stored document, treating an absent one as a fresh account.
    pub fn from_document(doc: Option<&Document>, account_id: &AccountId) -> Result<Self, BankError> {
        match doc {
            None => Ok(Account::empty(account_id.clone())),
            Some(doc) => serde_json::from_value(doc.clone()).map_err(|e| {
                BankError::StoreUnavailable(format!(
                    "malformed account document for {}: {}",
                    account_id, e
                ))
            }),
        }
    }

    pub fn to_document(&self) -> Result<Document, BankError> {
        serde_json::to_value(self).map_err(|e| {
            BankError::StoreUnavailable(format!(
                "could not encode account {}: {}",
                self.account_id, e
            ))
        })
    }

    /// Returns the account with `amount` applied and a new record appended.
    pub fn apply(
        &self,
        kind: TxKind,
        amount: Amount,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, BankError> {
        let balance = match kind {
            TxKind::Deposit => self.balance.checked_add(*amount),
            TxKind::Withdrawal => {
                require_sufficient_funds(self, &amount)?;
                self.balance.checked_sub(*amount)
            }
        }
        .ok_or(BankError::InvalidAmount)?;

        debug!(
            "Applying {} of {} to {}: {} -> {}",
            kind, amount, self.account_id, self.balance, balance
        );

        let mut updated = self.clone();
        updated.balance = balance;
        updated.transactions.push(Transaction {
            amount,
            kind,
            timestamp,
        });

        Ok(updated)
    }

    pub fn with_profile(&self, profile: Profile) -> Self {
        Account {
            full_name: profile.full_name,
            email: profile.email,
            phone_number: profile.phone_number,
            ..self.clone()
        }
    }

    /// Sum of deposits minus sum of withdrawals over the whole history.
    pub fn net_of_transactions(&self) -> Decimal {
        self.transactions
            .iter()
            .fold(Decimal::ZERO, |acc, tx| match tx.kind {
                TxKind::Deposit => acc + *tx.amount,
                TxKind::Withdrawal => acc - *tx.amount,
            })
    }

    pub fn is_consistent(&self) -> bool {
        !self.balance.is_sign_negative() && self.balance == self.net_of_transactions()
    }
}

fn require_sufficient_funds(account: &Account, amount: &Amount) -> Result<(), BankError> {
    if account.balance < **amount {
        return Err(BankError::InsufficientFunds);
    }

    Ok(())
}

pub fn account_path(account_id: &AccountId) -> DocumentPath {
    DocumentPath::new(ACCOUNTS_COLLECTION, account_id)
}

pub fn accounts_collection() -> &'static str {
    ACCOUNTS_COLLECTION
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    fn amount(value: Decimal) -> Amount {
        Amount::try_from(value).unwrap()
    }

    fn acc() -> Account {
        Account::empty(AccountId::from("cl-1"))
    }

    #[test]
    fn test_deposit_fresh_account() {
        let updated = acc()
            .apply(TxKind::Deposit, amount(dec!(1.2345)), Utc::now())
            .unwrap();

        assert_eq!(updated.balance, dec!(1.2345));
        assert_eq!(updated.transactions.len(), 1);
        assert_eq!(updated.transactions[0].kind, TxKind::Deposit);
        assert!(updated.is_consistent());
    }

    #[test]
    fn test_withdraw_full_amount() {
        let funded = acc()
            .apply(TxKind::Deposit, amount(dec!(1.23)), Utc::now())
            .unwrap();
        let updated = funded
            .apply(TxKind::Withdrawal, amount(dec!(1.23)), Utc::now())
            .unwrap();

        assert_eq!(updated.balance, dec!(0));
        assert_eq!(updated.transactions.len(), 2);
        assert!(updated.is_consistent());
    }

    #[test]
    fn test_withdraw_insufficient_funds() {
        let funded = acc()
            .apply(TxKind::Deposit, amount(dec!(1.23)), Utc::now())
            .unwrap();

        assert_eq!(
            funded.apply(TxKind::Withdrawal, amount(dec!(1.2301)), Utc::now()),
            Err(BankError::InsufficientFunds)
        );
    }

    #[test]
    fn test_withdraw_from_empty_account() {
        assert_eq!(
            acc().apply(TxKind::Withdrawal, amount(dec!(0.01)), Utc::now()),
            Err(BankError::InsufficientFunds)
        );
    }

    #[test]
    fn test_deposit_overflow_rejected() {
        let mut rich = acc();
        rich.balance = Decimal::MAX;

        assert_eq!(
            rich.apply(TxKind::Deposit, amount(dec!(1)), Utc::now()),
            Err(BankError::InvalidAmount)
        );
    }

    #[test]
    fn test_profile_keeps_ledger() {
        let funded = acc()
            .apply(TxKind::Deposit, amount(dec!(10)), Utc::now())
            .unwrap();
        let updated = funded.with_profile(Profile {
            full_name: "Ada Lovelace".to_owned(),
            email: "ada@example.com".to_owned(),
            phone_number: "+15550100".to_owned(),
        });

        assert_eq!(updated.full_name, "Ada Lovelace");
        assert_eq!(updated.balance, dec!(10));
        assert_eq!(updated.transactions, funded.transactions);
    }

    #[test]
    fn test_document_round_trip_uses_camel_case() {
        let funded = acc()
            .apply(TxKind::Deposit, amount(dec!(5.50)), Utc::now())
            .unwrap();
        let doc = funded.to_document().unwrap();

        assert_eq!(doc["accountId"], "cl-1");
        assert_eq!(doc["transactions"][0]["kind"], "deposit");
        assert_eq!(
            Account::from_document(Some(&doc), &funded.account_id).unwrap(),
            funded
        );
    }

    #[test]
    fn test_missing_document_is_empty_account() {
        let id = AccountId::from("new");
        assert_eq!(
            Account::from_document(None, &id).unwrap(),
            Account::empty(id)
        );
    }

    #[test]
    fn test_malformed_document_is_reported() {
        let doc = serde_json::json!({ "accountId": "cl-1", "balance": "not money" });
        assert!(matches!(
            Account::from_document(Some(&doc), &AccountId::from("cl-1")),
            Err(BankError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_inconsistent_balance_detected() {
        let mut tampered = acc()
            .apply(TxKind::Deposit, amount(dec!(3)), Utc::now())
            .unwrap();
        tampered.balance = dec!(4);

        assert!(!tampered.is_consistent());
    }
}
