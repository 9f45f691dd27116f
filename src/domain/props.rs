use derive_more::{Display, From, Into};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

use crate::domain::error::BankError;

#[derive(
    Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Display, Hash, From,
)]
pub struct AccountId(pub String);

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        AccountId(value.to_owned())
    }
}

/// Strictly positive monetary amount.
///
/// The only ways in are the `TryFrom` conversions, so holding an `Amount`
/// proves the value was validated. Deserialization goes through the same path.
#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, Hash, Into)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl TryFrom<Decimal> for Amount {
    type Error = BankError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value <= Decimal::ZERO {
            return Err(BankError::InvalidAmount);
        }

        Ok(Amount(value))
    }
}

impl TryFrom<f64> for Amount {
    type Error = BankError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(BankError::InvalidAmount);
        }

        Decimal::from_f64(value)
            .ok_or(BankError::InvalidAmount)
            .and_then(Amount::try_from)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    #[display("deposit")]
    Deposit,
    #[display("withdrawal")]
    Withdrawal,
}
