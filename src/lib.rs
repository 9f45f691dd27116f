//! Ledger core of the simbank demo: per-user account documents, an atomic
//! transaction applier, live account reads and the authentication boundary.

pub mod auth;
pub mod banking;
pub mod cli;
pub mod config;
pub mod csv;
pub mod domain;
pub mod ledger;
pub mod query;
pub mod store;
pub mod telemetry;

pub use banking::Banking;
pub use domain::{
    account::{Account, Profile, Transaction},
    error::{AuthError, BankError},
    props::{AccountId, Amount, TxKind},
};
