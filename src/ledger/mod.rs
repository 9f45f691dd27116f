pub mod applier;
pub mod reader;

pub use applier::TransactionApplier;
pub use reader::{AccountReader, AccountStream};
