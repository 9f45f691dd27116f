#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

use std::sync::Arc;

use color_eyre::eyre::{Result, eyre};
use tracing::debug;

use simbank::{
    AccountId, BankError,
    cli::CliArgs,
    config::Settings,
    csv::read_operations,
    ledger::TransactionApplier,
    query::accounts::print_accounts_csv,
    store::SqliteStore,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::from_env()?;
    let settings = Settings::from_env()?;
    telemetry::init(&settings.log_filter)?;

    let store = Arc::new(
        SqliteStore::connect(&settings.database_url)
            .await
            .map_err(|e| eyre!(e))?,
    );
    let applier = TransactionApplier::new(store.clone()).with_max_attempts(settings.max_attempts);

    let rows = read_operations(&cli_args.operations_file)?;

    for row_result in rows {
        match row_result {
            Ok(row) => {
                let account_id = AccountId(row.account_id);
                let Some(amount) = row.amount else {
                    debug!("Error processing row: {} for {}", BankError::InvalidAmount, account_id);
                    continue;
                };
                let _ = applier
                    .apply_transaction(Some(&account_id), amount, row.kind)
                    .await
                    .inspect_err(|e| debug!("Error processing row: {}", e));
            }
            Err(e) => debug!("{}", e),
        }
    }

    print_accounts_csv(&store).await?;

    Ok(())
}
