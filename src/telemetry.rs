use color_eyre::eyre::{Result, eyre};
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. Logs go to stderr so stdout stays
/// reserved for the accounts report.
pub fn init(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter).map_err(|e| eyre!("Invalid log filter: {}", e))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| eyre!("Could not install logging: {}", e))
}
