use std::{env, time::Duration};

use color_eyre::eyre::{Result, WrapErr, ensure};

use crate::{auth::DEFAULT_AUTH_TIMEOUT, store::DEFAULT_MAX_ATTEMPTS};

pub const DATABASE_URL_VAR: &str = "SIMBANK_DATABASE_URL";
pub const MAX_ATTEMPTS_VAR: &str = "SIMBANK_MAX_ATTEMPTS";
pub const AUTH_TIMEOUT_VAR: &str = "SIMBANK_AUTH_TIMEOUT_SECS";
pub const LOG_VAR: &str = "SIMBANK_LOG";

pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub max_attempts: u32,
    pub auth_timeout: Duration,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Settings::default();

        let max_attempts = match lookup(MAX_ATTEMPTS_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .wrap_err_with(|| format!("{} must be a positive integer", MAX_ATTEMPTS_VAR))?,
            None => defaults.max_attempts,
        };
        ensure!(max_attempts >= 1, "{} must be at least 1", MAX_ATTEMPTS_VAR);

        let auth_timeout = match lookup(AUTH_TIMEOUT_VAR) {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse::<u64>()
                    .wrap_err_with(|| format!("{} must be a number of seconds", AUTH_TIMEOUT_VAR))?,
            ),
            None => defaults.auth_timeout,
        };
        ensure!(!auth_timeout.is_zero(), "{} must be at least 1", AUTH_TIMEOUT_VAR);

        Ok(Settings {
            database_url: lookup(DATABASE_URL_VAR).unwrap_or(defaults.database_url),
            max_attempts,
            auth_timeout,
            log_filter: lookup(LOG_VAR).unwrap_or(defaults.log_filter),
        })
    }
}
