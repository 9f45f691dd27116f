use std::{env, ffi::OsString, path::PathBuf};

use color_eyre::eyre::{OptionExt, Result};

/// `simbank <operations.csv>`
pub struct CliArgs {
    pub operations_file: PathBuf,
}

impl CliArgs {
    pub fn from_env() -> Result<Self> {
        Self::parse(env::args_os())
    }

    /// The first item is the program name.
    pub fn parse<I, A>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        let operations_file = args
            .into_iter()
            .nth(1)
            .map(|arg| PathBuf::from(arg.into()))
            .ok_or_eyre("Input file not passed")?;

        Ok(CliArgs { operations_file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_argument_is_operations_file() {
        let args = CliArgs::parse(["simbank", "ops.csv", "ignored"]).unwrap();
        assert_eq!(args.operations_file, PathBuf::from("ops.csv"));
    }

    #[test]
    fn missing_operations_file_is_an_error() {
        let err = CliArgs::parse(["simbank"]).err().unwrap();
        assert_eq!(err.to_string(), "Input file not passed");
    }
}
