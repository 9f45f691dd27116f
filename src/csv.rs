use std::{fs::File, io, path::Path};

use color_eyre::eyre::{Result, eyre};
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::props::TxKind;

/// One row of an operations file: `type, account, amount`.
#[derive(Debug, Deserialize)]
pub struct CsvOperationRecord {
    #[serde(rename = "type")]
    pub kind: TxKind,
    #[serde(rename = "account")]
    pub account_id: String,
    pub amount: Option<Decimal>,
}

pub fn read_operations(path: &Path) -> Result<impl Iterator<Item = Result<CsvOperationRecord>>> {
    let file = File::open(path)
        .map_err(|e| eyre!("Could not read input file {}: {}", path.display(), e))?;

    Ok(parse_operations(file))
}

/// Rows that fail to parse come back as errors numbered from 1, so callers
/// can skip them and keep going.
pub fn parse_operations<R: io::Read>(input: R) -> impl Iterator<Item = Result<CsvOperationRecord>> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(input)
        .into_deserialize()
        .enumerate()
        .map(|(i, row)| row.map_err(|e| eyre!("Error parsing operation {}: {}", i + 1, e)))
}
