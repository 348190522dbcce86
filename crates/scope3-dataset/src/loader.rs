//! Supplier table loaders.
//!
//! JSON tables are an array of records. CSV tables need a header row; both the
//! snake_case field names and the legacy dashboard's column names work:
//!   Supplier, Material, Distance_km, Transport, Quantity_ton,
//!   Emission_Factor, Cost_per_ton

use std::fs::File;
use std::io::Read;
use std::path::Path;

use scope3_core::SupplierRecord;

use crate::error::DatasetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Json,
    Csv,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(DatasetError::UnsupportedFormat(format!(
                "'{}' (expected .json or .csv)",
                path.display()
            ))),
        }
    }
}

pub fn load_json<R: Read>(reader: R) -> Result<Vec<SupplierRecord>, DatasetError> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_csv<R: Read>(reader: R) -> Result<Vec<SupplierRecord>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (row, result) in csv_reader.deserialize().enumerate() {
        // +2: one for the header row, one for 1-based line numbers.
        let record: SupplierRecord =
            result.map_err(|source| DatasetError::Csv { line: row + 2, source })?;
        records.push(record);
    }
    Ok(records)
}

pub fn load_str(text: &str, format: TableFormat) -> Result<Vec<SupplierRecord>, DatasetError> {
    match format {
        TableFormat::Json => load_json(text.as_bytes()),
        TableFormat::Csv => load_csv(text.as_bytes()),
    }
}

pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<SupplierRecord>, DatasetError> {
    let path = path.as_ref();
    let format = TableFormat::from_path(path)?;
    let file = File::open(path)?;
    let records = match format {
        TableFormat::Json => load_json(file)?,
        TableFormat::Csv => load_csv(file)?,
    };
    log::info!("loaded {} supplier row(s) from {}", records.len(), path.display());
    Ok(records)
}
