use scope3_core::SupplierRecord;

use crate::error::DatasetError;
use crate::loader::{load_str, TableFormat};

pub const SAMPLE_JSON_URI: &str = "scope3://datasets/sample.json";
pub const SAMPLE_CSV_URI: &str = "scope3://datasets/sample.csv";

pub const SAMPLE_JSON_TEXT: &str = include_str!("../../../data/suppliers/sample.json");
pub const SAMPLE_CSV_TEXT: &str = include_str!("../../../data/suppliers/sample.csv");

#[derive(Debug, Clone, Copy)]
pub struct DatasetResource {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
    pub format: TableFormat,
    pub text: &'static str,
}

static DATASET_RESOURCES: [DatasetResource; 2] = [
    DatasetResource {
        uri: SAMPLE_JSON_URI,
        name: "datasets/sample.json",
        description: "Six-supplier procurement sample (palm oil, chemicals, additives).",
        mime_type: "application/json",
        format: TableFormat::Json,
        text: SAMPLE_JSON_TEXT,
    },
    DatasetResource {
        uri: SAMPLE_CSV_URI,
        name: "datasets/sample.csv",
        description: "The same sample with the legacy dashboard column names.",
        mime_type: "text/csv",
        format: TableFormat::Csv,
        text: SAMPLE_CSV_TEXT,
    },
];

pub fn resources() -> &'static [DatasetResource] {
    &DATASET_RESOURCES
}

pub fn resource(uri: &str) -> Option<&'static DatasetResource> {
    DATASET_RESOURCES.iter().find(|resource| resource.uri == uri)
}

pub fn resource_text(uri: &str) -> Option<&'static str> {
    resource(uri).map(|resource| resource.text)
}

pub fn sample_suppliers() -> Result<Vec<SupplierRecord>, DatasetError> {
    load_str(SAMPLE_JSON_TEXT, TableFormat::Json)
}
