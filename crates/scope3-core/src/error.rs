use scope3_partition::PartitionError;
use thiserror::Error;

use crate::record::InvalidRecord;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecisionError {
    #[error(transparent)]
    InvalidRecord(#[from] InvalidRecord),

    #[error("batch rejected: {} invalid record(s)", .0.len())]
    InvalidRecords(Vec<InvalidRecord>),

    #[error("{name} {value} is outside [{min}, {max}]")]
    ConfigOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("partition error: {0}")]
    Partition(#[from] PartitionError),
}
