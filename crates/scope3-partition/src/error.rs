use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("partition input is empty")]
    EmptyInput,

    #[error("group count must be at least 1, got {0}")]
    InvalidGroupCount(usize),

    #[error("value at index {index} is not finite")]
    NonFiniteValue { index: usize },

    #[error("{distinct} distinct values cannot fill {groups} groups")]
    TooFewDistinctValues { distinct: usize, groups: usize },

    #[error("partitioner returned {actual} assignments for {expected} values")]
    AssignmentCountMismatch { expected: usize, actual: usize },
}
