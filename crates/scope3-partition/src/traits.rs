use crate::error::PartitionError;
use crate::types::{Partition, PartitionRequest};

/// Splits a set of scalar values into `request.groups` groups.
///
/// Implementations must be deterministic: the same request always yields the
/// same assignments. Any randomness is seeded from the provider's config.
pub trait GroupPartitioner: Send + Sync {
    fn name(&self) -> &'static str;

    fn partition(&self, request: &PartitionRequest) -> Result<Partition, PartitionError>;
}
