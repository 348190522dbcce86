use crate::error::PartitionError;
use crate::traits::GroupPartitioner;
use crate::types::{Partition, PartitionRequest};

/// Fixed rank thresholds: the i-th smallest of n values goes to group
/// `i * groups / n`. Equal values take the rank of their first occurrence, so
/// they never straddle a threshold; a group can end up empty as a result.
#[derive(Debug, Clone, Copy, Default)]
pub struct TertilePartitioner;

impl GroupPartitioner for TertilePartitioner {
    fn name(&self) -> &'static str {
        "tertile"
    }

    fn partition(&self, request: &PartitionRequest) -> Result<Partition, PartitionError> {
        request.validate()?;
        let n = request.values.len();
        let k = request.groups;
        let order = request.sorted_indices();

        let mut assignments = vec![0usize; n];
        let mut run_rank = 0usize;
        let mut previous: Option<f64> = None;
        for (rank, &index) in order.iter().enumerate() {
            let value = request.values.get(index).copied().unwrap_or(f64::NAN);
            if previous.map_or(true, |p| value > p) {
                run_rank = rank;
                previous = Some(value);
            }
            if let Some(slot) = assignments.get_mut(index) {
                *slot = (run_rank * k / n).min(k - 1);
            }
        }

        Ok(Partition::canonical(self.name(), &request.values, &assignments, k))
    }
}
