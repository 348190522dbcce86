use crate::error::PartitionError;
use crate::traits::GroupPartitioner;
use crate::types::{Partition, PartitionRequest};

/// Optimal 1-D k-means by dynamic programming over the sorted values
/// (the Ckmeans.1d.dp formulation). Fully deterministic, O(k * n^2).
///
/// Breaks are only placed between different values, so equal emissions always
/// share a group.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalBreaksPartitioner;

#[allow(clippy::indexing_slicing, clippy::cast_precision_loss)]
fn optimal_breaks(sorted: &[f64], k: usize) -> Vec<usize> {
    let n = sorted.len();
    let mut s1 = vec![0.0_f64; n + 1];
    let mut s2 = vec![0.0_f64; n + 1];
    for (i, v) in sorted.iter().enumerate() {
        s1[i + 1] = s1[i] + v;
        s2[i + 1] = s2[i] + v * v;
    }
    // Within-group sum of squares for sorted[i..=j].
    let sse = |i: usize, j: usize| -> f64 {
        let count = (j - i + 1) as f64;
        let sum = s1[j + 1] - s1[i];
        (s2[j + 1] - s2[i] - sum * sum / count).max(0.0)
    };
    let can_break_at = |i: usize| i == 0 || sorted[i] > sorted[i - 1];

    let mut cost = vec![vec![f64::INFINITY; n]; k];
    let mut start = vec![vec![0usize; n]; k];
    for j in 0..n {
        cost[0][j] = sse(0, j);
    }
    for m in 1..k {
        for j in m..n {
            for i in m..=j {
                if !can_break_at(i) || !cost[m - 1][i - 1].is_finite() {
                    continue;
                }
                let candidate = cost[m - 1][i - 1] + sse(i, j);
                if candidate < cost[m][j] {
                    cost[m][j] = candidate;
                    start[m][j] = i;
                }
            }
        }
    }

    // Group index per sorted position.
    let mut groups = vec![0usize; n];
    let mut end = n;
    for m in (0..k).rev() {
        if end == 0 {
            break;
        }
        let first = if m == 0 { 0 } else { start[m][end - 1] };
        for slot in &mut groups[first..end] {
            *slot = m;
        }
        end = first;
    }
    groups
}

impl GroupPartitioner for NaturalBreaksPartitioner {
    fn name(&self) -> &'static str {
        "natural_breaks"
    }

    fn partition(&self, request: &PartitionRequest) -> Result<Partition, PartitionError> {
        request.validate()?;
        let order = request.sorted_indices();
        let sorted: Vec<f64> = order
            .iter()
            .filter_map(|&i| request.values.get(i).copied())
            .collect();

        let sorted_groups = optimal_breaks(&sorted, request.groups);
        let mut assignments = vec![0usize; request.values.len()];
        for (&index, &group) in order.iter().zip(&sorted_groups) {
            if let Some(slot) = assignments.get_mut(index) {
                *slot = group;
            }
        }

        Ok(Partition::canonical(
            self.name(),
            &request.values,
            &assignments,
            request.groups,
        ))
    }
}
