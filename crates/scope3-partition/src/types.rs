use crate::error::PartitionError;

#[derive(Debug, Clone)]
pub struct PartitionRequest {
    pub values: Vec<f64>,
    pub groups: usize,
}

impl PartitionRequest {
    pub fn new(values: Vec<f64>, groups: usize) -> Self {
        Self { values, groups }
    }

    pub fn distinct_count(&self) -> usize {
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        sorted.dedup();
        sorted.len()
    }

    /// Checks the preconditions every provider shares.
    pub fn validate(&self) -> Result<(), PartitionError> {
        if self.groups == 0 {
            return Err(PartitionError::InvalidGroupCount(self.groups));
        }
        if self.values.is_empty() {
            return Err(PartitionError::EmptyInput);
        }
        if let Some(index) = self.values.iter().position(|v| !v.is_finite()) {
            return Err(PartitionError::NonFiniteValue { index });
        }
        let distinct = self.distinct_count();
        if distinct < self.groups {
            return Err(PartitionError::TooFewDistinctValues {
                distinct,
                groups: self.groups,
            });
        }
        Ok(())
    }

    /// Indices of `values` in ascending value order, ties kept in input order.
    pub fn sorted_indices(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| {
            let va = self.values.get(a).copied().unwrap_or(f64::NAN);
            let vb = self.values.get(b).copied().unwrap_or(f64::NAN);
            va.total_cmp(&vb).then(a.cmp(&b))
        });
        order
    }
}

#[derive(Debug, Clone)]
pub struct Partition {
    pub provider: String,
    /// One group id per input value, in input order.
    pub assignments: Vec<usize>,
    /// Mean of each group; `None` when the group ended up empty.
    pub centers: Vec<Option<f64>>,
    /// Sum of squared distances to the group mean.
    pub inertia: f64,
}

impl Partition {
    /// Builds a partition with group ids renumbered by ascending center, so
    /// the ids do not depend on how a provider happened to order its groups.
    pub fn canonical(
        provider: impl Into<String>,
        values: &[f64],
        assignments: &[usize],
        groups: usize,
    ) -> Self {
        let raw_centers = group_means(values, assignments, groups);

        let mut order: Vec<usize> = (0..groups).collect();
        order.sort_by(|&a, &b| {
            let ca = raw_centers.get(a).copied().flatten();
            let cb = raw_centers.get(b).copied().flatten();
            match (ca, cb) {
                (Some(x), Some(y)) => x.total_cmp(&y).then(a.cmp(&b)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.cmp(&b),
            }
        });
        let mut relabel = vec![0usize; groups];
        for (new_id, &old_id) in order.iter().enumerate() {
            if let Some(slot) = relabel.get_mut(old_id) {
                *slot = new_id;
            }
        }

        let assignments: Vec<usize> = assignments
            .iter()
            .map(|&g| relabel.get(g).copied().unwrap_or(g))
            .collect();
        let centers = group_means(values, &assignments, groups);
        let inertia = values
            .iter()
            .zip(&assignments)
            .map(|(v, g)| {
                let c = centers.get(*g).copied().flatten().unwrap_or(*v);
                (v - c) * (v - c)
            })
            .sum();

        Self {
            provider: provider.into(),
            assignments,
            centers,
            inertia,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn group_means(values: &[f64], assignments: &[usize], groups: usize) -> Vec<Option<f64>> {
    let mut sums = vec![0.0_f64; groups];
    let mut counts = vec![0usize; groups];
    for (v, &g) in values.iter().zip(assignments) {
        if let (Some(sum), Some(count)) = (sums.get_mut(g), counts.get_mut(g)) {
            *sum += v;
            *count += 1;
        }
    }
    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_reports_first_problem() {
        assert_eq!(
            PartitionRequest::new(vec![1.0], 0).validate(),
            Err(PartitionError::InvalidGroupCount(0))
        );
        assert_eq!(
            PartitionRequest::new(vec![], 3).validate(),
            Err(PartitionError::EmptyInput)
        );
        assert_eq!(
            PartitionRequest::new(vec![1.0, f64::NAN, 3.0], 3).validate(),
            Err(PartitionError::NonFiniteValue { index: 1 })
        );
        assert_eq!(
            PartitionRequest::new(vec![1.0, 1.0, 2.0], 3).validate(),
            Err(PartitionError::TooFewDistinctValues {
                distinct: 2,
                groups: 3
            })
        );
        assert!(PartitionRequest::new(vec![3.0, 1.0, 2.0], 3).validate().is_ok());
    }

    #[test]
    fn canonical_orders_groups_by_center() {
        let values = [50.0, 1.0, 20.0, 2.0];
        let p = Partition::canonical("test", &values, &[0, 2, 1, 2], 3);
        assert_eq!(p.assignments, vec![2, 0, 1, 0]);
        assert_eq!(p.centers, vec![Some(1.5), Some(20.0), Some(50.0)]);
        assert!((p.inertia - 0.5).abs() < 1e-12);
    }

    #[test]
    fn canonical_puts_empty_groups_last() {
        let values = [5.0, 1.0];
        let p = Partition::canonical("test", &values, &[2, 0], 3);
        assert_eq!(p.assignments, vec![1, 0]);
        assert_eq!(p.centers, vec![Some(1.0), Some(5.0), None]);
    }
}
