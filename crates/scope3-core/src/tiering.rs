use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use scope3_partition::{GroupPartitioner, PartitionError, PartitionRequest};
use serde::{Deserialize, Serialize};

use crate::error::DecisionError;

/// Number of risk tiers the engine partitions into.
pub const RISK_GROUPS: usize = 3;

/// Name reported when clustering is skipped in favour of exact-value grouping.
pub const FALLBACK_PARTITIONER: &str = "exact_value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupplierTier {
    pub cluster_id: usize,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub cluster_id: usize,
    pub risk_level: RiskLevel,
    pub mean_emissions_kg: f64,
    pub size: usize,
}

/// Recorded when there are fewer distinct emission values than tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DegenerateClustering {
    pub distinct_values: usize,
    pub requested_groups: usize,
}

impl fmt::Display for DegenerateClustering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} distinct emission value(s) for {} risk groups",
            self.distinct_values, self.requested_groups
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierAssignment {
    pub partitioner: String,
    /// One entry per input value, in input order.
    pub tiers: Vec<SupplierTier>,
    /// Non-empty groups ordered by `cluster_id`.
    pub groups: Vec<GroupSummary>,
    pub degenerate: Option<DegenerateClustering>,
}

/// Partitions emissions into [`RISK_GROUPS`] groups and labels them.
///
/// Labelling ranks the non-empty groups by mean emissions, then by size, then
/// by the earliest supplier they contain (earlier ranks higher). The top group
/// is High, the bottom group Low, anything between Medium. A single group is
/// Medium. `cluster_id` is the group's position in that ranking, lowest first.
///
/// With fewer than [`RISK_GROUPS`] distinct values the partitioner is skipped
/// and suppliers are grouped by exact emission value instead.
#[derive(Clone)]
pub struct RiskTieringEngine {
    partitioner: Arc<dyn GroupPartitioner>,
}

impl RiskTieringEngine {
    pub fn new(partitioner: Arc<dyn GroupPartitioner>) -> Self {
        Self { partitioner }
    }

    pub fn partitioner_name(&self) -> &'static str {
        self.partitioner.name()
    }

    pub fn assign(&self, emissions: &[f64]) -> Result<TierAssignment, DecisionError> {
        let request = PartitionRequest::new(emissions.to_vec(), RISK_GROUPS);
        let distinct = request.distinct_count();
        let degenerate = DegenerateClustering {
            distinct_values: distinct,
            requested_groups: RISK_GROUPS,
        };

        if distinct < RISK_GROUPS {
            log::warn!("risk tiering fallback: {degenerate}");
            return Ok(labelled(
                FALLBACK_PARTITIONER,
                emissions,
                &exact_value_groups(emissions),
                Some(degenerate),
            ));
        }

        match self.partitioner.partition(&request) {
            Ok(partition) if partition.assignments.len() != emissions.len() => {
                Err(PartitionError::AssignmentCountMismatch {
                    expected: emissions.len(),
                    actual: partition.assignments.len(),
                }
                .into())
            }
            Ok(partition) => Ok(labelled(
                self.partitioner.name(),
                emissions,
                &partition.assignments,
                None,
            )),
            Err(PartitionError::TooFewDistinctValues { .. }) => {
                log::warn!(
                    "{} reported too few distinct values; risk tiering fallback: {degenerate}",
                    self.partitioner.name()
                );
                Ok(labelled(
                    FALLBACK_PARTITIONER,
                    emissions,
                    &exact_value_groups(emissions),
                    Some(degenerate),
                ))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl fmt::Debug for RiskTieringEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskTieringEngine")
            .field("partitioner", &self.partitioner.name())
            .finish()
    }
}

/// Group id per value: the rank of its value among the distinct values.
fn exact_value_groups(emissions: &[f64]) -> Vec<usize> {
    let mut distinct = emissions.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    emissions
        .iter()
        .map(|v| {
            distinct
                .binary_search_by(|probe| probe.total_cmp(v))
                .unwrap_or_default()
        })
        .collect()
}

struct GroupStats {
    raw_id: usize,
    sum: f64,
    size: usize,
    first_index: usize,
}

impl GroupStats {
    #[allow(clippy::cast_precision_loss)]
    fn mean(&self) -> f64 {
        self.sum / self.size as f64
    }
}

/// Lower-ranked groups order first.
fn rank_order(a: &GroupStats, b: &GroupStats) -> Ordering {
    a.mean()
        .total_cmp(&b.mean())
        .then(a.size.cmp(&b.size))
        .then(b.first_index.cmp(&a.first_index))
}

fn labelled(
    partitioner: &str,
    emissions: &[f64],
    raw_assignments: &[usize],
    degenerate: Option<DegenerateClustering>,
) -> TierAssignment {
    let mut stats: BTreeMap<usize, GroupStats> = BTreeMap::new();
    for (index, (value, &raw_id)) in emissions.iter().zip(raw_assignments).enumerate() {
        let entry = stats.entry(raw_id).or_insert(GroupStats {
            raw_id,
            sum: 0.0,
            size: 0,
            first_index: index,
        });
        entry.sum += value;
        entry.size += 1;
    }

    let mut ranked: Vec<GroupStats> = stats.into_values().collect();
    ranked.sort_by(rank_order);

    let top = ranked.len().saturating_sub(1);
    let label = |position: usize| {
        if ranked.len() < 2 {
            RiskLevel::Medium
        } else if position == top {
            RiskLevel::High
        } else if position == 0 {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    };

    let groups: Vec<GroupSummary> = ranked
        .iter()
        .enumerate()
        .map(|(position, g)| GroupSummary {
            cluster_id: position,
            risk_level: label(position),
            mean_emissions_kg: g.mean(),
            size: g.size,
        })
        .collect();

    let by_raw: BTreeMap<usize, SupplierTier> = ranked
        .iter()
        .zip(&groups)
        .map(|(g, summary)| {
            (
                g.raw_id,
                SupplierTier {
                    cluster_id: summary.cluster_id,
                    risk_level: summary.risk_level,
                },
            )
        })
        .collect();

    let tiers = raw_assignments
        .iter()
        .filter_map(|raw_id| by_raw.get(raw_id).copied())
        .collect();

    TierAssignment {
        partitioner: partitioner.to_string(),
        tiers,
        groups,
        degenerate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scope3_partition::{build_partitioner, Partition, PartitionerConfig};

    fn engine() -> RiskTieringEngine {
        RiskTieringEngine::new(build_partitioner(PartitionerConfig::default()).expect("kmeans"))
    }

    fn levels(assignment: &TierAssignment) -> Vec<RiskLevel> {
        assignment.tiers.iter().map(|t| t.risk_level).collect()
    }

    #[test]
    fn labels_sample_dataset_by_group_mean() {
        let emissions = [7200.0, 44000.0, 19200.0, 6480.0, 75000.0, 54000.0];
        let out = engine().assign(&emissions).expect("assign");
        use RiskLevel::{High, Low, Medium};
        assert_eq!(levels(&out), vec![Low, Medium, Low, Low, High, Medium]);
        let ids: Vec<usize> = out.tiers.iter().map(|t| t.cluster_id).collect();
        assert_eq!(ids, vec![0, 1, 0, 0, 2, 1]);
        assert_eq!(out.partitioner, "kmeans");
        assert!(out.degenerate.is_none());

        let means: Vec<f64> = out.groups.iter().map(|g| g.mean_emissions_kg).collect();
        assert_eq!(means, vec![10960.0, 49000.0, 75000.0]);
    }

    #[test]
    fn exactly_one_high_and_one_low() {
        let emissions = [1.0, 2.0, 3.0, 50.0, 51.0, 52.0, 400.0, 401.0, 9.0, 10.0];
        let out = engine().assign(&emissions).expect("assign");
        let highs = out.groups.iter().filter(|g| g.risk_level == RiskLevel::High).count();
        let lows = out.groups.iter().filter(|g| g.risk_level == RiskLevel::Low).count();
        assert_eq!((highs, lows), (1, 1));

        let high = out
            .groups
            .iter()
            .find(|g| g.risk_level == RiskLevel::High)
            .expect("high group");
        assert!(out.groups.iter().all(|g| g.mean_emissions_kg <= high.mean_emissions_kg));
    }

    #[test]
    fn fewer_than_three_records_fall_back() {
        let single = engine().assign(&[42.0]).expect("single");
        assert_eq!(levels(&single), vec![RiskLevel::Medium]);
        assert_eq!(single.partitioner, FALLBACK_PARTITIONER);
        assert_eq!(
            single.degenerate,
            Some(DegenerateClustering {
                distinct_values: 1,
                requested_groups: 3
            })
        );

        let pair = engine().assign(&[900.0, 10.0]).expect("pair");
        assert_eq!(levels(&pair), vec![RiskLevel::High, RiskLevel::Low]);
        let ids: Vec<usize> = pair.tiers.iter().map(|t| t.cluster_id).collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn identical_emissions_are_all_medium() {
        let out = engine().assign(&[5.0, 5.0, 5.0, 5.0]).expect("assign");
        assert!(levels(&out).iter().all(|l| *l == RiskLevel::Medium));
        assert_eq!(out.groups.len(), 1);
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let out = engine().assign(&[]).expect("assign");
        assert!(out.tiers.is_empty());
        assert!(out.groups.is_empty());
    }

    struct SplitEqualValues;

    impl GroupPartitioner for SplitEqualValues {
        fn name(&self) -> &'static str {
            "split"
        }

        fn partition(&self, request: &PartitionRequest) -> Result<Partition, PartitionError> {
            // Alternates groups regardless of value, producing equal-mean groups.
            let assignments: Vec<usize> = (0..request.values.len()).map(|i| i % 3).collect();
            Ok(Partition {
                provider: "split".to_string(),
                assignments,
                centers: vec![None; 3],
                inertia: 0.0,
            })
        }
    }

    #[test]
    fn equal_means_break_ties_by_size_then_insertion_order() {
        // Groups: {0,3,6} -> mean 3, size 3; {1,4} -> mean 3, size 2; {2,5} -> mean 3, size 2.
        let emissions = [1.0, 2.0, 4.0, 3.0, 4.0, 2.0, 5.0];
        let engine = RiskTieringEngine::new(Arc::new(SplitEqualValues));
        let out = engine.assign(&emissions).expect("assign");

        // Largest group ranks highest; between the two pairs the one holding
        // supplier 1 is earlier and so ranks above the one holding supplier 2.
        let first = out.tiers.first().expect("tier 0");
        assert_eq!(first.risk_level, RiskLevel::High);
        assert_eq!(out.tiers.get(1).map(|t| t.risk_level), Some(RiskLevel::Medium));
        assert_eq!(out.tiers.get(2).map(|t| t.risk_level), Some(RiskLevel::Low));
    }

    struct DropsLastValue;

    impl GroupPartitioner for DropsLastValue {
        fn name(&self) -> &'static str {
            "short"
        }

        fn partition(&self, request: &PartitionRequest) -> Result<Partition, PartitionError> {
            let kept = request.values.len().saturating_sub(1);
            Ok(Partition {
                provider: "short".to_string(),
                assignments: (0..kept).map(|i| i % 3).collect(),
                centers: vec![None; 3],
                inertia: 0.0,
            })
        }
    }

    #[test]
    fn short_assignment_list_is_an_error() {
        let engine = RiskTieringEngine::new(Arc::new(DropsLastValue));
        let err = engine
            .assign(&[1.0, 2.0, 3.0, 4.0])
            .expect_err("one supplier would be dropped");
        assert_eq!(
            err,
            DecisionError::Partition(PartitionError::AssignmentCountMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn repeated_runs_are_identical() {
        let emissions = [12.5, 80.0, 3.0, 81.5, 40.0, 39.0, 7.0, 150.0];
        let a = engine().assign(&emissions).expect("a");
        let b = engine().assign(&emissions).expect("b");
        assert_eq!(a, b);
    }
}
