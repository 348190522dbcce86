use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::KMeansConfig;
use crate::error::PartitionError;
use crate::traits::GroupPartitioner;
use crate::types::{Partition, PartitionRequest};

/// Lloyd's k-means over one feature.
///
/// Every call starts from the same state: one run seeded at evenly spaced
/// quantiles of the distinct values, then `n_init` k-means++ runs drawn from a
/// `ChaCha8Rng` seeded with `config.seed`. The lowest-inertia run wins and an
/// earlier run wins a tie.
#[derive(Debug, Clone)]
pub struct KMeansPartitioner {
    config: KMeansConfig,
}

struct Run {
    assignments: Vec<usize>,
    inertia: f64,
    iterations: usize,
}

impl KMeansPartitioner {
    pub fn new(config: KMeansConfig) -> Result<Self, PartitionError> {
        if config.max_iterations == 0 {
            return Err(PartitionError::Config(
                "k-means max_iterations must be at least 1".to_string(),
            ));
        }
        if !config.tolerance.is_finite() || config.tolerance < 0.0 {
            return Err(PartitionError::Config(
                "k-means tolerance must be a non-negative number".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    fn quantile_centers(values: &[f64], k: usize) -> Vec<f64> {
        let mut distinct = values.to_vec();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        let n = distinct.len();
        (0..k)
            .filter_map(|i| {
                let pos = ((2 * i + 1) * n) / (2 * k);
                distinct.get(pos.min(n.saturating_sub(1))).copied()
            })
            .collect()
    }

    fn plus_plus_centers(values: &[f64], k: usize, rng: &mut ChaCha8Rng) -> Vec<f64> {
        let mut centers = Vec::with_capacity(k);
        if let Some(&first) = values.get(rng.gen_range(0..values.len())) {
            centers.push(first);
        }

        while centers.len() < k {
            let weights: Vec<f64> = values
                .iter()
                .map(|v| nearest(&centers, *v).1)
                .collect();
            let total: f64 = weights.iter().sum();

            let next = if total > 0.0 {
                let target = rng.gen_range(0.0..total);
                let mut acc = 0.0;
                values
                    .iter()
                    .zip(&weights)
                    .find(|(_, w)| {
                        acc += **w;
                        acc > target
                    })
                    .map(|(v, _)| *v)
                    .or_else(|| values.last().copied())
            } else {
                values.iter().copied().find(|v| !centers.contains(v))
            };

            match next {
                Some(center) => centers.push(center),
                None => break,
            }
        }
        centers
    }

    #[allow(clippy::cast_precision_loss)]
    fn lloyd(&self, values: &[f64], mut centers: Vec<f64>) -> Run {
        let mut assignments = vec![0usize; values.len()];
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;
            for (slot, v) in assignments.iter_mut().zip(values) {
                *slot = nearest(&centers, *v).0;
            }

            let mut sums = vec![0.0_f64; centers.len()];
            let mut counts = vec![0usize; centers.len()];
            for (&g, v) in assignments.iter().zip(values) {
                if let (Some(sum), Some(count)) = (sums.get_mut(g), counts.get_mut(g)) {
                    *sum += v;
                    *count += 1;
                }
            }

            let mut shift = 0.0_f64;
            for ((center, sum), count) in centers.iter_mut().zip(sums).zip(counts) {
                // An empty cluster keeps its previous center.
                if count > 0 {
                    let updated = sum / count as f64;
                    shift = shift.max((updated - *center).abs());
                    *center = updated;
                }
            }

            if shift <= self.config.tolerance {
                break;
            }
        }

        let mut inertia = 0.0;
        for (slot, v) in assignments.iter_mut().zip(values) {
            let (group, dist) = nearest(&centers, *v);
            *slot = group;
            inertia += dist;
        }

        Run {
            assignments,
            inertia,
            iterations,
        }
    }
}

impl Default for KMeansPartitioner {
    fn default() -> Self {
        Self {
            config: KMeansConfig::default(),
        }
    }
}

/// Index of and squared distance to the closest center; lower index wins ties.
fn nearest(centers: &[f64], value: f64) -> (usize, f64) {
    let mut best = (0usize, f64::INFINITY);
    for (i, c) in centers.iter().enumerate() {
        let d = (value - c) * (value - c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

impl GroupPartitioner for KMeansPartitioner {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn partition(&self, request: &PartitionRequest) -> Result<Partition, PartitionError> {
        request.validate()?;
        let values = &request.values;
        let k = request.groups;

        let mut best = self.lloyd(values, Self::quantile_centers(values, k));
        log::debug!(
            "kmeans quantile run: inertia={:.4} iterations={}",
            best.inertia,
            best.iterations
        );

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        for restart in 0..self.config.n_init {
            let run = self.lloyd(values, Self::plus_plus_centers(values, k, &mut rng));
            log::debug!(
                "kmeans restart {restart}: inertia={:.4} iterations={}",
                run.inertia,
                run.iterations
            );
            if run.inertia < best.inertia {
                best = run;
            }
        }

        Ok(Partition::canonical(
            self.name(),
            values,
            &best.assignments,
            k,
        ))
    }
}
