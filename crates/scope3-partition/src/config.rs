use crate::error::PartitionError;

/// Seed of the legacy dashboard's clustering.
pub const DEFAULT_KMEANS_SEED: u64 = 42;

#[derive(Debug, Clone)]
pub struct KMeansConfig {
    pub seed: u64,
    /// Random k-means++ restarts on top of the deterministic quantile run.
    pub n_init: usize,
    pub max_iterations: usize,
    /// Lloyd iterations stop once no center moves further than this.
    pub tolerance: f64,
}

impl KMeansConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-9,
        }
    }
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self::new(DEFAULT_KMEANS_SEED)
    }
}

#[derive(Debug, Clone)]
pub enum PartitionerConfig {
    KMeans(KMeansConfig),
    NaturalBreaks,
    Tertile,
}

impl PartitionerConfig {
    /// Resolves a partitioner by its provider name. `seed` only applies to k-means.
    pub fn from_name(name: &str, seed: u64) -> Result<Self, PartitionError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "kmeans" | "k-means" | "k_means" => Ok(Self::KMeans(KMeansConfig::new(seed))),
            "natural_breaks" | "natural-breaks" | "ckmeans" => Ok(Self::NaturalBreaks),
            "tertile" | "quantile" => Ok(Self::Tertile),
            other => Err(PartitionError::Config(format!(
                "unknown partitioner '{other}', expected kmeans, natural_breaks or tertile"
            ))),
        }
    }
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self::KMeans(KMeansConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_names_case_insensitively() {
        assert!(matches!(
            PartitionerConfig::from_name(" KMeans ", 7),
            Ok(PartitionerConfig::KMeans(KMeansConfig { seed: 7, .. }))
        ));
        assert!(matches!(
            PartitionerConfig::from_name("natural-breaks", 0),
            Ok(PartitionerConfig::NaturalBreaks)
        ));
        assert!(matches!(
            PartitionerConfig::from_name("tertile", 0),
            Ok(PartitionerConfig::Tertile)
        ));
        assert!(PartitionerConfig::from_name("dbscan", 0).is_err());
    }
}
