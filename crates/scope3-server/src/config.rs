use std::path::PathBuf;

use scope3_core::{
    CarbonPrice, CarbonPriceBounds, KMeansConfig, PartitionerConfig, PipelinePolicy, ValidationMode,
    DEFAULT_KMEANS_SEED, DEFAULT_TOP_N,
};

pub const MAX_TOP_N: usize = 50;
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8788";

/// Runtime settings for [`crate::DashboardServer`], read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub carbon_price: CarbonPrice,
    pub bounds: CarbonPriceBounds,
    pub top_n: usize,
    pub partitioner: PartitionerConfig,
    pub validation: ValidationMode,
    /// `None` serves the embedded sample table.
    pub dataset: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            carbon_price: CarbonPrice::default(),
            bounds: CarbonPriceBounds::default(),
            top_n: DEFAULT_TOP_N,
            partitioner: PartitionerConfig::default(),
            validation: ValidationMode::default(),
            dataset: None,
        }
    }
}

impl ServerConfig {
    /// Reads `SCOPE3_*` variables. Malformed or out-of-range values fall back
    /// to defaults or are clamped; they never abort startup.
    pub fn from_env() -> Self {
        let bounds = CarbonPriceBounds::default();
        let carbon_price = CarbonPrice::clamped(
            env_f64("SCOPE3_CARBON_PRICE", bounds.default, bounds.min, bounds.max),
            &bounds,
        );
        let top_n = env_usize("SCOPE3_TOP_N", DEFAULT_TOP_N, 1, MAX_TOP_N);
        let seed = env_u64("SCOPE3_KMEANS_SEED", DEFAULT_KMEANS_SEED);

        let kmeans = || PartitionerConfig::KMeans(KMeansConfig::new(seed));
        let partitioner = match std::env::var("SCOPE3_PARTITIONER") {
            Ok(name) => PartitionerConfig::from_name(&name, seed).unwrap_or_else(|err| {
                log::warn!("{err}; using kmeans");
                kmeans()
            }),
            Err(_) => kmeans(),
        };

        let validation = std::env::var("SCOPE3_VALIDATION")
            .ok()
            .and_then(|raw| {
                let mode = ValidationMode::from_name(&raw);
                if mode.is_none() {
                    log::warn!("unknown SCOPE3_VALIDATION '{raw}'; using per_record");
                }
                mode
            })
            .unwrap_or_default();

        let dataset = std::env::var("SCOPE3_DATASET")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            carbon_price,
            bounds,
            top_n,
            partitioner,
            validation,
            dataset,
        }
    }

    pub fn policy(&self) -> PipelinePolicy {
        PipelinePolicy {
            top_n: self.top_n,
            validation: self.validation,
        }
    }
}

pub(crate) fn env_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

pub(crate) fn env_f64(name: &str, default: f64, min: f64, max: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.carbon_price.value(), 4000.0);
        assert_eq!(cfg.top_n, 3);
        assert_eq!(cfg.validation, ValidationMode::PerRecord);
        assert!(cfg.dataset.is_none());
        assert!(matches!(cfg.partitioner, PartitionerConfig::KMeans(_)));
        assert_eq!(cfg.policy().top_n, 3);
    }

    #[test]
    fn env_helpers_fall_back_and_clamp() {
        assert_eq!(env_usize("SCOPE3_TEST_UNSET_USIZE", 3, 1, 50), 3);
        assert_eq!(env_f64("SCOPE3_TEST_UNSET_F64", 99_999.0, 1000.0, 15000.0), 15000.0);
        assert_eq!(env_u64("SCOPE3_TEST_UNSET_U64", 42), 42);
    }
}
