pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod pricing;
pub mod record;
pub mod report;
pub mod tiering;

pub use error::DecisionError;
pub use metrics::*;
pub use pipeline::*;
pub use pricing::*;
pub use record::*;
pub use report::*;
pub use tiering::*;

pub use scope3_partition::{
    build_partitioner, GroupPartitioner, KMeansConfig, PartitionError, PartitionerConfig,
    DEFAULT_KMEANS_SEED,
};
