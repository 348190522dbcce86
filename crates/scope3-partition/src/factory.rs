use std::sync::Arc;

use crate::config::PartitionerConfig;
use crate::error::PartitionError;
use crate::providers::{KMeansPartitioner, NaturalBreaksPartitioner, TertilePartitioner};
use crate::traits::GroupPartitioner;

pub fn build_partitioner(
    cfg: PartitionerConfig,
) -> Result<Arc<dyn GroupPartitioner>, PartitionError> {
    match cfg {
        PartitionerConfig::KMeans(c) => Ok(Arc::new(KMeansPartitioner::new(c)?)),
        PartitionerConfig::NaturalBreaks => Ok(Arc::new(NaturalBreaksPartitioner)),
        PartitionerConfig::Tertile => Ok(Arc::new(TertilePartitioner)),
    }
}
