use scope3_core::DecisionError;
use scope3_dataset::DatasetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("decision engine error: {0}")]
    Decision(#[from] DecisionError),
}
