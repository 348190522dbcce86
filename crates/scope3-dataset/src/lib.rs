pub mod error;
pub mod loader;
pub mod sample;

pub use error::DatasetError;
pub use loader::*;
pub use sample::*;
