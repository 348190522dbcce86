pub mod kmeans;
pub mod natural_breaks;
pub mod tertile;

pub use kmeans::KMeansPartitioner;
pub use natural_breaks::NaturalBreaksPartitioner;
pub use tertile::TertilePartitioner;
