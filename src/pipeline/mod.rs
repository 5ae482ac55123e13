// Data processing pipeline: the synchronous core the use cases drive

pub mod processing;

// Re-export the stage entry points
pub use processing::fusion::{FusionConfig, FusionOutcome, SourceFusionEngine};
pub use processing::rating::{NormalizationConfig, RatingNormalizer};
pub use processing::title::normalize_title;
