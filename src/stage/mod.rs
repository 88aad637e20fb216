pub mod pipeline;
pub mod types;

pub use pipeline::{argmax, StagePipeline};
pub use types::{ClassConfidence, ClassifyOutcome, ImageRejection, PredictionResult};
