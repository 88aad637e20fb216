pub mod classifier;
pub mod manager;

pub use classifier::{OnnxClassifier, StageClassifier};
pub use manager::{ModelManager, ModelStats};
