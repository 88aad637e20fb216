pub mod catalog;
pub mod config;
pub mod image;
pub mod models;
pub mod stage;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use catalog::{CareInstructionRecord, ClassLabel, LabelCatalog};
pub use config::Config;
pub use stage::{ClassifyOutcome, PredictionResult, StagePipeline};
pub use utils::error::StageError;

pub type Result<T> = std::result::Result<T, StageError>;
