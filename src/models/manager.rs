use crate::models::{OnnxClassifier, StageClassifier};
use crate::utils::error::StageError;
use crate::{Config, Result};
use serde::Serialize;
use std::sync::Arc;

/// 模型加载状态，进程启动时确定，之后不再变化
#[derive(Clone)]
enum ModelState {
    Ready(Arc<dyn StageClassifier>),
    Unavailable(String),
}

/// 模型管理器：启动时加载一次分类器，显式传递给流水线
#[derive(Clone)]
pub struct ModelManager {
    state: ModelState,
}

impl ModelManager {
    /// 加载分类模型；失败时进入降级状态而不是中止启动
    pub fn load(config: &Config) -> Self {
        tracing::info!("Initializing model manager...");

        match OnnxClassifier::new(config) {
            Ok(classifier) => {
                tracing::info!("Classification model loaded successfully");
                Self::with_classifier(Arc::new(classifier))
            }
            Err(e) => {
                tracing::warn!("Failed to load classification model: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn with_classifier(classifier: Arc<dyn StageClassifier>) -> Self {
        Self {
            state: ModelState::Ready(classifier),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable(reason.into()),
        }
    }

    /// 获取分类器引用；降级状态返回 `ModelUnavailable`
    pub fn classifier(&self) -> Result<Arc<dyn StageClassifier>> {
        match &self.state {
            ModelState::Ready(classifier) => Ok(Arc::clone(classifier)),
            ModelState::Unavailable(reason) => Err(StageError::ModelUnavailable(reason.clone())),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    /// 模型健康检查
    pub fn health_check(&self) -> Result<()> {
        self.classifier().map(|_| ())
    }

    /// 获取模型统计信息
    pub fn get_stats(&self, config: &Config) -> ModelStats {
        let (model, unavailable_reason) = match &self.state {
            ModelState::Ready(classifier) => (Some(classifier.describe()), None),
            ModelState::Unavailable(reason) => (None, Some(reason.clone())),
        };

        ModelStats {
            model_loaded: self.is_loaded(),
            model,
            unavailable_reason,
            intra_threads: config.onnx_config.intra_threads,
            optimization_level: config.onnx_config.optimization_level,
            input_width: config.preprocess_config.width,
            input_height: config.preprocess_config.height,
        }
    }
}

/// 模型统计信息
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
    pub intra_threads: usize,
    pub optimization_level: i32,
    pub input_width: u32,
    pub input_height: u32,
}
