use crate::{
    catalog::LabelCatalog,
    image::{ImagePreprocessor, Preprocessor},
    models::ModelManager,
    stage::{ClassConfidence, ClassifyOutcome, ImageRejection, PredictionResult},
    utils::error::StageError,
    Config, Result,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// 概率和允许的偏差
pub const PROBABILITY_SUM_TOLERANCE: f32 = 1e-4;

/// 生长阶段分类流水线：预处理 → 推理 → 标签映射 → 养护建议
pub struct StagePipeline {
    models: Arc<ModelManager>,
    preprocessor: Arc<dyn Preprocessor>,
    catalog: Arc<LabelCatalog>,
}

impl StagePipeline {
    pub fn new(
        models: Arc<ModelManager>,
        preprocessor: Arc<dyn Preprocessor>,
        catalog: Arc<LabelCatalog>,
    ) -> Self {
        Self {
            models,
            preprocessor,
            catalog,
        }
    }

    /// 按配置加载模型，使用默认预处理和内置标签目录
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(ModelManager::load(config)),
            Arc::new(ImagePreprocessor::new(config.preprocess_config)),
            Arc::new(LabelCatalog::tomato_stages()),
        )
    }

    pub fn models(&self) -> &ModelManager {
        &self.models
    }

    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    /// 对一张图像分类
    ///
    /// 单次请求的失败都转换为 [`ClassifyOutcome`]；只有分类器输出与标签目录
    /// 不一致时返回 `Err`，调用方不应以默认标签替代。
    pub fn classify(&self, path: Option<&Path>) -> Result<ClassifyOutcome> {
        let start_time = Instant::now();

        let classifier = match self.models.classifier() {
            Ok(classifier) => classifier,
            Err(e) => {
                tracing::debug!("Skipping classification: {}", e);
                return Ok(ClassifyOutcome::ModelUnavailable {
                    reason: e.to_string(),
                });
            }
        };

        let path = match path {
            Some(path) => path,
            None => return Ok(ClassifyOutcome::NoInput),
        };

        let tensor = match self.preprocessor.preprocess(path) {
            Ok(tensor) => tensor,
            Err(e) => {
                tracing::warn!("Could not process image {}: {}", path.display(), e);
                return Ok(Self::rejection(e));
            }
        };

        let probabilities = match classifier.infer(tensor) {
            Ok(probabilities) => probabilities,
            Err(e) => {
                tracing::warn!("Inference failed for {}: {}", path.display(), e);
                return Ok(ClassifyOutcome::InferenceFailed {
                    message: e.to_string(),
                });
            }
        };

        if probabilities.len() != self.catalog.len() {
            return Err(StageError::CatalogMismatch {
                expected: self.catalog.len(),
                actual: probabilities.len(),
            });
        }

        if let Err(message) = validate_probabilities(&probabilities) {
            tracing::warn!("Malformed classifier output {:?}: {}", probabilities, message);
            return Ok(ClassifyOutcome::InferenceFailed { message });
        }

        let predicted_index = argmax(&probabilities).ok_or_else(|| {
            StageError::Inference("classifier returned no probabilities".to_string())
        })?;
        let entry = self.catalog.lookup(predicted_index)?;

        let per_class_confidences = self
            .catalog
            .labels()
            .zip(probabilities.iter())
            .map(|(label, &confidence)| ClassConfidence { label, confidence })
            .collect();

        let result = PredictionResult {
            predicted_label: entry.label,
            confidence: probabilities[predicted_index],
            per_class_confidences,
            care: entry.care.clone(),
            processing_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
        };

        tracing::info!(
            "Classified {}: stage={}, confidence={:.3}, time={:.1}ms",
            path.display(),
            result.predicted_label.name(),
            result.confidence,
            result.processing_time_ms
        );

        Ok(ClassifyOutcome::Predicted(result))
    }

    fn rejection(error: StageError) -> ClassifyOutcome {
        let reason = match error {
            StageError::ImageNotFound(_) => ImageRejection::NotFound,
            _ => ImageRejection::Unsupported,
        };
        ClassifyOutcome::ImageRejected {
            reason,
            message: error.to_string(),
        }
    }
}

/// 最大值的索引；并列时取第一个，NaN 不参与比较
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

fn validate_probabilities(probabilities: &[f32]) -> std::result::Result<(), String> {
    if let Some(v) = probabilities.iter().find(|v| !v.is_finite()) {
        return Err(format!("non-finite probability {}", v));
    }

    if let Some(v) = probabilities.iter().find(|v| !(0.0..=1.0).contains(*v)) {
        return Err(format!("probability {} outside [0, 1]", v));
    }

    let sum: f32 = probabilities.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(format!("probabilities sum to {:.4}, expected 1", sum));
    }

    Ok(())
}
