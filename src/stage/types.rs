use crate::catalog::{CareInstructionRecord, ClassLabel};
use serde::Serialize;

/// 单个类别的置信度
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassConfidence {
    pub label: ClassLabel,
    pub confidence: f32,
}

/// 一次分类的结构化结果
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// 预测阶段（概率最大者，并列时取最小索引）
    pub predicted_label: ClassLabel,
    /// 预测阶段的概率 (0.0 - 1.0)
    pub confidence: f32,
    /// 全部类别的概率，按目录顺序
    pub per_class_confidences: Vec<ClassConfidence>,
    /// 对应的养护建议
    pub care: CareInstructionRecord,
    /// 处理耗时（毫秒）
    pub processing_time_ms: f64,
}

impl PredictionResult {
    pub fn confidence_sum(&self) -> f32 {
        self.per_class_confidences.iter().map(|c| c.confidence).sum()
    }
}

/// 图像被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRejection {
    NotFound,
    Unsupported,
}

/// 流水线的显式返回值；除目录不一致外，所有单次请求的失败都落在这里
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassifyOutcome {
    Predicted(PredictionResult),
    ModelUnavailable { reason: String },
    NoInput,
    ImageRejected { reason: ImageRejection, message: String },
    InferenceFailed { message: String },
}

impl ClassifyOutcome {
    pub fn prediction(&self) -> Option<&PredictionResult> {
        match self {
            ClassifyOutcome::Predicted(result) => Some(result),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ClassifyOutcome::Predicted(_) => "predicted",
            ClassifyOutcome::ModelUnavailable { .. } => "model_unavailable",
            ClassifyOutcome::NoInput => "no_input",
            ClassifyOutcome::ImageRejected { .. } => "image_rejected",
            ClassifyOutcome::InferenceFailed { .. } => "inference_failed",
        }
    }
}
