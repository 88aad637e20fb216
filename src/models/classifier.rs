use crate::image::PreprocessedTensor;
use crate::utils::error::StageError;
use crate::{Config, Result};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::fmt::Display;
use std::path::Path;

/// 生长阶段分类器：输入预处理张量，按类别索引顺序输出每类概率
pub trait StageClassifier: Send + Sync {
    fn infer(&self, tensor: PreprocessedTensor) -> Result<Vec<f32>>;

    /// 模型描述，用于日志与服务信息
    fn describe(&self) -> String {
        "stage-classifier".to_string()
    }
}

fn load_error<E: Display>(e: E) -> StageError {
    StageError::ModelUnavailable(e.to_string())
}

fn inference_error<E: Display>(e: E) -> StageError {
    StageError::Inference(e.to_string())
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        i32::MIN..=0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

/// 基于ONNX Runtime的分类器
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,  // 动态发现的输入名称
    output_name: String, // 动态发现的输出名称
    model_path: String,
}

impl OnnxClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        Self::from_file(&config.model_path(), config)
    }

    pub fn from_file(model_path: &Path, config: &Config) -> Result<Self> {
        if !model_path.exists() {
            return Err(StageError::ModelUnavailable(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let session = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(optimization_level(config.onnx_config.optimization_level))
            .map_err(load_error)?
            .with_intra_threads(config.onnx_config.intra_threads)
            .map_err(load_error)?
            .commit_from_file(model_path)
            .map_err(load_error)?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(StageError::ModelUnavailable(
                    "Classification model has no inputs".to_string(),
                ))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(StageError::ModelUnavailable(
                    "Classification model has no outputs".to_string(),
                ))
            }
        };

        tracing::info!(
            "Classification model input: '{}', output: '{}'",
            input_name,
            output_name
        );
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            model_path: model_path.display().to_string(),
        })
    }
}

impl StageClassifier for OnnxClassifier {
    fn infer(&self, tensor: PreprocessedTensor) -> Result<Vec<f32>> {
        let input_tensor = Tensor::from_array(tensor.into_inner()).map_err(inference_error)?;

        let predictions = {
            let mut session = self.session.lock();
            let outputs = session
                .run(inputs![self.input_name.as_str() => input_tensor])
                .map_err(inference_error)?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output
                    .try_extract_array::<f32>()
                    .map_err(inference_error)?
                    .into_owned(),
                None => {
                    return Err(StageError::Inference(format!(
                        "Classification output '{}' not found",
                        self.output_name
                    )));
                }
            }
        };

        flatten_single_batch(predictions.shape(), predictions.iter().copied())
    }

    fn describe(&self) -> String {
        format!("onnx:{}", self.model_path)
    }
}

/// 接受 [N] 或 [1, N] 形状的输出
fn flatten_single_batch(shape: &[usize], values: impl Iterator<Item = f32>) -> Result<Vec<f32>> {
    match shape {
        [_] | [1, _] => Ok(values.collect()),
        other => Err(StageError::Inference(format!(
            "Expected classification output of shape [1, N], got {:?}",
            other
        ))),
    }
}
