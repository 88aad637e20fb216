use crate::utils::error::StageError;
use crate::Result;
use std::path::PathBuf;

/// 默认模型文件名
pub const DEFAULT_MODEL_FILE: &str = "tomato_stage_vgg16.onnx";

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型文件目录
    pub models_dir: PathBuf,

    /// 模型文件名（相对于模型目录）
    pub model_file: String,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 图像预处理配置
    pub preprocess_config: PreprocessConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct PreprocessConfig {
    /// 模型输入宽度
    pub width: u32,

    /// 模型输入高度
    pub height: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
        }
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        models_dir: String,
        model_file: Option<String>,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);
        if workers == 0 {
            return Err(StageError::Config("workers must be at least 1".to_string()));
        }

        let model_file = model_file.unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string());
        if model_file.trim().is_empty() {
            return Err(StageError::Config("model file name is empty".to_string()));
        }

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 50 * 1024 * 1024, // 50MB
        };

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            model_file,
            workers,
            dev_mode,
            onnx_config,
            server_config,
            preprocess_config: PreprocessConfig::default(),
        })
    }

    /// 获取分类模型路径
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_path_joins_models_dir() {
        let config = Config::new("127.0.0.1:0".into(), "models".into(), None, Some(2), false)
            .expect("config");
        assert_eq!(config.model_path(), PathBuf::from("models").join(DEFAULT_MODEL_FILE));
        assert_eq!(config.workers, 2);
        assert_eq!(config.server_config.request_timeout, 60);
    }

    #[test]
    fn dev_mode_extends_timeout() {
        let config = Config::new(
            "127.0.0.1:0".into(),
            "/opt/models".into(),
            Some("custom.onnx".into()),
            None,
            true,
        )
        .expect("config");
        assert_eq!(config.server_config.request_timeout, 300);
        assert_eq!(config.model_path(), PathBuf::from("/opt/models/custom.onnx"));
    }

    #[test]
    fn zero_workers_rejected() {
        let err = Config::new("127.0.0.1:0".into(), "models".into(), None, Some(0), false)
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
