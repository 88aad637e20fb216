use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Unknown class label index {index}, catalog declares {declared} labels")]
    UnknownLabel { index: usize, declared: usize },

    #[error("Classifier emitted {actual} probabilities, catalog declares {expected} labels")]
    CatalogMismatch { expected: usize, actual: usize },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl StageError {
    /// 模型与标签目录不一致，属于配置缺陷，必须上报而不是降级
    pub fn is_catalog_divergence(&self) -> bool {
        matches!(
            self,
            StageError::UnknownLabel { .. } | StageError::CatalogMismatch { .. }
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            StageError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            StageError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            StageError::UnsupportedImage(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            StageError::ImageNotFound(_) => StatusCode::NOT_FOUND,
            StageError::Base64(_) => StatusCode::BAD_REQUEST,
            StageError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StageError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            StageError::ImageNotFound(_) => "IMAGE_NOT_FOUND",
            StageError::UnsupportedImage(_) => "UNSUPPORTED_IMAGE",
            StageError::UnknownLabel { .. } | StageError::CatalogMismatch { .. } => {
                "CATALOG_MISMATCH"
            }
            StageError::Inference(_) => "INFERENCE_ERROR",
            StageError::InvalidInput(_) => "INVALID_INPUT",
            StageError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            StageError::Config(_) => "CONFIG_ERROR",
            StageError::Io(_) => "IO_ERROR",
            StageError::Base64(_) => "BASE64_DECODE_ERROR",
            StageError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for StageError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        if self.is_catalog_divergence() {
            tracing::error!("Classifier and label catalog diverged: {}", self);
        } else {
            tracing::error!("Request failed: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
