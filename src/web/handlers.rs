use crate::{
    image::ImageLoader,
    stage::ClassifyOutcome,
    utils::error::StageError,
    web::{
        extractors::{RequestId, Validate, ValidatedJson},
        report::{ReportFormatter, StageReport},
        AppState,
    },
    Result,
};
use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Instant;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct ClassifyJsonRequest {
    /// Base64编码的图像数据，缺省或为空视为未上传
    #[serde(default)]
    pub image: Option<String>,
}

impl Validate for ClassifyJsonRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        let max_encoded = base64::encoded_len(crate::image::loader::MAX_IMAGE_BYTES, true)
            .unwrap_or(usize::MAX);
        match &self.image {
            Some(image) if image.len() > max_encoded + 64 => Err(format!(
                "Image payload too large: {} characters",
                image.len()
            )),
            _ => Ok(()),
        }
    }
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: String,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

/// 分类结果与展示内容
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub outcome: ClassifyOutcome,
    pub report: StageReport,
}

/// JSON base64上传处理器
pub async fn classify_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<ClassifyJsonRequest>,
) -> Result<Json<ApiResponse<ClassifyResponse>>> {
    tracing::info!("Processing JSON classify request: request_id={}", request_id);

    let image_bytes = match request.image.as_deref().map(str::trim) {
        Some(image) if !image.is_empty() => Some(ImageLoader::decode_base64(image)?),
        _ => None,
    };

    let response = run_classification(&state, image_bytes, &request_id).await?;
    Ok(Json(ApiResponse::success(response, request_id)))
}

/// Multipart文件上传处理器
pub async fn classify_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ClassifyResponse>>> {
    tracing::info!("Processing multipart classify request: request_id={}", request_id);

    let mut image_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        StageError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                let data = field.bytes().await.map_err(|e| {
                    StageError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;
                ImageLoader::ensure_size(data.len())?;

                tracing::debug!("Received file: {} bytes", data.len());
                if !data.is_empty() {
                    image_data = Some(data.to_vec());
                }
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let response = run_classification(&state, image_data, &request_id).await?;
    Ok(Json(ApiResponse::success(response, request_id)))
}

/// 将上传内容落盘后交给流水线；推理在阻塞线程池中执行
async fn run_classification(
    state: &AppState,
    image_data: Option<Vec<u8>>,
    request_id: &str,
) -> Result<ClassifyResponse> {
    let start_time = Instant::now();
    let pipeline = state.pipeline.clone();

    let outcome = tokio::task::spawn_blocking(move || -> Result<ClassifyOutcome> {
        match image_data {
            Some(bytes) => {
                let mut file = tempfile::Builder::new()
                    .prefix("tomato-upload-")
                    .suffix(&ImageLoader::file_suffix(&bytes))
                    .tempfile()?;
                file.write_all(&bytes)?;
                file.flush()?;
                pipeline.classify(Some(file.path()))
            }
            None => pipeline.classify(None),
        }
    })
    .await
    .map_err(|e| StageError::Internal(format!("Classification task failed: {}", e)))??;

    tracing::info!(
        "Classify completed: request_id={}, status={}, time={:.3}s",
        request_id,
        outcome.status(),
        start_time.elapsed().as_secs_f32()
    );

    let report = ReportFormatter::format(&outcome);
    Ok(ClassifyResponse { outcome, report })
}
