pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod report;
pub mod ui;

use crate::{stage::StagePipeline, utils::error::StageError, Config, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 路由共享状态；流水线在绑定端口前构建完成
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<StagePipeline>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Arc<StagePipeline>) -> Self {
        Self { config, pipeline }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    // 启动时加载一次模型，之后所有请求共享
    let pipeline = Arc::new(StagePipeline::from_config(&config));
    if !pipeline.models().is_loaded() {
        tracing::warn!("Serving in degraded mode: every classify request will report the model as unavailable");
    }

    let app = create_app(AppState::new(config.clone(), pipeline));

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        StageError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /classify        - JSON base64 upload");
    tracing::info!("  POST /classify/upload - Multipart file upload");
    tracing::info!("  GET  /                - Web UI");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  GET  /api/info        - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        StageError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| StageError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = &state.config.server_config;
    let max_request_size = server_config.max_request_size;
    let request_timeout = Duration::from_secs(server_config.request_timeout);

    Router::new()
        // 分类API路由
        .route("/classify", post(handlers::classify_json_handler))
        .route("/classify/upload", post(handlers::classify_upload_handler))
        // Web UI路由
        .route("/", get(ui::index_handler))
        // 系统路由
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 健康检查端点；模型不可用时返回503，但服务本身仍在运行
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let model_loaded = state.pipeline.models().health_check().is_ok();
    let status = if model_loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if model_loaded { "healthy" } else { "degraded" },
            "model_loaded": model_loaded,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.pipeline.models().get_stats(&state.config);
    let labels: Vec<_> = state
        .pipeline
        .catalog()
        .labels()
        .map(|label| {
            json!({
                "index": label.index(),
                "name": label.name(),
                "emoji": label.emoji(),
            })
        })
        .collect();

    Json(json!({
        "service": "Tomato Growth Stage Classifier",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": stats,
        "labels": labels,
    }))
}
