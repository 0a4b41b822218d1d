//! Survey Insights HTTP 接口
//!
//! 启动: cargo run --bin survey-insights-web --features web
//! 默认监听 http://0.0.0.0:8000（[web].port 可改）

#![cfg(feature = "web")]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use survey_insights::config::{load_config, AppConfig};
use survey_insights::data::SchemaDescriptor;
use survey_insights::{observability, Orchestrator, OrchestratorBuilder, OrchestratorError};
use survey_insights::{QuestionRequest, QuestionResponse};

struct AppState {
    orchestrator: Orchestrator,
}

type ApiError = (StatusCode, String);

/// 调用级错误 → HTTP 状态；只返回错误的展示文本
fn error_status(e: &OrchestratorError) -> StatusCode {
    match e {
        OrchestratorError::Transport(_) => StatusCode::BAD_GATEWAY,
        OrchestratorError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::CatalogEmpty(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(e: impl Into<OrchestratorError>) -> ApiError {
    let e = e.into();
    tracing::error!("Request failed: {}", e);
    (error_status(&e), e.to_string())
}

/// POST /process_question：回答一个问题
async fn process_question(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuestionRequest>,
) -> Result<Json<QuestionResponse>, ApiError> {
    if req.question.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question is required".to_string()));
    }
    let response = state
        .orchestrator
        .answer(
            &req.question,
            req.base_context(),
            Some(&req.user_id),
            Some(&req.thread_id),
        )
        .await
        .map_err(api_error)?;
    Ok(Json(QuestionResponse::from(response)))
}

#[derive(Debug, Deserialize)]
struct ThreadsQuery {
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ThreadsResponse {
    threads: Vec<String>,
}

/// GET /threads?user_id=：列出线程
async fn list_threads(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ThreadsQuery>,
) -> Result<Json<ThreadsResponse>, ApiError> {
    let threads = state
        .orchestrator
        .store()
        .list_threads(q.user_id.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(ThreadsResponse { threads }))
}

/// DELETE /threads/:thread_id：删除线程上下文与交互日志
async fn delete_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .orchestrator
        .store()
        .delete_thread(&thread_id)
        .await
        .map_err(api_error)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("thread {} not found", thread_id)))
    }
}

/// GET /schema：可查询关系及其列
async fn schema(State(state): State<Arc<AppState>>) -> Json<SchemaDescriptor> {
    Json(state.orchestrator.catalog().describe().clone())
}

async fn health() -> Json<HashMap<&'static str, &'static str>> {
    Json(HashMap::from([("status", "ok")]))
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/process_question", post(process_question))
        .route("/threads", get(list_threads))
        .route("/threads/:thread_id", delete(delete_thread))
        .route("/schema", get(schema))
        .route("/health", get(health))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let port = cfg.web.port;

    let orchestrator = OrchestratorBuilder::from_config(cfg)
        .build()
        .await
        .context("Failed to initialise orchestrator")?;
    let state = Arc::new(AppState { orchestrator });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Survey Insights API listening on http://{}", addr);
    axum::serve(listener, app(state))
        .await
        .context("Server error")?;
    Ok(())
}
