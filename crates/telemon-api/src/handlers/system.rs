use crate::error::{ApiError, Result};
use crate::logbuffer::LogEntry;
use crate::state::ApiState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

/// 最近的日志（环形缓冲）
pub async fn recent_logs(
    State(state): State<ApiState>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<LogEntry>> {
    let limit = query.limit.unwrap_or(100);
    Json(state.logs.recent(limit))
}

/// 当前生效的配置
pub async fn current_config(State(state): State<ApiState>) -> Json<Value> {
    Json(state.status.current_config().await)
}

/// 触发配置重载
pub async fn reload(State(state): State<ApiState>) -> Result<Json<Value>> {
    info!("config reload requested via API");
    state
        .status
        .reload()
        .await
        .map(|()| Json(json!({ "status": "reloaded" })))
        .map_err(ApiError::ReloadFailed)
}
