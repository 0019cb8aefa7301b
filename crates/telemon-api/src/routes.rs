use crate::handlers;
use crate::state::ApiState;
use axum::routing::{get, post};
use axum::Router;

/// 只读状态 API 的路由表
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::system::health))
        .route("/api/v1/alerts", get(handlers::alerts::list_alerts))
        .route("/api/v1/devices", get(handlers::devices::list_devices))
        .route(
            "/api/v1/devices/:name/health",
            get(handlers::devices::device_health),
        )
        .route(
            "/api/v1/devices/:name/test",
            get(handlers::devices::test_device),
        )
        .route("/api/v1/config", get(handlers::system::current_config))
        .route("/api/v1/logs", get(handlers::system::recent_logs))
        .route("/api/v1/reload", post(handlers::system::reload))
        .with_state(state)
}
