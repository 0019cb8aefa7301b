use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 设备未找到
    DeviceNotFound(String),
    /// 设备探测失败
    ProbeFailed(String),
    /// 重载失败
    ReloadFailed(String),
    /// 内部错误
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::DeviceNotFound(name) => write!(f, "Device not found: {}", name),
            ApiError::ProbeFailed(msg) => write!(f, "Device probe failed: {}", msg),
            ApiError::ReloadFailed(msg) => write!(f, "Config reload failed: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::DeviceNotFound(ref name) => (StatusCode::NOT_FOUND, name.clone()),
            ApiError::ProbeFailed(ref msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::ReloadFailed(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InternalError(ref msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
