use crate::error::{ApiError, Result};
use crate::state::ApiState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use telemon_collector::{CapabilitiesSummary, DeviceHealth};
use tracing::{debug, info};

#[derive(Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub health: Option<DeviceHealth>,
}

/// 设备列表及各自的健康记录
pub async fn list_devices(State(state): State<ApiState>) -> Json<Vec<DeviceSummary>> {
    let mut names = state.status.device_names().await;
    names.sort();

    let mut devices = Vec::with_capacity(names.len());
    for name in names {
        let health = state.status.device_health(&name).await;
        devices.push(DeviceSummary { name, health });
    }
    Json(devices)
}

/// 单台设备的健康记录
pub async fn device_health(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<DeviceHealth>> {
    debug!(device = %name, "getting device health");
    state
        .status
        .device_health(&name)
        .await
        .map(Json)
        .ok_or(ApiError::DeviceNotFound(name))
}

/// 对设备做一次 Capabilities 探测
pub async fn test_device(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<CapabilitiesSummary>> {
    info!(device = %name, "testing device connectivity");
    state
        .status
        .test_device(&name)
        .await
        .map(Json)
        .map_err(ApiError::ProbeFailed)
}
