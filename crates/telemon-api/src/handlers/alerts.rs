use crate::state::ApiState;
use axum::{extract::State, Json};
use telemon_core::Alert;
use tracing::debug;

/// 列出当前活动告警
pub async fn list_alerts(State(state): State<ApiState>) -> Json<Vec<Alert>> {
    debug!("listing active alerts");
    let mut alerts = state.status.active_alerts().await;
    alerts.sort_by(|a, b| b.fired_at.cmp(&a.fired_at));
    Json(alerts)
}
