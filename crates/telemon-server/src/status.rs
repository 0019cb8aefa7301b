use crate::supervisor::Supervisor;
use async_trait::async_trait;
use std::sync::Arc;
use telemon_api::StatusSource;
use telemon_collector::{CapabilitiesSummary, DeviceHealth};
use telemon_core::Alert;

/// 核心向状态 API 暴露的实现
pub struct ServerStatus {
    supervisor: Arc<Supervisor>,
}

impl ServerStatus {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }
}

#[async_trait]
impl StatusSource for ServerStatus {
    async fn active_alerts(&self) -> Vec<Alert> {
        self.supervisor.engine().active_alerts().await
    }

    async fn device_names(&self) -> Vec<String> {
        self.supervisor.device_names().await
    }

    async fn device_health(&self, name: &str) -> Option<DeviceHealth> {
        let collector = self.supervisor.collector(name).await?;
        Some(collector.health().await)
    }

    async fn current_config(&self) -> serde_json::Value {
        serde_json::to_value(self.supervisor.config().as_ref())
            .unwrap_or(serde_json::Value::Null)
    }

    async fn test_device(&self, name: &str) -> Result<CapabilitiesSummary, String> {
        let collector = self
            .supervisor
            .collector(name)
            .await
            .ok_or_else(|| format!("unknown device {name}"))?;
        collector
            .test_connection()
            .await
            .map_err(|e| e.to_string())
    }

    async fn reload(&self) -> Result<(), String> {
        self.supervisor.reload().await.map_err(|e| e.to_string())
    }
}
