use crate::logbuffer::LogBuffer;
use async_trait::async_trait;
use std::sync::Arc;
use telemon_collector::{CapabilitiesSummary, DeviceHealth};
use telemon_core::Alert;

/// 核心侧向状态 API 暴露的只读/回调接口
///
/// API 层只认识这个 trait，由服务端实现并注入。
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// 当前活动告警
    async fn active_alerts(&self) -> Vec<Alert>;

    /// 受监控的设备名列表
    async fn device_names(&self) -> Vec<String>;

    /// 某台设备的采集健康记录
    async fn device_health(&self, name: &str) -> Option<DeviceHealth>;

    /// 当前生效的设备配置（JSON 形式）
    async fn current_config(&self) -> serde_json::Value;

    /// 对设备做一次 Capabilities 探测
    async fn test_device(&self, name: &str) -> Result<CapabilitiesSummary, String>;

    /// 触发配置重载
    async fn reload(&self) -> Result<(), String>;
}

/// API 应用状态
#[derive(Clone)]
pub struct ApiState {
    pub status: Arc<dyn StatusSource>,
    pub logs: Arc<LogBuffer>,
}

impl ApiState {
    pub fn new(status: Arc<dyn StatusSource>, logs: Arc<LogBuffer>) -> Self {
        Self { status, logs }
    }
}
