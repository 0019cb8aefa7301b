use chrono::{DateTime, Utc};
use serde::Serialize;

/// 单台设备的连接健康记录
///
/// 写入方是采集器的连接路径与接收循环，读取方是状态 API。
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceHealth {
    pub connected: bool,
    pub connected_since: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: String,
    pub reconnect_count: u32,
    pub update_count: u64,
    pub dropped_updates: u64,
    pub sync_received: bool,
    pub last_path: String,
    pub last_value: String,
}
