use chrono::{DateTime, Utc};

/// 观测键：(设备, 接口)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObservationKey {
    pub device: String,
    pub interface: String,
}

impl ObservationKey {
    pub fn new(device: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            interface: interface.into(),
        }
    }
}

/// 某接口最近一次观测到的状态（小写规范形式）
///
/// 首条匹配的遥测到达时惰性创建；只由评估器修改。
/// 重连不会清空观测，设备被 reload 移除后条目原地留存。
#[derive(Debug, Clone, Default)]
pub struct InterfaceObservation {
    pub oper_status: String,
    pub admin_status: String,
    pub updated_at: Option<DateTime<Utc>>,
}
