use crate::alert::{AlertKey, AlertKind, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 实体键：(设备, 实体)，用于翻动检测
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub device: String,
    pub entity: String,
}

impl EntityKey {
    pub fn new(device: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            entity: entity.into(),
        }
    }
}

/// 评估器产出的状态变化事件，也是告警引擎的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub device: String,
    pub entity: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub firing: bool,
    pub message: String,
    #[serde(default)]
    pub related: HashMap<String, String>,
}

impl AlertEvent {
    pub fn key(&self) -> AlertKey {
        AlertKey::new(self.device.clone(), self.entity.clone(), self.kind)
    }

    pub fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.device.clone(), self.entity.clone())
    }
}
