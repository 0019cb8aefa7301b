use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 告警类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    InterfaceStateMismatch,
    InterfaceAdminDown,
    PortChannelDown,
    PortChannelMemberDown,
    FlappingDetected,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::InterfaceStateMismatch => "interface_state_mismatch",
            AlertKind::InterfaceAdminDown => "interface_admin_down",
            AlertKind::PortChannelDown => "port_channel_down",
            AlertKind::PortChannelMemberDown => "port_channel_member_down",
            AlertKind::FlappingDetected => "flapping_detected",
        }
    }

    /// 未在意图中覆盖时使用的默认级别
    pub fn default_severity(&self) -> Severity {
        match self {
            AlertKind::InterfaceStateMismatch => Severity::Critical,
            AlertKind::InterfaceAdminDown => Severity::Warning,
            AlertKind::PortChannelDown => Severity::Critical,
            AlertKind::PortChannelMemberDown => Severity::Critical,
            AlertKind::FlappingDetected => Severity::Warning,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 告警状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Firing,
    Resolved,
}

/// 告警身份：(设备, 实体, 类别) 三元组
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub device: String,
    pub entity: String,
    pub kind: AlertKind,
}

impl AlertKey {
    pub fn new(device: impl Into<String>, entity: impl Into<String>, kind: AlertKind) -> Self {
        Self {
            device: device.into(),
            entity: entity.into(),
            kind,
        }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.device, self.entity, self.kind)
    }
}

/// 告警实例
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub device: String,
    pub entity: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub state: AlertState,
    pub fired_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub message: String,
    #[serde(default)]
    pub related: HashMap<String, String>,
    #[serde(default)]
    pub suppressed: bool,
}

impl Alert {
    pub fn new(
        key: &AlertKey,
        severity: Severity,
        message: impl Into<String>,
        related: HashMap<String, String>,
    ) -> Self {
        let fired_at = Utc::now();
        Self {
            id: format!("{}-{}", key, fired_at.timestamp_millis()),
            device: key.device.clone(),
            entity: key.entity.clone(),
            kind: key.kind,
            severity,
            state: AlertState::Firing,
            fired_at,
            resolved_at: None,
            message: message.into(),
            related,
            suppressed: false,
        }
    }

    pub fn key(&self) -> AlertKey {
        AlertKey::new(self.device.clone(), self.entity.clone(), self.kind)
    }

    pub fn resolve(&mut self, message: impl Into<String>) {
        self.state = AlertState::Resolved;
        self.resolved_at = Some(Utc::now());
        self.message = message.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_key_equality() {
        let a = AlertKey::new("d1", "Gi1/0/1", AlertKind::InterfaceStateMismatch);
        let b = AlertKey::new("d1", "Gi1/0/1", AlertKind::InterfaceStateMismatch);
        assert_eq!(a, b);

        let c = AlertKey::new("d1", "Gi1/0/1", AlertKind::InterfaceAdminDown);
        assert_ne!(a, c);
    }

    #[test]
    fn test_alert_resolve() {
        let key = AlertKey::new("d1", "Gi1/0/1", AlertKind::InterfaceStateMismatch);
        let mut alert = Alert::new(&key, Severity::Critical, "down", HashMap::new());
        assert_eq!(alert.state, AlertState::Firing);
        assert!(alert.resolved_at.is_none());

        alert.resolve("recovered");
        assert_eq!(alert.state, AlertState::Resolved);
        assert!(alert.resolved_at.is_some());
        assert_eq!(alert.message, "recovered");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(
            AlertKind::InterfaceStateMismatch.as_str(),
            "interface_state_mismatch"
        );
        assert_eq!(
            AlertKind::InterfaceStateMismatch.default_severity(),
            Severity::Critical
        );
        assert_eq!(
            AlertKind::InterfaceAdminDown.default_severity(),
            Severity::Warning
        );
    }
}
