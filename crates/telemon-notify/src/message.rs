use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telemon_core::{Alert, AlertState, Severity};

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    Info,
    Warning,
    Critical,
}

impl From<Severity> for NotifyLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => NotifyLevel::Info,
            Severity::Warning => NotifyLevel::Warning,
            Severity::Critical => NotifyLevel::Critical,
        }
    }
}

/// 通知消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyMessage {
    pub title: String,
    pub content: String,
    pub level: NotifyLevel,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

impl NotifyMessage {
    pub fn new(title: impl Into<String>, content: impl Into<String>, level: NotifyLevel) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            level,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// 把告警渲染成外发消息
    pub fn from_alert(alert: &Alert) -> Self {
        let emoji = if alert.state == AlertState::Resolved {
            "🟢"
        } else {
            match alert.severity {
                Severity::Critical => "🔴",
                Severity::Warning => "⚠️",
                Severity::Info => "ℹ️",
            }
        };

        let title = format!("{} telemon alert: {}", emoji, alert.kind);
        let mut content = format!(
            "{}\n\nDevice: {}\nEntity: {}\nSeverity: {}\nState: {:?}",
            alert.message, alert.device, alert.entity, alert.severity, alert.state
        );
        if let Some(resolved_at) = alert.resolved_at {
            content.push_str(&format!("\nResolved at: {}", resolved_at.to_rfc3339()));
        }

        let level = if alert.state == AlertState::Resolved {
            NotifyLevel::Info
        } else {
            NotifyLevel::from(alert.severity)
        };

        Self::new(title, content, level).with_metadata(serde_json::json!({
            "alert_id": alert.id,
            "device": alert.device,
            "entity": alert.entity,
            "kind": alert.kind,
            "related": alert.related,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use telemon_core::{AlertKey, AlertKind};

    #[test]
    fn test_from_alert_firing() {
        let key = AlertKey::new("d1", "Gi1/0/1", AlertKind::InterfaceStateMismatch);
        let alert = Alert::new(&key, Severity::Critical, "interface down", HashMap::new());

        let message = NotifyMessage::from_alert(&alert);
        assert!(message.title.contains("🔴"));
        assert!(message.title.contains("interface_state_mismatch"));
        assert!(message.content.contains("Device: d1"));
        assert_eq!(message.level, NotifyLevel::Critical);
    }

    #[test]
    fn test_from_alert_resolved() {
        let key = AlertKey::new("d1", "Gi1/0/1", AlertKind::InterfaceStateMismatch);
        let mut alert = Alert::new(&key, Severity::Critical, "interface down", HashMap::new());
        alert.resolve("recovered");

        let message = NotifyMessage::from_alert(&alert);
        assert!(message.title.contains("🟢"));
        assert!(message.content.contains("Resolved at:"));
        assert_eq!(message.level, NotifyLevel::Info);
    }
}
