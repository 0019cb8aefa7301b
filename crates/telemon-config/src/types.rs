use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use telemon_core::{AlertKind, Severity};

/// 完整的监控配置：期望状态 + 告警路由 + 凭据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    pub devices: HashMap<String, DeviceConfig>,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// 全局设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// 默认凭据条目名
    #[serde(default)]
    pub default_credentials: Option<String>,
    /// gNMI 端口
    #[serde(default = "default_gnmi_port")]
    pub gnmi_port: u16,
    /// 采样间隔（秒）
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,
}

fn default_gnmi_port() -> u16 {
    9339
}

fn default_sample_interval() -> u64 {
    10
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_credentials: None,
            gnmi_port: default_gnmi_port(),
            sample_interval_secs: default_sample_interval(),
        }
    }
}

/// 被监控的设备
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub credentials_ref: Option<String>,
    #[serde(default)]
    pub tls: Option<DeviceTlsConfig>,
    #[serde(default)]
    pub interfaces: HashMap<String, InterfaceIntent>,
}

/// 设备侧 TLS 设置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceTlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub ca_file: Option<String>,
    #[serde(default)]
    pub cert_file: Option<String>,
    #[serde(default)]
    pub key_file: Option<String>,
}

/// 期望的运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    Up,
    Down,
}

impl DesiredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesiredState::Up => "up",
            DesiredState::Down => "down",
        }
    }
}

/// 期望的管理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    Enabled,
    Disabled,
}

impl AdminState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminState::Enabled => "enabled",
            AdminState::Disabled => "disabled",
        }
    }
}

/// 单个接口的期望状态声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceIntent {
    #[serde(default)]
    pub description: Option<String>,
    pub desired_state: DesiredState,
    #[serde(default)]
    pub admin_state: Option<AdminState>,
    #[serde(default)]
    pub members: Option<MemberSpec>,
    #[serde(default)]
    pub member_policy: Option<MemberPolicy>,
    #[serde(default)]
    pub alerts: SeverityOverrides,
}

impl InterfaceIntent {
    /// 取某告警类别的级别：意图覆盖优先，否则取类别默认
    pub fn severity_for(&self, kind: AlertKind) -> Severity {
        let override_severity = match kind {
            AlertKind::InterfaceStateMismatch => self.alerts.state_mismatch,
            AlertKind::InterfaceAdminDown => self.alerts.admin_down,
            AlertKind::PortChannelDown => self.alerts.channel_down,
            AlertKind::PortChannelMemberDown => self.alerts.member_down,
            AlertKind::FlappingDetected => None,
        };
        override_severity.unwrap_or_else(|| kind.default_severity())
    }

    /// 是否声明了聚合成员要求
    pub fn has_members(&self) -> bool {
        self.members
            .as_ref()
            .map(|m| !m.required.is_empty())
            .unwrap_or(false)
    }
}

/// 聚合口成员要求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSpec {
    #[serde(default)]
    pub required: Vec<String>,
}

/// 聚合口成员策略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPolicy {
    pub mode: MemberMode,
    #[serde(default)]
    pub minimum: Option<u32>,
    #[serde(default)]
    pub per_stack_minimum: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberMode {
    AllActive,
    MinActive,
    PerStackMinimum,
}

/// 按告警类别覆盖级别
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeverityOverrides {
    #[serde(default)]
    pub state_mismatch: Option<Severity>,
    #[serde(default)]
    pub admin_down: Option<Severity>,
    #[serde(default)]
    pub member_down: Option<Severity>,
    #[serde(default)]
    pub channel_down: Option<Severity>,
}

/// 告警路由与行为
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
    #[serde(default)]
    pub rules: HashMap<String, RouteRule>,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

/// 通知渠道
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub url_env: String,
    #[serde(default)]
    pub severity_filter: Option<Vec<Severity>>,
    /// 升级延迟（秒），0 表示不升级
    #[serde(default)]
    pub escalation_delay_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Webhook,
    Slack,
    Apprise,
}

/// 级别 -> 渠道列表的路由规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRule {
    pub channels: Vec<String>,
}

/// 告警行为设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default = "default_dedup_window")]
    pub dedup_window_secs: u64,
    #[serde(default)]
    pub flap_detection: FlapConfig,
}

fn default_dedup_window() -> u64 {
    300
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: default_dedup_window(),
            flap_detection: FlapConfig::default(),
        }
    }
}

/// 翻动检测设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlapConfig {
    #[serde(default = "default_flap_enabled")]
    pub enabled: bool,
    #[serde(default = "default_flap_threshold")]
    pub threshold: usize,
    #[serde(default = "default_flap_window")]
    pub window_secs: u64,
}

fn default_flap_enabled() -> bool {
    true
}

fn default_flap_threshold() -> usize {
    3
}

fn default_flap_window() -> u64 {
    300
}

impl Default for FlapConfig {
    fn default() -> Self {
        Self {
            enabled: default_flap_enabled(),
            threshold: default_flap_threshold(),
            window_secs: default_flap_window(),
        }
    }
}

/// 凭据表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub credentials: HashMap<String, CredentialEntry>,
}

/// 单条凭据：用户名 + 存放密码的环境变量名
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialEntry {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password_env: Option<String>,
}

impl MonitorConfig {
    /// 解析设备凭据：设备引用优先，其次全局默认
    pub fn resolve_credentials(&self, device_name: &str) -> CredentialEntry {
        if let Some(device) = self.devices.get(device_name) {
            if let Some(entry) = device
                .credentials_ref
                .as_ref()
                .and_then(|name| self.credentials.credentials.get(name))
            {
                return entry.clone();
            }
        }
        self.global
            .default_credentials
            .as_ref()
            .and_then(|name| self.credentials.credentials.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// 找出包含某成员接口的所有聚合口
    pub fn channels_for_member<'a>(
        device: &'a DeviceConfig,
        member: &str,
    ) -> Vec<(&'a String, &'a InterfaceIntent)> {
        device
            .interfaces
            .iter()
            .filter(|(_, intent)| {
                intent
                    .members
                    .as_ref()
                    .map(|m| m.required.iter().any(|r| r == member))
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(desired: DesiredState) -> InterfaceIntent {
        InterfaceIntent {
            description: None,
            desired_state: desired,
            admin_state: None,
            members: None,
            member_policy: None,
            alerts: SeverityOverrides::default(),
        }
    }

    #[test]
    fn test_severity_override() {
        let mut it = intent(DesiredState::Up);
        assert_eq!(
            it.severity_for(AlertKind::InterfaceStateMismatch),
            Severity::Critical
        );

        it.alerts.state_mismatch = Some(Severity::Warning);
        assert_eq!(
            it.severity_for(AlertKind::InterfaceStateMismatch),
            Severity::Warning
        );
        assert_eq!(
            it.severity_for(AlertKind::InterfaceAdminDown),
            Severity::Warning
        );
    }

    #[test]
    fn test_resolve_credentials_fallback() {
        let mut credentials = HashMap::new();
        credentials.insert(
            "lab".to_string(),
            CredentialEntry {
                username: "monitor".to_string(),
                password_env: Some("LAB_PASSWORD".to_string()),
            },
        );

        let mut devices = HashMap::new();
        devices.insert(
            "d1".to_string(),
            DeviceConfig {
                address: "10.0.0.1".to_string(),
                description: None,
                credentials_ref: None,
                tls: None,
                interfaces: HashMap::new(),
            },
        );

        let cfg = MonitorConfig {
            global: GlobalConfig {
                default_credentials: Some("lab".to_string()),
                ..GlobalConfig::default()
            },
            devices,
            alerts: AlertsConfig::default(),
            credentials: CredentialsConfig { credentials },
        };

        let entry = cfg.resolve_credentials("d1");
        assert_eq!(entry.username, "monitor");

        // 未知设备也回落到默认凭据
        let entry = cfg.resolve_credentials("nope");
        assert_eq!(entry.username, "monitor");
    }

    #[test]
    fn test_channels_for_member() {
        let mut interfaces = HashMap::new();
        interfaces.insert("Gi1/0/49".to_string(), intent(DesiredState::Up));
        let mut po1 = intent(DesiredState::Up);
        po1.members = Some(MemberSpec {
            required: vec!["Gi1/0/49".to_string(), "Gi1/0/50".to_string()],
        });
        interfaces.insert("Po1".to_string(), po1);

        let device = DeviceConfig {
            address: "10.0.0.1".to_string(),
            description: None,
            credentials_ref: None,
            tls: None,
            interfaces,
        };

        let channels = MonitorConfig::channels_for_member(&device, "Gi1/0/49");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].0, "Po1");

        assert!(MonitorConfig::channels_for_member(&device, "Gi1/0/1").is_empty());
    }
}
