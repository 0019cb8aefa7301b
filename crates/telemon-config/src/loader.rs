use crate::types::{AlertsConfig, CredentialsConfig, DeviceConfig, GlobalConfig, MonitorConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("config validation failed: {0}")]
    Invalid(String),
}

/// desired-state.toml 的文件结构
#[derive(Debug, Deserialize)]
struct DesiredStateFile {
    #[serde(default)]
    global: GlobalConfig,
    #[serde(default)]
    devices: HashMap<String, DeviceConfig>,
}

/// 从目录加载监控配置
///
/// 目录内容：desired-state.toml（必须）、alerts.toml（必须）、
/// credentials.toml（可选）。
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// 加载并校验整份配置
    pub fn load(&self) -> Result<MonitorConfig, ConfigError> {
        let desired: DesiredStateFile = self.load_file("desired-state.toml")?;
        let alerts: AlertsConfig = self.load_file("alerts.toml")?;

        let credentials_path = self.config_dir.join("credentials.toml");
        let credentials: CredentialsConfig = if credentials_path.exists() {
            self.load_file("credentials.toml")?
        } else {
            debug!("credentials.toml not present, using empty credential table");
            CredentialsConfig::default()
        };

        let cfg = MonitorConfig {
            global: desired.global,
            devices: desired.devices,
            alerts,
            credentials,
        };

        crate::validate::validate(&cfg).map_err(ConfigError::Invalid)?;
        Ok(cfg)
    }

    // 接口名等表键区分大小写，因此走 serde + toml 直接反序列化
    fn load_file<T>(&self, name: &str) -> Result<T, ConfigError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let path = self.config_dir.join(name);
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            file: name.to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            file: name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const DESIRED_STATE: &str = r#"
[global]
default_credentials = "lab"
gnmi_port = 9339

[devices.d1]
address = "10.0.0.1"

[devices.d1.interfaces."Gi1/0/1"]
desired_state = "up"
admin_state = "enabled"

[devices.d1.interfaces."Gi1/0/49"]
desired_state = "up"

[devices.d1.interfaces."Gi1/0/50"]
desired_state = "up"

[devices.d1.interfaces."Po1"]
desired_state = "up"

[devices.d1.interfaces."Po1".members]
required = ["Gi1/0/49", "Gi1/0/50"]

[devices.d1.interfaces."Po1".member_policy]
mode = "all_active"
"#;

    const ALERTS: &str = r#"
[channels.slack]
type = "slack"
url_env = "SLACK_WEBHOOK_URL"

[channels.pager]
type = "webhook"
url_env = "PAGER_WEBHOOK_URL"
escalation_delay_secs = 300

[rules.critical]
channels = ["slack", "pager"]

[rules.default]
channels = ["slack"]

[behavior]
dedup_window_secs = 300

[behavior.flap_detection]
enabled = true
threshold = 3
window_secs = 300
"#;

    const CREDENTIALS: &str = r#"
[credentials.lab]
username = "gnmi-monitor"
password_env = "LAB_PASSWORD"
"#;

    fn write_config(dir: &Path) {
        fs::write(dir.join("desired-state.toml"), DESIRED_STATE).unwrap();
        fs::write(dir.join("alerts.toml"), ALERTS).unwrap();
        fs::write(dir.join("credentials.toml"), CREDENTIALS).unwrap();
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        write_config(dir.path());

        let cfg = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(cfg.global.gnmi_port, 9339);
        assert_eq!(cfg.devices.len(), 1);

        let d1 = &cfg.devices["d1"];
        assert_eq!(d1.address, "10.0.0.1");
        assert_eq!(d1.interfaces.len(), 4);
        assert!(d1.interfaces["Po1"].has_members());

        assert_eq!(cfg.alerts.channels.len(), 2);
        assert_eq!(cfg.alerts.channels["pager"].escalation_delay_secs, 300);
        assert_eq!(cfg.alerts.rules["critical"].channels.len(), 2);
        assert_eq!(cfg.alerts.behavior.dedup_window_secs, 300);
        assert!(cfg.alerts.behavior.flap_detection.enabled);

        let cred = cfg.resolve_credentials("d1");
        assert_eq!(cred.username, "gnmi-monitor");
        assert_eq!(cred.password_env.as_deref(), Some("LAB_PASSWORD"));
    }

    #[test]
    fn test_missing_credentials_file_is_ok() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("desired-state.toml"), DESIRED_STATE).unwrap();
        fs::write(dir.path().join("alerts.toml"), ALERTS).unwrap();

        let cfg = ConfigLoader::new(dir.path()).load().unwrap();
        assert!(cfg.credentials.credentials.is_empty());
    }

    #[test]
    fn test_missing_desired_state_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("alerts.toml"), ALERTS).unwrap();

        let err = ConfigLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_rejects_undeclared_member() {
        let dir = tempdir().unwrap();
        let broken = DESIRED_STATE.replace("\"Gi1/0/49\", \"Gi1/0/50\"", "\"Gi1/0/49\", \"Gi1/0/7\"");
        fs::write(dir.path().join("desired-state.toml"), broken).unwrap();
        fs::write(dir.path().join("alerts.toml"), ALERTS).unwrap();

        let err = ConfigLoader::new(dir.path()).load().unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("Gi1/0/7")),
            other => panic!("expected validation error, got {other}"),
        }
    }
}
