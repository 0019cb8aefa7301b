use crate::types::{MemberMode, MonitorConfig};

/// 校验整份配置，返回第一条违例的描述
///
/// 规则：
/// - 至少一台设备，设备必须有地址；
/// - credentials_ref 必须指向已声明的凭据；
/// - 聚合成员要求必须带 member_policy，min_active / per_stack_minimum
///   的下限必须 >= 1；
/// - 每个 required 成员必须是同一设备上已声明的接口；
/// - 路由规则只能引用已声明的渠道，渠道必须带 url_env。
pub fn validate(cfg: &MonitorConfig) -> Result<(), String> {
    if cfg.devices.is_empty() {
        return Err("no devices configured".to_string());
    }

    for (name, device) in &cfg.devices {
        if device.address.is_empty() {
            return Err(format!("device {name}: address is required"));
        }

        if let Some(cred_ref) = &device.credentials_ref {
            if !cfg.credentials.credentials.contains_key(cred_ref) {
                return Err(format!(
                    "device {name}: references unknown credential {cred_ref}"
                ));
            }
        }

        for (if_name, intent) in &device.interfaces {
            let required = intent
                .members
                .as_ref()
                .map(|m| m.required.as_slice())
                .unwrap_or(&[]);

            if !required.is_empty() {
                let policy = intent.member_policy.as_ref().ok_or_else(|| {
                    format!("device {name}, interface {if_name}: has members but no member_policy")
                })?;

                match policy.mode {
                    MemberMode::AllActive => {}
                    MemberMode::MinActive => {
                        if policy.minimum.unwrap_or(0) < 1 {
                            return Err(format!(
                                "device {name}, interface {if_name}: member_policy.minimum must be >= 1 for min_active mode"
                            ));
                        }
                    }
                    MemberMode::PerStackMinimum => {
                        if policy.per_stack_minimum.unwrap_or(0) < 1 {
                            return Err(format!(
                                "device {name}, interface {if_name}: member_policy.per_stack_minimum must be >= 1"
                            ));
                        }
                    }
                }

                // 未声明的成员永远观测不到，直接拒绝
                for member in required {
                    if !device.interfaces.contains_key(member) {
                        return Err(format!(
                            "device {name}, interface {if_name}: required member {member} is not a declared interface"
                        ));
                    }
                }
            }
        }
    }

    for (name, channel) in &cfg.alerts.channels {
        if channel.url_env.is_empty() {
            return Err(format!("channel {name}: url_env is required"));
        }
    }

    for (rule_name, rule) in &cfg.alerts.rules {
        for channel in &rule.channels {
            if !cfg.alerts.channels.contains_key(channel) {
                return Err(format!(
                    "alert rule {rule_name}: references unknown channel {channel}"
                ));
            }
        }
    }

    Ok(())
}
