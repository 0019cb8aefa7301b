use crate::observation::{InterfaceObservation, ObservationKey};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use telemon_config::{DeviceConfig, InterfaceIntent, MemberMode, MonitorConfig};
use telemon_core::{AlertEvent, AlertKind};
use telemon_gnmi::path::string_value;
use telemon_gnmi::proto::{Notification, Path, PathElem};
use tokio::sync::watch;
use tracing::debug;

/// 接口状态子树里关心的两个叶子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaf {
    OperStatus,
    AdminStatus,
}

/// 期望状态评估器
///
/// 把设备打标的通知变成零或多个告警事件。evaluate 不阻塞、不做
/// I/O，可以为不同设备并发调用；观测缓存由单个互斥锁保护，
/// 临界区只做快照读和写入，从不跨出评估器持有。
pub struct Evaluator {
    config: watch::Receiver<Arc<MonitorConfig>>,
    cache: Mutex<HashMap<ObservationKey, InterfaceObservation>>,
}

impl Evaluator {
    pub fn new(config: watch::Receiver<Arc<MonitorConfig>>) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 评估一条通知，返回导出的告警事件
    ///
    /// 先把通知里的全部更新写进观测缓存，再逐个评估。SAMPLE 模式的
    /// 通知会把多个接口打包在一起，逐条边写边评会让聚合口在同批
    /// 成员状态落地之前被误判。
    pub fn evaluate(&self, device_name: &str, notification: &Notification) -> Vec<AlertEvent> {
        let config = self.config.borrow().clone();
        let mut events = Vec::new();

        let Some(device_cfg) = config.devices.get(device_name) else {
            return events;
        };

        // 第一遍：解析并写观测，记录每条更新的前后快照
        let mut touched: Vec<(String, Leaf, InterfaceObservation, InterfaceObservation)> =
            Vec::new();
        for update in &notification.update {
            let Some((interface, leaf)) =
                parse_interface_path(notification.prefix.as_ref(), update.path.as_ref())
            else {
                debug!(device = %device_name, "skipping non-interface path");
                continue;
            };

            if !device_cfg.interfaces.contains_key(&interface) {
                continue;
            }

            // 只有字符串叶子承载状态语义，其余类型仅用于日志
            let value = update
                .val
                .as_ref()
                .and_then(string_value)
                .unwrap_or_default();
            let value = normalize(value);

            let (previous, current) = {
                let mut cache = self.cache.lock().expect("observation cache poisoned");
                let entry = cache
                    .entry(ObservationKey::new(device_name, interface.as_str()))
                    .or_default();
                let previous = entry.clone();
                match leaf {
                    Leaf::OperStatus => entry.oper_status = value.clone(),
                    Leaf::AdminStatus => entry.admin_status = value.clone(),
                }
                entry.updated_at = Some(Utc::now());
                (previous, entry.clone())
            };
            touched.push((interface, leaf, previous, current));
        }

        // 第二遍：对照意图评估
        for (interface, leaf, previous, current) in touched {
            let Some(intent) = device_cfg.interfaces.get(&interface) else {
                continue;
            };

            match leaf {
                Leaf::AdminStatus => {
                    if let Some(event) = evaluate_admin_change(
                        device_name,
                        &interface,
                        intent,
                        &previous.admin_status,
                        &current.admin_status,
                    ) {
                        events.push(event);
                    }
                }
                Leaf::OperStatus => {
                    if let Some(event) =
                        evaluate_oper_change(device_name, &interface, intent, &current)
                    {
                        events.push(event);
                    }
                    self.evaluate_port_channels(device_name, &interface, device_cfg, &mut events);
                }
            }
        }

        events
    }

    /// 本接口运行状态变化后，重新评估所有它参与的聚合口
    fn evaluate_port_channels(
        &self,
        device_name: &str,
        interface: &str,
        device_cfg: &DeviceConfig,
        events: &mut Vec<AlertEvent>,
    ) {
        let mut channels = MonitorConfig::channels_for_member(device_cfg, interface);
        if let Some((name, intent)) = device_cfg.interfaces.get_key_value(interface) {
            if intent.has_members() && !channels.iter().any(|(n, _)| n.as_str() == interface) {
                channels.push((name, intent));
            }
        }

        for (channel_name, channel_intent) in channels {
            if let Some(event) =
                self.evaluate_channel_members(device_name, channel_name, channel_intent)
            {
                events.push(event);
            }
        }
    }

    fn evaluate_channel_members(
        &self,
        device_name: &str,
        channel_name: &str,
        intent: &InterfaceIntent,
    ) -> Option<AlertEvent> {
        let required = intent.members.as_ref()?.required.as_slice();
        if required.is_empty() {
            return None;
        }

        let (mode, minimum) = resolve_policy(intent, required.len());

        // 从未观测到的成员按"非活跃"处理
        let (active, down_members) = {
            let cache = self.cache.lock().expect("observation cache poisoned");
            let mut active = 0usize;
            let mut down = Vec::new();
            for member in required {
                let observed_up = cache
                    .get(&ObservationKey::new(device_name, member.as_str()))
                    .map(|obs| obs.oper_status == "up")
                    .unwrap_or(false);
                if observed_up {
                    active += 1;
                } else {
                    down.push(member.clone());
                }
            }
            (active, down)
        };

        match mode {
            MemberMode::AllActive => {
                let kind = AlertKind::PortChannelMemberDown;
                if !down_members.is_empty() {
                    let mut related = HashMap::new();
                    related.insert("down_members".to_string(), down_members.join(","));
                    Some(AlertEvent {
                        device: device_name.to_string(),
                        entity: channel_name.to_string(),
                        kind,
                        severity: intent.severity_for(kind),
                        firing: true,
                        message: format!(
                            "port-channel {} members down: {}",
                            channel_name,
                            down_members.join(", ")
                        ),
                        related,
                    })
                } else {
                    Some(AlertEvent {
                        device: device_name.to_string(),
                        entity: channel_name.to_string(),
                        kind,
                        severity: intent.severity_for(kind),
                        firing: false,
                        message: format!("port-channel {} all members active", channel_name),
                        related: HashMap::new(),
                    })
                }
            }
            MemberMode::MinActive | MemberMode::PerStackMinimum => {
                let kind = AlertKind::PortChannelDown;
                if active < minimum {
                    let mut related = HashMap::new();
                    related.insert("active_members".to_string(), active.to_string());
                    related.insert("minimum".to_string(), minimum.to_string());
                    Some(AlertEvent {
                        device: device_name.to_string(),
                        entity: channel_name.to_string(),
                        kind,
                        severity: intent.severity_for(kind),
                        firing: true,
                        message: format!(
                            "port-channel {} active members {} below minimum {}",
                            channel_name, active, minimum
                        ),
                        related,
                    })
                } else {
                    Some(AlertEvent {
                        device: device_name.to_string(),
                        entity: channel_name.to_string(),
                        kind,
                        severity: intent.severity_for(kind),
                        firing: false,
                        message: format!(
                            "port-channel {} active members {} meets minimum {}",
                            channel_name, active, minimum
                        ),
                        related: HashMap::new(),
                    })
                }
            }
        }
    }
}

/// 策略缺省为 all_active，最小值为全部成员数。
/// per_stack_minimum 按 min_active 解释，取 per_stack_minimum 作下限
/// （不建模堆叠拓扑）。
fn resolve_policy(intent: &InterfaceIntent, required_len: usize) -> (MemberMode, usize) {
    match intent.member_policy.as_ref() {
        None => (MemberMode::AllActive, required_len),
        Some(policy) => match policy.mode {
            MemberMode::AllActive => (MemberMode::AllActive, required_len),
            MemberMode::MinActive => (
                MemberMode::MinActive,
                policy.minimum.map(|m| m as usize).unwrap_or(required_len),
            ),
            MemberMode::PerStackMinimum => (
                MemberMode::PerStackMinimum,
                policy
                    .per_stack_minimum
                    .or(policy.minimum)
                    .map(|m| m as usize)
                    .unwrap_or(1),
            ),
        },
    }
}

fn evaluate_admin_change(
    device_name: &str,
    interface: &str,
    intent: &InterfaceIntent,
    previous: &str,
    current: &str,
) -> Option<AlertEvent> {
    let desired = intent.admin_state?.as_str();
    if previous == current || current.is_empty() {
        return None;
    }

    let kind = AlertKind::InterfaceAdminDown;
    if current != desired {
        let mut related = HashMap::new();
        related.insert("expected_admin".to_string(), desired.to_string());
        related.insert("actual_admin".to_string(), current.to_string());
        return Some(AlertEvent {
            device: device_name.to_string(),
            entity: interface.to_string(),
            kind,
            severity: intent.severity_for(kind),
            firing: true,
            message: format!("interface {} admin state {}", interface, current),
            related,
        });
    }

    // 从偏离恢复到期望的管理状态
    if !previous.is_empty() && previous != desired {
        return Some(AlertEvent {
            device: device_name.to_string(),
            entity: interface.to_string(),
            kind,
            severity: intent.severity_for(kind),
            firing: false,
            message: format!("interface {} admin state restored to {}", interface, current),
            related: HashMap::new(),
        });
    }

    None
}

fn evaluate_oper_change(
    device_name: &str,
    interface: &str,
    intent: &InterfaceIntent,
    observation: &InterfaceObservation,
) -> Option<AlertEvent> {
    let desired = intent.desired_state.as_str();

    // 管理状态不符时，运行状态偏离是预期内的，抑制
    if let Some(desired_admin) = intent.admin_state {
        if !observation.admin_status.is_empty()
            && observation.admin_status != desired_admin.as_str()
        {
            return None;
        }
    }

    if observation.oper_status.is_empty() {
        return None;
    }

    let kind = AlertKind::InterfaceStateMismatch;
    if observation.oper_status != desired {
        let mut related = HashMap::new();
        related.insert("expected_state".to_string(), desired.to_string());
        related.insert("actual_state".to_string(), observation.oper_status.clone());
        Some(AlertEvent {
            device: device_name.to_string(),
            entity: interface.to_string(),
            kind,
            severity: intent.severity_for(kind),
            firing: true,
            message: format!(
                "interface {} expected {} got {}",
                interface, desired, observation.oper_status
            ),
            related,
        })
    } else {
        Some(AlertEvent {
            device: device_name.to_string(),
            entity: interface.to_string(),
            kind,
            severity: intent.severity_for(kind),
            firing: false,
            message: format!(
                "interface {} recovered: oper-status {}",
                interface, observation.oper_status
            ),
            related: HashMap::new(),
        })
    }
}

/// 期望形如 /interfaces/interface[name=X]/state/{oper-status|admin-status}，
/// 接口名可能在前缀里
fn parse_interface_path(prefix: Option<&Path>, path: Option<&Path>) -> Option<(String, Leaf)> {
    let mut elems: Vec<&PathElem> = Vec::new();
    if let Some(prefix) = prefix {
        elems.extend(prefix.elem.iter());
    }
    if let Some(path) = path {
        elems.extend(path.elem.iter());
    }

    if elems.len() < 4 {
        return None;
    }
    if elems[0].name != "interfaces" || elems[1].name != "interface" {
        return None;
    }
    let interface = elems[1].key.get("name")?;
    if interface.is_empty() || interface == "*" {
        return None;
    }
    if elems[2].name != "state" {
        return None;
    }

    let leaf = match elems[3].name.as_str() {
        "oper-status" => Leaf::OperStatus,
        "admin-status" => Leaf::AdminStatus,
        _ => return None,
    };

    Some((interface.clone(), leaf))
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemon_config::{
        AdminState, AlertsConfig, CredentialsConfig, DesiredState, GlobalConfig, MemberPolicy,
        MemberSpec, SeverityOverrides,
    };
    use telemon_core::Severity;
    use telemon_gnmi::proto::{typed_value, TypedValue, Update};

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

    fn config_with(interfaces: Vec<(&str, InterfaceIntent)>) -> Arc<MonitorConfig> {
        let mut map = HashMap::new();
        for (name, it) in interfaces {
            map.insert(name.to_string(), it);
        }
        let mut devices = HashMap::new();
        devices.insert(
            "d1".to_string(),
            DeviceConfig {
                address: "10.0.0.1".to_string(),
                description: None,
                credentials_ref: None,
                tls: None,
                interfaces: map,
            },
        );
        Arc::new(MonitorConfig {
            global: GlobalConfig::default(),
            devices,
            alerts: AlertsConfig::default(),
            credentials: CredentialsConfig::default(),
        })
    }

    fn evaluator(config: Arc<MonitorConfig>) -> Evaluator {
        // 发送端丢弃后 borrow() 仍返回最后的值，评估器只读不等待
        let (_tx, rx) = watch::channel(config);
        Evaluator::new(rx)
    }

    fn state_update(interface: &str, leaf: &str, value: &str) -> Update {
        let mut key = HashMap::new();
        key.insert("name".to_string(), interface.to_string());
        Update {
            path: Some(Path {
                origin: String::new(),
                elem: vec![
                    PathElem {
                        name: "interfaces".to_string(),
                        key: Default::default(),
                    },
                    PathElem {
                        name: "interface".to_string(),
                        key,
                    },
                    PathElem {
                        name: "state".to_string(),
                        key: Default::default(),
                    },
                    PathElem {
                        name: leaf.to_string(),
                        key: Default::default(),
                    },
                ],
                target: String::new(),
            }),
            val: Some(TypedValue {
                value: Some(typed_value::Value::StringVal(value.to_string())),
            }),
            duplicates: 0,
        }
    }

    fn batch(updates: Vec<Update>) -> Notification {
        Notification {
            timestamp: 0,
            prefix: None,
            update: updates,
            delete: vec![],
            atomic: false,
        }
    }

    fn notification(interface: &str, leaf: &str, value: &str) -> Notification {
        batch(vec![state_update(interface, leaf, value)])
    }

    #[test]
    fn test_mismatch_fires_and_recovers() {
        let eval = evaluator(config_with(vec![("Gi1/0/1", intent(DesiredState::Up))]));

        let events = eval.evaluate("d1", &notification("Gi1/0/1", "oper-status", "UP"));
        assert_eq!(events.len(), 1);
        assert!(!events[0].firing);

        let events = eval.evaluate("d1", &notification("Gi1/0/1", "oper-status", "DOWN"));
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert!(event.firing);
        assert_eq!(event.kind, AlertKind::InterfaceStateMismatch);
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.entity, "Gi1/0/1");
        assert_eq!(event.related["expected_state"], "up");
        assert_eq!(event.related["actual_state"], "down");

        let events = eval.evaluate("d1", &notification("Gi1/0/1", "oper-status", "UP"));
        assert_eq!(events.len(), 1);
        assert!(!events[0].firing);
        assert_eq!(events[0].kind, AlertKind::InterfaceStateMismatch);
    }

    #[test]
    fn test_admin_down_suppresses_oper_mismatch() {
        let mut it = intent(DesiredState::Up);
        it.admin_state = Some(AdminState::Enabled);
        let eval = evaluator(config_with(vec![("Gi1/0/2", it)]));

        let events = eval.evaluate("d1", &notification("Gi1/0/2", "admin-status", "DOWN"));
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert!(event.firing);
        assert_eq!(event.kind, AlertKind::InterfaceAdminDown);
        assert_eq!(event.severity, Severity::Warning);

        // 管理状态不符时运行状态偏离被抑制
        let events = eval.evaluate("d1", &notification("Gi1/0/2", "oper-status", "DOWN"));
        assert!(events.is_empty());
    }

    #[test]
    fn test_admin_restore_resolves() {
        let mut it = intent(DesiredState::Up);
        it.admin_state = Some(AdminState::Enabled);
        let eval = evaluator(config_with(vec![("Gi1/0/2", it)]));

        let _ = eval.evaluate("d1", &notification("Gi1/0/2", "admin-status", "DOWN"));
        let events = eval.evaluate("d1", &notification("Gi1/0/2", "admin-status", "ENABLED"));
        assert_eq!(events.len(), 1);
        assert!(!events[0].firing);
        assert_eq!(events[0].kind, AlertKind::InterfaceAdminDown);
    }

    #[test]
    fn test_repeated_admin_sample_no_event() {
        let mut it = intent(DesiredState::Up);
        it.admin_state = Some(AdminState::Enabled);
        let eval = evaluator(config_with(vec![("Gi1/0/2", it)]));

        let events = eval.evaluate("d1", &notification("Gi1/0/2", "admin-status", "DOWN"));
        assert_eq!(events.len(), 1);
        // 相同值再次采样不产生事件
        let events = eval.evaluate("d1", &notification("Gi1/0/2", "admin-status", "DOWN"));
        assert!(events.is_empty());
    }

    #[test]
    fn test_undeclared_device_and_interface_skipped() {
        let eval = evaluator(config_with(vec![("Gi1/0/1", intent(DesiredState::Up))]));

        assert!(eval
            .evaluate("ghost", &notification("Gi1/0/1", "oper-status", "DOWN"))
            .is_empty());
        assert!(eval
            .evaluate("d1", &notification("Gi9/9/9", "oper-status", "DOWN"))
            .is_empty());
    }

    #[test]
    fn test_irrelevant_leaf_ignored() {
        let eval = evaluator(config_with(vec![("Gi1/0/1", intent(DesiredState::Up))]));
        assert!(eval
            .evaluate("d1", &notification("Gi1/0/1", "mtu", "1500"))
            .is_empty());
    }

    #[test]
    fn test_interface_name_from_prefix() {
        let eval = evaluator(config_with(vec![("Gi1/0/1", intent(DesiredState::Up))]));

        let mut key = HashMap::new();
        key.insert("name".to_string(), "Gi1/0/1".to_string());
        let notif = Notification {
            timestamp: 0,
            prefix: Some(Path {
                origin: String::new(),
                elem: vec![
                    PathElem {
                        name: "interfaces".to_string(),
                        key: Default::default(),
                    },
                    PathElem {
                        name: "interface".to_string(),
                        key,
                    },
                    PathElem {
                        name: "state".to_string(),
                        key: Default::default(),
                    },
                ],
                target: String::new(),
            }),
            update: vec![Update {
                path: Some(Path {
                    origin: String::new(),
                    elem: vec![PathElem {
                        name: "oper-status".to_string(),
                        key: Default::default(),
                    }],
                    target: String::new(),
                }),
                val: Some(TypedValue {
                    value: Some(typed_value::Value::StringVal("DOWN".to_string())),
                }),
                duplicates: 0,
            }],
            delete: vec![],
            atomic: false,
        };

        let events = eval.evaluate("d1", &notif);
        assert_eq!(events.len(), 1);
        assert!(events[0].firing);
    }

    fn port_channel_config(mode: MemberMode, minimum: Option<u32>) -> Arc<MonitorConfig> {
        let mut po1 = intent(DesiredState::Up);
        po1.members = Some(MemberSpec {
            required: vec!["Gi1/0/49".to_string(), "Gi1/0/50".to_string()],
        });
        po1.member_policy = Some(MemberPolicy {
            mode,
            minimum,
            per_stack_minimum: None,
        });
        config_with(vec![
            ("Gi1/0/49", intent(DesiredState::Up)),
            ("Gi1/0/50", intent(DesiredState::Up)),
            ("Po1", po1),
        ])
    }

    #[test]
    fn test_port_channel_all_active_member_down() {
        let eval = evaluator(port_channel_config(MemberMode::AllActive, None));

        let _ = eval.evaluate("d1", &notification("Gi1/0/49", "oper-status", "UP"));
        let events = eval.evaluate("d1", &notification("Gi1/0/50", "oper-status", "UP"));
        // 两个成员都 up 后聚合口评估产出解除事件
        assert!(events
            .iter()
            .any(|e| e.kind == AlertKind::PortChannelMemberDown && !e.firing));

        let events = eval.evaluate("d1", &notification("Gi1/0/49", "oper-status", "DOWN"));
        let member_down = events
            .iter()
            .find(|e| e.kind == AlertKind::PortChannelMemberDown && e.firing)
            .expect("member_down event");
        assert_eq!(member_down.entity, "Po1");
        assert_eq!(member_down.related["down_members"], "Gi1/0/49");
    }

    #[test]
    fn test_port_channel_min_active() {
        let eval = evaluator(port_channel_config(MemberMode::MinActive, Some(2)));

        let _ = eval.evaluate("d1", &notification("Gi1/0/49", "oper-status", "UP"));
        let _ = eval.evaluate("d1", &notification("Gi1/0/50", "oper-status", "UP"));

        let events = eval.evaluate("d1", &notification("Gi1/0/50", "oper-status", "DOWN"));
        let channel_down = events
            .iter()
            .find(|e| e.kind == AlertKind::PortChannelDown && e.firing)
            .expect("channel_down event");
        assert_eq!(channel_down.related["active_members"], "1");
        assert_eq!(channel_down.related["minimum"], "2");
    }

    #[test]
    fn test_batched_updates_written_before_evaluation() {
        let eval = evaluator(port_channel_config(MemberMode::AllActive, None));

        // 同一条 SAMPLE 通知带上两个成员：聚合口评估要看到两个都 up
        let events = eval.evaluate(
            "d1",
            &batch(vec![
                state_update("Gi1/0/49", "oper-status", "UP"),
                state_update("Gi1/0/50", "oper-status", "UP"),
            ]),
        );
        assert!(!events
            .iter()
            .any(|e| e.kind == AlertKind::PortChannelMemberDown && e.firing));

        let events = eval.evaluate("d1", &notification("Gi1/0/49", "oper-status", "DOWN"));
        let member_down = events
            .iter()
            .find(|e| e.kind == AlertKind::PortChannelMemberDown && e.firing)
            .expect("member_down event");
        assert_eq!(member_down.related["down_members"], "Gi1/0/49");
    }

    #[test]
    fn test_unobserved_member_counts_as_down() {
        let eval = evaluator(port_channel_config(MemberMode::AllActive, None));

        // Gi1/0/50 从未观测到，应当算作不活跃
        let events = eval.evaluate("d1", &notification("Gi1/0/49", "oper-status", "UP"));
        let member_down = events
            .iter()
            .find(|e| e.kind == AlertKind::PortChannelMemberDown && e.firing)
            .expect("member_down event");
        assert_eq!(member_down.related["down_members"], "Gi1/0/50");
    }

    #[test]
    fn test_per_stack_minimum_treated_as_min_active() {
        let mut po1 = intent(DesiredState::Up);
        po1.members = Some(MemberSpec {
            required: vec!["Gi1/0/49".to_string(), "Gi1/0/50".to_string()],
        });
        po1.member_policy = Some(MemberPolicy {
            mode: MemberMode::PerStackMinimum,
            minimum: None,
            per_stack_minimum: Some(2),
        });
        let eval = evaluator(config_with(vec![
            ("Gi1/0/49", intent(DesiredState::Up)),
            ("Gi1/0/50", intent(DesiredState::Up)),
            ("Po1", po1),
        ]));

        let _ = eval.evaluate("d1", &notification("Gi1/0/49", "oper-status", "UP"));
        let events = eval.evaluate("d1", &notification("Gi1/0/50", "oper-status", "DOWN"));
        assert!(events
            .iter()
            .any(|e| e.kind == AlertKind::PortChannelDown && e.firing));
    }
}
