use crate::message::NotifyMessage;
use crate::notifier::Notifier;
use crate::providers::{AppriseNotifier, SlackNotifier, WebhookNotifier};
use std::collections::HashMap;
use std::time::Duration;
use telemon_config::{AlertsConfig, ChannelConfig, ChannelKind};
use telemon_core::{Alert, Severity};
use tracing::{debug, error, info, warn};

struct RoutedChannel {
    cfg: ChannelConfig,
    notifier: Box<dyn Notifier>,
}

/// 通知路由器：渠道表 + 级别路由规则
///
/// 投递是尽力而为：单个渠道失败只记日志，不影响其它渠道，
/// 也不影响引擎里的告警状态。
pub struct NotifyRouter {
    channels: HashMap<String, RoutedChannel>,
    rules: HashMap<String, Vec<String>>,
}

impl NotifyRouter {
    pub fn new(rules: HashMap<String, Vec<String>>) -> Self {
        Self {
            channels: HashMap::new(),
            rules,
        }
    }

    /// 按配置构建渠道与规则
    pub fn from_config(alerts: &AlertsConfig) -> Self {
        let rules = alerts
            .rules
            .iter()
            .map(|(name, rule)| (name.clone(), rule.channels.clone()))
            .collect();

        let mut router = Self::new(rules);
        for (name, cfg) in &alerts.channels {
            let notifier: Box<dyn Notifier> = match cfg.kind {
                ChannelKind::Webhook => Box::new(WebhookNotifier::new(cfg.url_env.clone())),
                ChannelKind::Slack => Box::new(SlackNotifier::new(cfg.url_env.clone())),
                ChannelKind::Apprise => Box::new(AppriseNotifier::new(cfg.url_env.clone())),
            };
            router.add_channel(name.clone(), cfg.clone(), notifier);
        }
        router
    }

    /// 注册一个渠道（测试可注入自定义通知器）
    pub fn add_channel(&mut self, name: String, cfg: ChannelConfig, notifier: Box<dyn Notifier>) {
        info!(channel = %name, kind = %notifier.name(), "registered notification channel");
        self.channels.insert(name, RoutedChannel { cfg, notifier });
    }

    /// 某级别路由到的渠道：级别规则 -> default 规则 -> 空
    pub fn channels_for(&self, severity: Severity) -> Vec<String> {
        if let Some(channels) = self.rules.get(severity.as_str()) {
            return channels.clone();
        }
        if let Some(channels) = self.rules.get("default") {
            return channels.clone();
        }
        Vec::new()
    }

    /// 渠道配置的升级延迟（0 表示无）
    pub fn escalation_delay(&self, channel: &str) -> Option<Duration> {
        let delay = self.channels.get(channel)?.cfg.escalation_delay_secs;
        if delay == 0 {
            None
        } else {
            Some(Duration::from_secs(delay))
        }
    }

    /// 把告警投递到指定渠道
    pub async fn dispatch(&self, alert: &Alert, channels: &[String]) {
        let message = NotifyMessage::from_alert(alert);

        for name in channels {
            let Some(channel) = self.channels.get(name) else {
                warn!(channel = %name, "unknown notification channel, skipping");
                continue;
            };

            if let Some(filter) = &channel.cfg.severity_filter {
                if !filter.contains(&alert.severity) {
                    debug!(channel = %name, severity = %alert.severity, "severity filtered");
                    continue;
                }
            }

            match channel.notifier.send(&message).await {
                Ok(result) if result.success => {
                    info!(channel = %name, alert_id = %alert.id, "notification sent");
                }
                Ok(result) => {
                    warn!(channel = %name, alert_id = %alert.id, reason = %result.message, "notification not delivered");
                }
                Err(e) => {
                    error!(channel = %name, alert_id = %alert.id, error = %e, "failed to send notification");
                }
            }
        }
    }
}
