use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use telemon_core::{Alert, AlertKey};
use telemon_notify::NotifyRouter;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

/// 升级管理：对未解除的告警，在配置的延迟后把它再投递到
/// 带 escalation_delay 的渠道
///
/// 解除与引擎停机都会取消挂起的计时器，不留泄漏。
pub struct EscalationManager {
    router: Arc<NotifyRouter>,
    timers: Arc<Mutex<HashMap<AlertKey, oneshot::Sender<()>>>>,
}

impl EscalationManager {
    pub fn new(router: Arc<NotifyRouter>) -> Self {
        Self {
            router,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 为刚触发的告警启动升级计时器
    ///
    /// 延迟取路由到的渠道中配置延迟的最大值；到点后只把告警
    /// 重投到这些延迟渠道。
    pub async fn schedule(&self, alert: &Alert, channels: &[String]) {
        let delayed: Vec<(String, Duration)> = channels
            .iter()
            .filter_map(|name| {
                self.router
                    .escalation_delay(name)
                    .map(|delay| (name.clone(), delay))
            })
            .collect();

        if delayed.is_empty() {
            return;
        }

        let max_delay = delayed
            .iter()
            .map(|(_, delay)| *delay)
            .max()
            .unwrap_or_default();
        let escalation_channels: Vec<String> = delayed.into_iter().map(|(name, _)| name).collect();

        let key = alert.key();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut timers = self.timers.lock().await;
            if let Some(previous) = timers.insert(key.clone(), cancel_tx) {
                let _ = previous.send(());
            }
        }

        debug!(
            key = %key,
            delay = ?max_delay,
            channels = ?escalation_channels,
            "escalation timer started"
        );

        let router = self.router.clone();
        let timers = self.timers.clone();
        let mut alert = alert.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx => {}
                _ = tokio::time::sleep(max_delay) => {
                    warn!(key = %key, channels = ?escalation_channels, "escalating unresolved alert");
                    alert.message = format!("[ESCALATED] {}", alert.message);
                    router.dispatch(&alert, &escalation_channels).await;
                    timers.lock().await.remove(&key);
                }
            }
        });
    }

    /// 告警解除时取消挂起的升级
    pub async fn cancel(&self, key: &AlertKey) {
        let mut timers = self.timers.lock().await;
        if let Some(cancel) = timers.remove(key) {
            let _ = cancel.send(());
            debug!(key = %key, "escalation cancelled");
        }
    }

    /// 停机时取消全部计时器
    pub async fn cancel_all(&self) {
        let mut timers = self.timers.lock().await;
        for (_, cancel) in timers.drain() {
            let _ = cancel.send(());
        }
    }
}
