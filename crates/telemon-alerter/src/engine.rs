use crate::escalation::EscalationManager;
use crate::flap::FlapDetector;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemon_config::BehaviorConfig;
use telemon_core::{Alert, AlertEvent, AlertKey, AlertKind, EntityKey, Severity};
use telemon_notify::NotifyRouter;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const EVENT_QUEUE_SIZE: usize = 512;
const FLAP_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// 告警引擎：单个消费循环拥有全部状态变更
///
/// 事件按 翻动过滤 -> 去重 -> 触发/解除 的顺序处理；
/// 活动表对状态 API 开放只读。投递失败只记日志，
/// 告警留在活动表里，后续解除仍会被跟踪。
pub struct AlertEngine {
    dedup_window: Duration,
    flap: Option<FlapDetector>,
    router: Arc<NotifyRouter>,
    escalation: EscalationManager,
    active: Arc<RwLock<HashMap<AlertKey, Alert>>>,
    last_fired: HashMap<AlertKey, Instant>,
    events_rx: mpsc::Receiver<AlertEvent>,
}

/// 引擎的外部入口：非阻塞投递事件，读取活动告警
#[derive(Clone)]
pub struct EngineHandle {
    events_tx: mpsc::Sender<AlertEvent>,
    active: Arc<RwLock<HashMap<AlertKey, Alert>>>,
    dropped: Arc<AtomicU64>,
    in_overflow: Arc<AtomicBool>,
}

impl EngineHandle {
    /// 非阻塞投递；队列满时丢弃最新一条并计数（唯一的有损路径）。
    /// 每个溢出突发只记一次日志。
    pub fn submit(&self, event: AlertEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {
                self.in_overflow.store(false, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if !self.in_overflow.swap(true, Ordering::Relaxed) {
                    warn!(dropped_total = total, "alert event queue full, dropping events");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    pub async fn active_alerts(&self) -> Vec<Alert> {
        let active = self.active.read().await;
        active.values().cloned().collect()
    }

    /// 累计丢弃的事件数
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// 运行中的引擎任务句柄
pub struct EngineTask {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl EngineTask {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join_handle.await;
    }
}

impl AlertEngine {
    pub fn new(behavior: &BehaviorConfig, router: Arc<NotifyRouter>) -> (Self, EngineHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let active = Arc::new(RwLock::new(HashMap::new()));

        let flap = if behavior.flap_detection.enabled {
            Some(FlapDetector::new(
                behavior.flap_detection.threshold,
                Duration::from_secs(behavior.flap_detection.window_secs),
            ))
        } else {
            None
        };

        let engine = Self {
            dedup_window: Duration::from_secs(behavior.dedup_window_secs),
            flap,
            router: router.clone(),
            escalation: EscalationManager::new(router),
            active: active.clone(),
            last_fired: HashMap::new(),
            events_rx,
        };

        let handle = EngineHandle {
            events_tx,
            active,
            dropped: Arc::new(AtomicU64::new(0)),
            in_overflow: Arc::new(AtomicBool::new(false)),
        };
        (engine, handle)
    }

    /// 启动消费循环
    pub fn start(self) -> EngineTask {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join_handle = tokio::spawn(self.run(shutdown_rx));
        EngineTask {
            shutdown_tx,
            join_handle,
        }
    }

    async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("alert engine started");
        let mut sweep = tokio::time::interval(FLAP_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = sweep.tick() => {
                    self.sweep_flap_recovery().await;
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.process(event).await,
                        None => break,
                    }
                }
            }
        }

        self.escalation.cancel_all().await;
        info!("alert engine stopped");
    }

    async fn process(&mut self, event: AlertEvent) {
        if event.firing {
            self.process_firing(event).await;
        } else {
            self.process_resolve(event).await;
        }
    }

    async fn process_firing(&mut self, event: AlertEvent) {
        let key = event.key();
        let entity_key = event.entity_key();

        if let Some(flap) = self.flap.as_mut() {
            let (flapping, just_started) = flap.record_change(&entity_key);
            if flapping {
                if just_started {
                    self.fire_flap_alert(&event).await;
                }
                // flapping 期间个体告警既不触发也不计入去重
                return;
            }
        }

        let now = Instant::now();
        if let Some(last) = self.last_fired.get(&key) {
            if now.duration_since(*last) < self.dedup_window {
                debug!(key = %key, "alert deduplicated");
                return;
            }
        }
        self.last_fired.insert(key.clone(), now);

        let alert = Alert::new(&key, event.severity, event.message, event.related);
        warn!(
            device = %alert.device,
            entity = %alert.entity,
            kind = %alert.kind,
            severity = %alert.severity,
            "alert fired"
        );

        self.active.write().await.insert(key, alert.clone());

        let channels = self.router.channels_for(alert.severity);
        self.router.dispatch(&alert, &channels).await;
        self.escalation.schedule(&alert, &channels).await;
    }

    async fn process_resolve(&mut self, event: AlertEvent) {
        let key = event.key();

        // 不存在的身份解除是无操作
        let Some(mut alert) = self.active.write().await.remove(&key) else {
            return;
        };

        alert.suppressed = self
            .flap
            .as_ref()
            .map(|flap| flap.is_flapping(&event.entity_key()))
            .unwrap_or(false);
        alert.resolve(event.message);

        info!(
            device = %alert.device,
            entity = %alert.entity,
            kind = %alert.kind,
            "alert resolved"
        );

        if !alert.suppressed {
            let channels = self.router.channels_for(alert.severity);
            self.router.dispatch(&alert, &channels).await;
        }

        self.escalation.cancel(&key).await;
    }

    async fn fire_flap_alert(&mut self, event: &AlertEvent) {
        let flap_key = AlertKey::new(
            event.device.clone(),
            event.entity.clone(),
            AlertKind::FlappingDetected,
        );
        let alert = Alert::new(
            &flap_key,
            Severity::Warning,
            format!(
                "Flapping detected on {} {}: suppressing individual alerts",
                event.device, event.entity
            ),
            HashMap::new(),
        );

        self.active
            .write()
            .await
            .insert(flap_key, alert.clone());

        let channels = self.router.channels_for(Severity::Warning);
        self.router.dispatch(&alert, &channels).await;
    }

    /// 30 秒一次的恢复扫描：历史降回阈值以下的实体解除其
    /// flapping_detected 告警，恢复正常处理
    async fn sweep_flap_recovery(&mut self) {
        let Some(flap) = self.flap.as_mut() else {
            return;
        };

        // 先做恢复判定再清历史：cleanup 会连带摘掉 flapping 标记，
        // 顺序反了 flapping_detected 就永远解除不了
        let mut resolved = Vec::new();
        {
            let mut active = self.active.write().await;
            let flap_keys: Vec<AlertKey> = active
                .keys()
                .filter(|key| key.kind == AlertKind::FlappingDetected)
                .cloned()
                .collect();

            for key in flap_keys {
                let entity_key = EntityKey::new(key.device.clone(), key.entity.clone());
                if flap.check_stable(&entity_key) {
                    if let Some(mut alert) = active.remove(&key) {
                        alert.resolve(format!(
                            "Flapping stopped on {} {}",
                            key.device, key.entity
                        ));
                        resolved.push(alert);
                    }
                }
            }
        }

        for alert in resolved {
            let channels = self.router.channels_for(alert.severity);
            self.router.dispatch(&alert, &channels).await;
        }

        flap.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use telemon_config::{ChannelConfig, ChannelKind, FlapConfig};
    use telemon_core::AlertState;
    use telemon_notify::{Notifier, NotifyMessage, NotifyResult};

    #[derive(Clone, Default)]
    struct Recording {
        sent: Arc<StdMutex<Vec<NotifyMessage>>>,
    }

    impl Recording {
        fn titles(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.title.clone()).collect()
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn escalated_count(&self) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.content.contains("[ESCALATED]"))
                .count()
        }
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, message: &NotifyMessage) -> anyhow::Result<NotifyResult> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(NotifyResult::success())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn behavior(flap_enabled: bool) -> BehaviorConfig {
        BehaviorConfig {
            dedup_window_secs: 300,
            flap_detection: FlapConfig {
                enabled: flap_enabled,
                threshold: 3,
                window_secs: 60,
            },
        }
    }

    fn router_with(
        recording: &Recording,
        escalation_delay_secs: u64,
    ) -> Arc<NotifyRouter> {
        let mut rules = HashMap::new();
        rules.insert("default".to_string(), vec!["sink".to_string()]);
        let mut router = NotifyRouter::new(rules);
        router.add_channel(
            "sink".to_string(),
            ChannelConfig {
                kind: ChannelKind::Webhook,
                url_env: "UNUSED".to_string(),
                severity_filter: None,
                escalation_delay_secs,
            },
            Box::new(recording.clone()),
        );
        Arc::new(router)
    }

    fn event(firing: bool) -> AlertEvent {
        AlertEvent {
            device: "d1".to_string(),
            entity: "Gi1/0/1".to_string(),
            kind: AlertKind::InterfaceStateMismatch,
            severity: Severity::Critical,
            firing,
            message: if firing { "down" } else { "recovered" }.to_string(),
            related: HashMap::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_dedup_and_resolve() {
        let recording = Recording::default();
        let (engine, handle) = AlertEngine::new(&behavior(false), router_with(&recording, 0));
        let task = engine.start();

        handle.submit(event(true));
        handle.submit(event(true)); // 去重窗口内，丢弃
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recording.count(), 1);
        assert_eq!(handle.active_alerts().await.len(), 1);

        handle.submit(event(false));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recording.count(), 2);
        assert!(handle.active_alerts().await.is_empty());

        // 解除后窗口内再触发仍被去重（scenario C）
        handle.submit(event(true));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recording.count(), 2);

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_without_active_is_noop() {
        let recording = Recording::default();
        let (engine, handle) = AlertEngine::new(&behavior(false), router_with(&recording, 0));
        let task = engine.start();

        handle.submit(event(false));
        handle.submit(event(false));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recording.count(), 0);

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refire_after_dedup_window() {
        let recording = Recording::default();
        let (engine, handle) = AlertEngine::new(&behavior(false), router_with(&recording, 0));
        let task = engine.start();

        handle.submit(event(true));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recording.count(), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        handle.submit(event(true));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recording.count(), 2);

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_flap_suppression_and_recovery() {
        let recording = Recording::default();
        let (engine, handle) = AlertEngine::new(&behavior(true), router_with(&recording, 0));
        let task = engine.start();

        // 阈值 3：第三次触发进入 flapping，只发一条 flapping_detected
        for _ in 0..5 {
            handle.submit(event(true));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let titles = recording.titles();
        let flap_count = titles
            .iter()
            .filter(|t| t.contains("flapping_detected"))
            .count();
        let mismatch_count = titles
            .iter()
            .filter(|t| t.contains("interface_state_mismatch"))
            .count();
        assert_eq!(flap_count, 1);
        // 进入 flapping 前的两次触发中只有第一次通过去重
        assert_eq!(mismatch_count, 1);

        let active = handle.active_alerts().await;
        assert!(active
            .iter()
            .any(|a| a.kind == AlertKind::FlappingDetected && a.state == AlertState::Firing));

        // 静默超过窗口后，恢复扫描解除 flapping_detected
        tokio::time::advance(Duration::from_secs(90)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let titles = recording.titles();
        let resolved_flap = recording
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.title.contains("flapping_detected") && m.content.contains("Resolved at"))
            .count();
        assert_eq!(resolved_flap, 1, "titles: {titles:?}");
        assert!(handle
            .active_alerts()
            .await
            .iter()
            .all(|a| a.kind != AlertKind::FlappingDetected));

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalation_fires_after_delay() {
        let recording = Recording::default();
        let (engine, handle) = AlertEngine::new(&behavior(false), router_with(&recording, 5));
        let task = engine.start();

        handle.submit(event(true));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recording.count(), 1);
        assert_eq!(recording.escalated_count(), 0);

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recording.escalated_count(), 1);

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_cancels_escalation() {
        let recording = Recording::default();
        let (engine, handle) = AlertEngine::new(&behavior(false), router_with(&recording, 5));
        let task = engine.start();

        handle.submit(event(true));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.submit(event(false));
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recording.escalated_count(), 0);
        // 触发 + 解除各一条
        assert_eq!(recording.count(), 2);

        task.shutdown().await;
    }
}
