use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use telemon_alerter::EngineHandle;
use telemon_collector::{
    Backoff, Collector, CollectorConfig, CollectorError, TlsOptions,
};
use telemon_config::{ConfigLoader, DeviceConfig, DeviceTlsConfig, MonitorConfig};
use telemon_evaluator::Evaluator;
use telemon_gnmi::proto::Notification;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const RECONNECT_BACKOFF_MIN: Duration = Duration::from_secs(5);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(120);
const ERROR_COOLDOWN: Duration = Duration::from_secs(5);

struct DeviceRuntime {
    collector: Arc<Collector>,
    connection_task: JoinHandle<()>,
    update_task: JoinHandle<()>,
}

impl DeviceRuntime {
    async fn close(self) {
        self.collector.close().await;
        let _ = self.connection_task.await;
        let _ = self.update_task.await;
    }
}

/// 监督器：拥有采集器集合，把配置映射到采集器，
/// 把通知泵进评估器、把评估结果泵进告警引擎
///
/// 每台设备两个协作任务：连接任务负责重连与退避，
/// 更新任务负责消费通知。配置重载只增删/重建采集器，
/// 不触碰评估器缓存与引擎活动表。
pub struct Supervisor {
    config_dir: PathBuf,
    config_tx: watch::Sender<Arc<MonitorConfig>>,
    devices: RwLock<HashMap<String, DeviceRuntime>>,
    evaluator: Arc<Evaluator>,
    engine: EngineHandle,
    shutdown_tx: watch::Sender<bool>,
    default_username: String,
    default_password: String,
}

impl Supervisor {
    pub fn new(
        config_dir: PathBuf,
        initial: Arc<MonitorConfig>,
        engine: EngineHandle,
        default_username: String,
        default_password: String,
    ) -> Self {
        let (config_tx, config_rx) = watch::channel(initial);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config_dir,
            config_tx,
            devices: RwLock::new(HashMap::new()),
            evaluator: Arc::new(Evaluator::new(config_rx)),
            engine,
            shutdown_tx,
            default_username,
            default_password,
        }
    }

    /// 当前配置快照
    pub fn config(&self) -> Arc<MonitorConfig> {
        self.config_tx.borrow().clone()
    }

    /// 为配置中的每台设备启动采集
    pub async fn start_all(&self) {
        let config = self.config();
        info!(device_count = config.devices.len(), "starting collectors");
        for (name, device_cfg) in &config.devices {
            self.spawn_device(name, device_cfg, &config).await;
        }
    }

    /// 重载配置：校验失败保持旧配置继续运行
    ///
    /// 移除的设备关停遗忘；保留的设备关停重建（比逐字段 diff 简单，
    /// 对外只是一小段遥测空档）；新增设备照常启动。
    pub async fn reload(&self) -> anyhow::Result<()> {
        info!(config_dir = %self.config_dir.display(), "reloading configuration");
        let new_config = Arc::new(ConfigLoader::new(&self.config_dir).load()?);

        {
            let mut devices = self.devices.write().await;
            let removed: Vec<String> = devices
                .keys()
                .filter(|name| !new_config.devices.contains_key(*name))
                .cloned()
                .collect();
            for name in removed {
                if let Some(runtime) = devices.remove(&name) {
                    info!(device = %name, "device removed from config, stopping collector");
                    runtime.close().await;
                }
            }
        }

        self.config_tx.send_replace(new_config.clone());

        for (name, device_cfg) in &new_config.devices {
            self.spawn_device(name, device_cfg, &new_config).await;
        }

        info!(
            device_count = new_config.devices.len(),
            "configuration reloaded"
        );
        Ok(())
    }

    /// 关停所有采集器并等待任务退出
    pub async fn shutdown(&self) {
        info!("supervisor shutting down");
        self.shutdown_tx.send_replace(true);

        let mut devices = self.devices.write().await;
        for (name, runtime) in devices.drain() {
            debug!(device = %name, "closing collector");
            runtime.close().await;
        }
    }

    pub async fn device_names(&self) -> Vec<String> {
        self.devices.read().await.keys().cloned().collect()
    }

    pub async fn collector(&self, name: &str) -> Option<Arc<Collector>> {
        self.devices
            .read()
            .await
            .get(name)
            .map(|runtime| runtime.collector.clone())
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    async fn spawn_device(&self, name: &str, device_cfg: &DeviceConfig, config: &MonitorConfig) {
        // 同名旧采集器先关停（重载路径）
        if let Some(existing) = self.devices.write().await.remove(name) {
            info!(device = %name, "restarting collector");
            existing.close().await;
        }

        let credential = config.resolve_credentials(name);
        let username = if credential.username.is_empty() {
            self.default_username.clone()
        } else {
            credential.username
        };
        let password = credential
            .password_env
            .as_deref()
            .and_then(|env_name| std::env::var(env_name).ok())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.default_password.clone());

        info!(
            device = %name,
            address = %device_cfg.address,
            port = config.global.gnmi_port,
            "creating collector"
        );

        let collector = Arc::new(Collector::new(CollectorConfig {
            address: device_cfg.address.clone(),
            port: config.global.gnmi_port,
            username,
            password,
            tls: device_cfg.tls.as_ref().map(to_tls_options),
            sample_interval: Duration::from_secs(config.global.sample_interval_secs),
        }));

        let streams = collector
            .take_streams()
            .expect("fresh collector always has streams");

        let connection_task = tokio::spawn(connection_loop(
            name.to_string(),
            collector.clone(),
            streams.errors,
            self.shutdown_tx.subscribe(),
        ));
        let update_task = tokio::spawn(update_loop(
            name.to_string(),
            streams.updates,
            collector.done(),
            self.evaluator.clone(),
            self.engine.clone(),
            self.shutdown_tx.subscribe(),
        ));

        self.devices.write().await.insert(
            name.to_string(),
            DeviceRuntime {
                collector,
                connection_task,
                update_task,
            },
        );
    }
}

fn to_tls_options(cfg: &DeviceTlsConfig) -> TlsOptions {
    TlsOptions {
        enabled: cfg.enabled,
        insecure_skip_verify: cfg.insecure_skip_verify,
        server_name: cfg.server_name.clone(),
        ca_file: cfg.ca_file.clone(),
        cert_file: cfg.cert_file.clone(),
        key_file: cfg.key_file.clone(),
    }
}

/// 连接任务：带退避的连接重试；连上之后守着错误流，
/// 会话丢失则冷却后重连。主动 close() 时静默退出。
async fn connection_loop(
    device: String,
    collector: Arc<Collector>,
    mut errors: mpsc::Receiver<CollectorError>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(device = %device, "starting connection task");
    let mut backoff = Backoff::new(RECONNECT_BACKOFF_MIN, RECONNECT_BACKOFF_MAX);
    let mut done = collector.done();

    loop {
        if *shutdown.borrow() || *done.borrow() {
            return;
        }

        let connect_result = tokio::select! {
            _ = shutdown.changed() => return,
            _ = done.changed() => return,
            result = collector.connect() => result,
        };

        match connect_result {
            Ok(()) => {
                backoff.reset();
                info!(device = %device, "connection established, monitoring for errors");

                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = done.changed() => {
                        debug!(device = %device, "collector closed, exiting connection task");
                        return;
                    }
                    err = errors.recv() => {
                        let Some(err) = err else { return };
                        if *done.borrow() {
                            debug!(device = %device, "collector closed during shutdown");
                            return;
                        }
                        warn!(device = %device, error = %err, "connection lost, will reconnect after cooldown");
                        tokio::select! {
                            _ = shutdown.changed() => return,
                            _ = done.changed() => return,
                            _ = tokio::time::sleep(ERROR_COOLDOWN) => {}
                        }
                    }
                }
            }
            Err(CollectorError::ClosedDuringSetup) => {
                debug!(device = %device, "collector closed, exiting connection task");
                return;
            }
            Err(err) => {
                // 认证失败没有新凭据就不会好转，直接退到最大间隔
                let delay = if matches!(err, CollectorError::AuthFailed(_)) {
                    backoff.saturated()
                } else {
                    backoff.next()
                };
                error!(device = %device, error = %err, retry_in = ?delay, "failed to connect, will retry");
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = done.changed() => {
                        debug!(device = %device, "collector closed during backoff");
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// 更新任务：通知 -> 评估器 -> 告警引擎
///
/// 同一 (设备, 接口) 的事件顺序与通知到达顺序一致。
async fn update_loop(
    device: String,
    mut updates: mpsc::Receiver<Notification>,
    mut done: watch::Receiver<bool>,
    evaluator: Arc<Evaluator>,
    engine: EngineHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = done.changed() => return,
            notification = updates.recv() => {
                let Some(notification) = notification else { return };
                for event in evaluator.evaluate(&device, &notification) {
                    engine.submit(event);
                }
            }
        }
    }
}
