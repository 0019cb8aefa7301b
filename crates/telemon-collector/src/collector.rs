use crate::health::DeviceHealth;
use crate::tls::TlsOptions;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use telemon_gnmi::proto::{
    subscribe_request, subscribe_response, CapabilityRequest, Encoding, Notification, Path,
    PathElem, SubscribeRequest, SubscribeResponse, Subscription, SubscriptionList,
    SubscriptionListMode, SubscriptionMode,
};
use telemon_gnmi::{path_to_string, typed_value_to_string, GnmiClient};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::Streaming;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;
use tracing::{debug, info, warn};

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
const UPDATES_BUFFER: usize = 256;
const ERRORS_BUFFER: usize = 4;

/// 采集器错误
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("dial failed: {0}")]
    DialFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("subscribe rejected: {0}")]
    SubscribeFailed(String),

    #[error("collector closed during setup")]
    ClosedDuringSetup,

    #[error("stream lost: {0}")]
    StreamLost(String),
}

/// 采集器配置
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub tls: Option<TlsOptions>,
    pub sample_interval: Duration,
}

/// Capabilities 探测结果
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitiesSummary {
    pub model_count: usize,
    pub gnmi_version: String,
}

/// 采集器的出站流，只能取走一次
pub struct CollectorStreams {
    pub updates: mpsc::Receiver<Notification>,
    pub errors: mpsc::Receiver<CollectorError>,
}

struct Session {
    /// 持有发送端让双向流保持打开
    _request_tx: mpsc::Sender<SubscribeRequest>,
    recv_task: JoinHandle<()>,
}

/// 一台设备的 gNMI 流式采集会话
///
/// connect() 只做单次尝试并分类失败原因；重连由监督器驱动。
/// 出站通知通道有界（256），满时丢弃最新一条并计数，
/// 避免慢消费方把 gRPC 接收循环顶住。
pub struct Collector {
    cfg: CollectorConfig,
    dial_timeout: Duration,
    updates_tx: mpsc::Sender<Notification>,
    errors_tx: mpsc::Sender<CollectorError>,
    streams: StdMutex<Option<CollectorStreams>>,
    done_tx: watch::Sender<bool>,
    health: Arc<RwLock<DeviceHealth>>,
    session: Mutex<Option<Session>>,
}

impl Collector {
    pub fn new(cfg: CollectorConfig) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel(UPDATES_BUFFER);
        let (errors_tx, errors_rx) = mpsc::channel(ERRORS_BUFFER);
        let (done_tx, _) = watch::channel(false);

        Self {
            cfg,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            updates_tx,
            errors_tx,
            streams: StdMutex::new(Some(CollectorStreams {
                updates: updates_rx,
                errors: errors_rx,
            })),
            done_tx,
            health: Arc::new(RwLock::new(DeviceHealth::default())),
            session: Mutex::new(None),
        }
    }

    /// 取走通知流与错误流（只能一次）
    pub fn take_streams(&self) -> Option<CollectorStreams> {
        self.streams.lock().expect("streams lock poisoned").take()
    }

    /// close() 时关闭的取消信号
    pub fn done(&self) -> watch::Receiver<bool> {
        self.done_tx.subscribe()
    }

    /// 当前健康记录快照
    pub async fn health(&self) -> DeviceHealth {
        self.health.read().await.clone()
    }

    /// 单次建立连接：拨号、下发订阅、启动接收循环
    ///
    /// 成功当且仅当传输建立、订阅被接受且接收循环已经启动。
    pub async fn connect(&self) -> Result<(), CollectorError> {
        if *self.done_tx.borrow() {
            return Err(CollectorError::ClosedDuringSetup);
        }

        // 先拆掉旧会话，避免在设备上积累陈旧的 gRPC 订阅
        self.teardown_session().await;

        let addr = format!("{}:{}", self.cfg.address, self.cfg.port);
        info!(address = %addr, "connecting to gNMI device");

        let result = self.connect_once().await;
        match result {
            Ok(()) => {
                let mut health = self.health.write().await;
                health.connected = true;
                health.last_error.clear();
                health.sync_received = false;
                health.connected_since = Some(Utc::now());
                info!(address = %addr, "gNMI subscription established");
                Ok(())
            }
            Err(err) => {
                let mut health = self.health.write().await;
                health.connected = false;
                health.last_error = err.to_string();
                health.reconnect_count = health.reconnect_count.saturating_add(1);
                Err(err)
            }
        }
    }

    async fn connect_once(&self) -> Result<(), CollectorError> {
        let channel = self.dial().await?;

        if *self.done_tx.borrow() {
            return Err(CollectorError::ClosedDuringSetup);
        }

        let mut client = GnmiClient::with_interceptor(channel, self.auth_interceptor()?);

        let (request_tx, request_rx) = mpsc::channel(4);
        request_tx
            .send(subscription_request(self.cfg.sample_interval))
            .await
            .map_err(|_| CollectorError::ClosedDuringSetup)?;

        let response = client
            .subscribe(ReceiverStream::new(request_rx))
            .await
            .map_err(classify_status)?;

        let inbound = response.into_inner();
        let recv_task = tokio::spawn(receive_loop(
            inbound,
            self.updates_tx.clone(),
            self.errors_tx.clone(),
            self.health.clone(),
            self.done_tx.subscribe(),
        ));

        let mut session = self.session.lock().await;
        *session = Some(Session {
            _request_tx: request_tx,
            recv_task,
        });
        Ok(())
    }

    async fn dial(&self) -> Result<Channel, CollectorError> {
        let use_tls = self.cfg.tls.as_ref().map(|t| t.enabled).unwrap_or(false);
        let scheme = if use_tls { "https" } else { "http" };
        let uri = format!("{}://{}:{}", scheme, self.cfg.address, self.cfg.port);

        let mut endpoint = Endpoint::from_shared(uri)
            .map_err(|e| CollectorError::DialFailed(e.to_string()))?
            .connect_timeout(self.dial_timeout)
            .tcp_nodelay(true);

        if use_tls {
            let tls = self
                .cfg
                .tls
                .as_ref()
                .expect("tls options present when use_tls")
                .client_config()
                .map_err(|e| CollectorError::DialFailed(e.to_string()))?;
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| CollectorError::DialFailed(e.to_string()))?;
        }

        endpoint
            .connect()
            .await
            .map_err(|e| CollectorError::DialFailed(e.to_string()))
    }

    fn auth_interceptor(&self) -> Result<BasicAuth, CollectorError> {
        BasicAuth::new(&self.cfg.username, &self.cfg.password)
    }

    /// 一次性的 Capabilities 探测，不碰订阅会话
    pub async fn test_connection(&self) -> Result<CapabilitiesSummary, CollectorError> {
        let channel = self.dial().await?;
        let mut client = GnmiClient::with_interceptor(channel, self.auth_interceptor()?);

        let response = tokio::time::timeout(self.dial_timeout, client.capabilities(CapabilityRequest {}))
            .await
            .map_err(|_| CollectorError::DialFailed("capabilities request timed out".to_string()))?
            .map_err(classify_status)?;

        let caps = response.into_inner();
        let summary = CapabilitiesSummary {
            model_count: caps.supported_models.len(),
            gnmi_version: caps.gnmi_version,
        };
        info!(
            models = summary.model_count,
            gnmi_version = %summary.gnmi_version,
            "connection test successful"
        );
        Ok(summary)
    }

    /// 幂等关闭：撤销接收循环、拆传输、关闭 done 信号
    pub async fn close(&self) {
        self.done_tx.send_replace(true);
        self.teardown_session().await;

        let mut health = self.health.write().await;
        health.connected = false;
    }

    async fn teardown_session(&self) {
        let mut session = self.session.lock().await;
        if let Some(session) = session.take() {
            session.recv_task.abort();
            let _ = session.recv_task.await;
        }
    }
}

/// 固定的订阅内容：interfaces/interface[name=*]/state，
/// STREAM / SAMPLE。目标设备不支持 ON_CHANGE 与 updates_only，
/// 无关叶子的过滤放在评估器里做。
fn subscription_request(sample_interval: Duration) -> SubscribeRequest {
    let mut key = HashMap::new();
    key.insert("name".to_string(), "*".to_string());

    let path = Path {
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
    };

    SubscribeRequest {
        request: Some(subscribe_request::Request::Subscribe(SubscriptionList {
            prefix: None,
            subscription: vec![Subscription {
                path: Some(path),
                mode: SubscriptionMode::Sample as i32,
                sample_interval: sample_interval.as_nanos() as u64,
                suppress_redundant: false,
                heartbeat_interval: 0,
            }],
            mode: SubscriptionListMode::Stream as i32,
            allow_aggregation: false,
            encoding: Encoding::Json as i32,
            updates_only: false,
        })),
    }
}

fn classify_status(status: tonic::Status) -> CollectorError {
    match status.code() {
        Code::Unauthenticated | Code::PermissionDenied => {
            CollectorError::AuthFailed(status.message().to_string())
        }
        _ => CollectorError::SubscribeFailed(status.to_string()),
    }
}

async fn receive_loop(
    mut inbound: Streaming<SubscribeResponse>,
    updates_tx: mpsc::Sender<Notification>,
    errors_tx: mpsc::Sender<CollectorError>,
    health: Arc<RwLock<DeviceHealth>>,
    mut done: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = done.changed() => {
                if changed.is_err() || *done.borrow() {
                    return;
                }
            }
            message = inbound.message() => {
                match message {
                    Ok(Some(response)) => match response.response {
                        Some(subscribe_response::Response::Update(notification)) => {
                            handle_notification(notification, &updates_tx, &health).await;
                        }
                        Some(subscribe_response::Response::SyncResponse(_)) => {
                            info!("gNMI subscription sync complete, stream is active");
                            let mut health = health.write().await;
                            health.sync_received = true;
                            health.last_update = Some(Utc::now());
                        }
                        Some(subscribe_response::Response::Error(err)) => {
                            emit_error(
                                &errors_tx,
                                CollectorError::StreamLost(format!(
                                    "subscribe error {}: {}",
                                    err.code, err.message
                                )),
                            );
                            mark_disconnected(&health).await;
                            return;
                        }
                        None => {}
                    },
                    Ok(None) => {
                        emit_error(
                            &errors_tx,
                            CollectorError::StreamLost("stream closed by peer".to_string()),
                        );
                        mark_disconnected(&health).await;
                        return;
                    }
                    Err(status) => {
                        emit_error(&errors_tx, CollectorError::StreamLost(status.to_string()));
                        mark_disconnected(&health).await;
                        return;
                    }
                }
            }
        }
    }
}

async fn handle_notification(
    notification: Notification,
    updates_tx: &mpsc::Sender<Notification>,
    health: &Arc<RwLock<DeviceHealth>>,
) {
    let timestamp = if notification.timestamp == 0 {
        Utc::now()
    } else {
        DateTime::from_timestamp_nanos(notification.timestamp)
    };

    let mut last_path = String::new();
    let mut last_value = String::new();
    for update in &notification.update {
        let mut full_path = notification
            .prefix
            .as_ref()
            .map(path_to_string)
            .unwrap_or_default();
        if let Some(path) = &update.path {
            full_path.push_str(&path_to_string(path));
        }
        let value = update
            .val
            .as_ref()
            .map(typed_value_to_string)
            .unwrap_or_default();

        debug!(path = %full_path, value = %value, "gNMI update received");
        last_path = full_path;
        last_value = value;
    }

    {
        let mut health = health.write().await;
        health.last_update = Some(timestamp);
        health.update_count = health.update_count.saturating_add(1);
        if !last_path.is_empty() {
            health.last_path = last_path;
            health.last_value = last_value;
        }
    }

    if let Err(mpsc::error::TrySendError::Full(_)) = updates_tx.try_send(notification) {
        warn!("update channel full, dropping notification");
        let mut health = health.write().await;
        health.dropped_updates = health.dropped_updates.saturating_add(1);
    }
}

fn emit_error(errors_tx: &mpsc::Sender<CollectorError>, err: CollectorError) {
    // 错误通道满就丢弃，监督器只需要知道会话没了
    let _ = errors_tx.try_send(err);
}

async fn mark_disconnected(health: &Arc<RwLock<DeviceHealth>>) {
    let mut health = health.write().await;
    health.connected = false;
}

/// 每次 RPC 附带 Basic 认证元数据；明文传输时同样附带，
/// 这是运维方明确接受的取舍。
#[derive(Clone)]
pub struct BasicAuth {
    header: Option<MetadataValue<Ascii>>,
}

impl BasicAuth {
    fn new(username: &str, password: &str) -> Result<Self, CollectorError> {
        if username.is_empty() && password.is_empty() {
            return Ok(Self { header: None });
        }
        let encoded = BASE64.encode(format!("{}:{}", username, password));
        let header = MetadataValue::try_from(format!("Basic {}", encoded))
            .map_err(|e| CollectorError::DialFailed(format!("invalid auth metadata: {e}")))?;
        Ok(Self {
            header: Some(header),
        })
    }
}

impl tonic::service::Interceptor for BasicAuth {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, tonic::Status> {
        if let Some(header) = &self.header {
            request.metadata_mut().insert("authorization", header.clone());
        }
        Ok(request)
    }
}

// 让带拦截器的客户端类型在签名里可读一些
pub type AuthedGnmiClient = GnmiClient<InterceptedService<Channel, BasicAuth>>;
