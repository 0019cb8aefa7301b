use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use telemon_alerter::AlertEngine;
use telemon_api::{ApiState, LogBuffer, LogBufferLayer, StatusSource};
use telemon_config::ConfigLoader;
use telemon_notify::NotifyRouter;
use telemon_server::{ServerStatus, Supervisor};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_BUFFER_CAPACITY: usize = 1000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Declarative network-state monitor")]
struct Args {
    /// 配置目录（desired-state.toml / alerts.toml / credentials.toml）
    #[arg(short, long, default_value = "/config")]
    config_dir: String,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 状态 API 端口（TELEMON_API_PORT 可覆盖）
    #[arg(long, default_value_t = 8088)]
    api_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_buffer = Arc::new(LogBuffer::new(LOG_BUFFER_CAPACITY));
    let filter =
        EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(LogBufferLayer::new(log_buffer.clone()))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting telemon");

    // 启动期配置错误直接退出；之后的重载失败只保持旧配置
    let config = Arc::new(
        ConfigLoader::new(&args.config_dir)
            .load()
            .context("failed to load configuration")?,
    );
    info!(device_count = config.devices.len(), "configuration loaded");

    let default_username =
        std::env::var("GNMI_USERNAME").unwrap_or_else(|_| "gnmi-monitor".to_string());
    let default_password = std::env::var("GNMI_PASSWORD")
        .context("GNMI_PASSWORD environment variable is required")?;

    let router = Arc::new(NotifyRouter::from_config(&config.alerts));
    let (engine, engine_handle) = AlertEngine::new(&config.alerts.behavior, router);
    let engine_task = engine.start();

    let supervisor = Arc::new(Supervisor::new(
        PathBuf::from(&args.config_dir),
        config,
        engine_handle,
        default_username,
        default_password,
    ));
    supervisor.start_all().await;

    // 只读状态 API
    let status: Arc<dyn StatusSource> = Arc::new(ServerStatus::new(supervisor.clone()));
    let api_state = ApiState::new(status, log_buffer);
    let api_port = std::env::var("TELEMON_API_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(args.api_port);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", api_port))
        .await
        .with_context(|| format!("failed to bind status API port {api_port}"))?;
    info!(port = api_port, "status API listening");
    let api_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, telemon_api::router(api_state)).await {
            error!(error = %e, "status API server error");
        }
    });

    info!("telemon running, press Ctrl+C to stop");
    wait_for_signal().await;

    info!("shutting down");
    supervisor.shutdown().await;
    engine_task.shutdown().await;
    api_task.abort();
    info!("telemon stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");
    info!("received Ctrl+C");
}
