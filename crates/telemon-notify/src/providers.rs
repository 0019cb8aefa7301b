use crate::message::{NotifyLevel, NotifyMessage};
use crate::notifier::{Notifier, NotifyResult};
use anyhow::Result;
use async_trait::async_trait;
use std::env;
use std::time::Duration;
use tracing::info;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// 通用 Webhook 通知
// ============================================================================

/// 向目标 URL POST 消息 JSON；URL 从环境变量解析，发送时才读取
pub struct WebhookNotifier {
    url_env: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url_env: impl Into<String>) -> Self {
        Self {
            url_env: url_env.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let Ok(url) = env::var(&self.url_env) else {
            return Ok(NotifyResult::failure(format!(
                "channel URL env {} not set",
                self.url_env
            )));
        };

        let response = self
            .client
            .post(&url)
            .timeout(SEND_TIMEOUT)
            .json(message)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "webhook failed with status: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

// ============================================================================
// Slack 通知
// ============================================================================

pub struct SlackNotifier {
    url_env: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(url_env: impl Into<String>) -> Self {
        Self {
            url_env: url_env.into(),
            client: reqwest::Client::new(),
        }
    }

    fn build_payload(&self, message: &NotifyMessage) -> serde_json::Value {
        let color = match message.level {
            NotifyLevel::Info => "good",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Critical => "danger",
        };

        serde_json::json!({
            "attachments": [{
                "color": color,
                "title": message.title,
                "text": message.content,
                "fields": [
                    {
                        "title": "Level",
                        "value": format!("{:?}", message.level),
                        "short": true
                    },
                    {
                        "title": "Time",
                        "value": message.timestamp.to_rfc3339(),
                        "short": true
                    }
                ]
            }]
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let Ok(url) = env::var(&self.url_env) else {
            return Ok(NotifyResult::failure(format!(
                "channel URL env {} not set",
                self.url_env
            )));
        };

        let response = self
            .client
            .post(&url)
            .timeout(SEND_TIMEOUT)
            .json(&self.build_payload(message))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Slack failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "slack"
    }
}

// ============================================================================
// Apprise 网关通知
// ============================================================================

/// 经 Apprise API 网关投递：POST {api}/notify/{service}
///
/// APPRISE_API_URL 未配置时降级为记录日志，方便没有网关的部署先跑起来。
pub struct AppriseNotifier {
    service_env: String,
    client: reqwest::Client,
}

impl AppriseNotifier {
    pub const API_URL_ENV: &'static str = "APPRISE_API_URL";

    pub fn new(service_env: impl Into<String>) -> Self {
        Self {
            service_env: service_env.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for AppriseNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let Ok(service) = env::var(&self.service_env) else {
            return Ok(NotifyResult::failure(format!(
                "channel URL env {} not set",
                self.service_env
            )));
        };

        let payload = serde_json::json!({
            "title": message.title,
            "body": message.content,
            "format": "text",
        });

        let Ok(api_url) = env::var(Self::API_URL_ENV) else {
            info!(service = %service, "APPRISE_API_URL not configured, skipping delivery");
            return Ok(NotifyResult::success());
        };

        let response = self
            .client
            .post(format!("{}/notify/{}", api_url.trim_end_matches('/'), service))
            .timeout(SEND_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Ok(NotifyResult::failure(format!(
                "Apprise API error: {} - {}",
                status, body
            )))
        }
    }

    fn name(&self) -> &str {
        "apprise"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_webhook_missing_env_is_soft_failure() {
        let notifier = WebhookNotifier::new("TELEMON_TEST_UNSET_WEBHOOK_URL");
        let message = NotifyMessage::new("t", "c", NotifyLevel::Info);
        let result = notifier.send(&message).await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("not set"));
    }

    #[test]
    fn test_slack_payload_color() {
        let notifier = SlackNotifier::new("X");
        let message = NotifyMessage::new("t", "c", NotifyLevel::Critical);
        let payload = notifier.build_payload(&message);
        assert_eq!(payload["attachments"][0]["color"], "danger");
    }
}
