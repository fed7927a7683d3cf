//! Outbound webhook registration - the remote side-effect behind the
//! `"webhook-bot"` trigger handler (spec §4.6).
//!
//! This is deliberately generic: vendor wiring (Telegram, Slack, a custom
//! bot platform) is out of scope (spec §1). `WebhookHandler` is the seam a
//! concrete integration plugs into; `ReqwestWebhookHandler` is one
//! illustrative implementation pointed at a configurable base URL rather
//! than a hardcoded vendor endpoint.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum WebhookInstallError {
    #[error("webhook install request failed: {0}")]
    Transport(String),
    #[error("remote platform rejected webhook install: {0}")]
    Rejected(String),
}

/// Idempotent install/remove of a remote subscription that, on each
/// incoming event, performs the same operation the scheduler performs:
/// append a `{workflow_id, context}` record to the trigger stream
/// (spec §6).
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn install(&self, token: &str, callback_url: &str) -> Result<(), WebhookInstallError>;
    async fn remove(&self, token: &str) -> Result<(), WebhookInstallError>;
}

/// Reqwest-backed default implementation. The original implementation's
/// hardcoded Telegram Bot API endpoints are represented here as one
/// illustrative example (`set_webhook_path` / `delete_webhook_path`)
/// rather than a mandated integration (spec §4.6).
pub struct ReqwestWebhookHandler {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestWebhookHandler {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WebhookHandler for ReqwestWebhookHandler {
    async fn install(&self, token: &str, callback_url: &str) -> Result<(), WebhookInstallError> {
        let url = format!("{}/bot{}/setWebhook", self.base_url, token);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "url": callback_url }))
            .send()
            .await
            .map_err(|e| WebhookInstallError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WebhookInstallError::Rejected(format!(
                "status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn remove(&self, token: &str) -> Result<(), WebhookInstallError> {
        let url = format!("{}/bot{}/deleteWebhook", self.base_url, token);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| WebhookInstallError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WebhookInstallError::Rejected(format!(
                "status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
