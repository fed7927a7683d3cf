//! Trigger handler registry - one `TriggerHandler` per trigger node
//! category, dispatched by `node_category` out of a lifecycle event's
//! `EventNode` (spec §4.6).
//!
//! Mirrors `core_node_engine::registry::ActionRegistry` in shape: a
//! string-keyed map of boxed trait objects, built once at startup via
//! `with_builtins`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use core_models::{EventNode, Schedule};
use core_node_engine::CredentialDecryptor;
use core_integrations::WebhookHandler;
use chrono::Utc;

use crate::error::SchedulerError;
use crate::store::ScheduleStore;

#[async_trait]
pub trait TriggerHandler: Send + Sync {
    /// A workflow carrying this trigger node was activated, or an already
    /// active workflow's trigger node configuration changed.
    async fn handle(&self, workflow_id: i64, node: &EventNode) -> Result<(), SchedulerError>;

    /// The workflow was deactivated; tear down whatever `handle` set up.
    async fn cleanup(&self, workflow_id: i64, node: &EventNode) -> Result<(), SchedulerError>;
}

/// String-keyed lookup from `node_category` to its handler, following
/// `ActionRegistry`'s `with_builtins` construction pattern.
#[derive(Default)]
pub struct TriggerHandlerRegistry {
    handlers: HashMap<String, Arc<dyn TriggerHandler>>,
}

impl TriggerHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, category: impl Into<String>, handler: Arc<dyn TriggerHandler>) {
        self.handlers.insert(category.into(), handler);
    }

    pub fn get(&self, category: &str) -> Result<Arc<dyn TriggerHandler>, SchedulerError> {
        self.handlers
            .get(category)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownTriggerCategory(category.to_string()))
    }
}

/// `"scheduler"` category: registers/updates a `Schedule` in the
/// `ScheduleStore` from the node's `custom_config` (spec §4.2, §4.6).
pub struct SchedulerTriggerHandler {
    store: Arc<dyn ScheduleStore>,
}

impl SchedulerTriggerHandler {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TriggerHandler for SchedulerTriggerHandler {
    async fn handle(&self, workflow_id: i64, node: &EventNode) -> Result<(), SchedulerError> {
        let schedule = Schedule::from_node_config(workflow_id, &node.custom_config, Utc::now());
        self.store.upsert(schedule).await
    }

    async fn cleanup(&self, workflow_id: i64, _node: &EventNode) -> Result<(), SchedulerError> {
        self.store.remove_by_workflow(workflow_id).await
    }
}

/// `"webhook-bot"` category: installs/removes a remote webhook
/// subscription pointed back at this service's public callback URL
/// (spec §4.6, §9). The bot token is stored encrypted in
/// `custom_config.credential` and decrypted through the same
/// `CredentialDecryptor` seam the DAG executor uses for node
/// credentials.
pub struct WebhookBotTriggerHandler {
    webhook: Arc<dyn WebhookHandler>,
    decryptor: Arc<dyn CredentialDecryptor>,
    public_base_url: String,
}

impl WebhookBotTriggerHandler {
    pub fn new(
        webhook: Arc<dyn WebhookHandler>,
        decryptor: Arc<dyn CredentialDecryptor>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            webhook,
            decryptor,
            public_base_url: public_base_url.into(),
        }
    }

    fn token(&self, node: &EventNode) -> Result<String, SchedulerError> {
        let ciphertext = node
            .custom_config
            .get("credential")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        self.decryptor
            .decrypt(ciphertext)
            .map_err(|e| SchedulerError::Webhook(core_integrations::webhook::WebhookInstallError::Rejected(
                format!("credential decryption failed: {e}"),
            )))
    }

    fn callback_url(&self, workflow_id: i64, node: &EventNode) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            workflow_id,
            node.node_id
        )
    }
}

#[async_trait]
impl TriggerHandler for WebhookBotTriggerHandler {
    async fn handle(&self, workflow_id: i64, node: &EventNode) -> Result<(), SchedulerError> {
        let token = self.token(node)?;
        let callback_url = self.callback_url(workflow_id, node);
        self.webhook.install(&token, &callback_url).await?;
        Ok(())
    }

    async fn cleanup(&self, _workflow_id: i64, node: &EventNode) -> Result<(), SchedulerError> {
        let token = self.token(node)?;
        self.webhook.remove(&token).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryScheduleStore;
    use core_models::NodeType;

    fn scheduler_node(interval: i64) -> EventNode {
        EventNode {
            node_id: 1,
            node_type: NodeType::Trigger,
            node_category: "scheduler".to_string(),
            custom_config: serde_json::json!({"interval_seconds": interval}),
        }
    }

    #[tokio::test]
    async fn scheduler_handler_registers_a_schedule() {
        let store: Arc<dyn ScheduleStore> = Arc::new(InMemoryScheduleStore::new());
        let handler = SchedulerTriggerHandler::new(store.clone());

        handler.handle(10, &scheduler_node(30)).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);

        handler.cleanup(10, &scheduler_node(30)).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[test]
    fn registry_reports_unknown_categories() {
        let registry = TriggerHandlerRegistry::new();
        let err = registry.get("smtp").unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownTriggerCategory(_)));
    }
}
