//! Scheduler/dispatcher errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("node engine error: {0}")]
    NodeEngine(#[from] core_node_engine::NodeEngineError),

    #[error("no trigger handler registered for category: {0}")]
    UnknownTriggerCategory(String),

    #[error("webhook install/remove failed: {0}")]
    Webhook(#[from] core_integrations::webhook::WebhookInstallError),
}
