//! Node engine errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeEngineError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(i64),

    #[error("node not found: {0}")]
    NodeNotFound(i64),

    #[error("node execution failed: {node_id} - {message}")]
    NodeExecutionFailed { node_id: i64, message: String },

    #[error("no handler registered for category: {0}")]
    UnknownCategory(String),

    #[error("no trigger handler registered for category: {0}")]
    UnknownTriggerCategory(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
