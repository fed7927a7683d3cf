//! Trigger record model - the trigger stream's entry shape

use serde::{Deserialize, Serialize};

/// One entry on the `workflow_triggers` stream: a pending invocation,
/// identified once appended by a stream-assigned monotonic id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub workflow_id: i64,
    pub context: serde_json::Value,
}

impl TriggerRecord {
    pub fn new(workflow_id: i64, context: serde_json::Value) -> Self {
        Self { workflow_id, context }
    }
}
