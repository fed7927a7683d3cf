//! Control-plane lifecycle events - published whenever CRUD effects change
//! a workflow's activation state or a trigger node's configuration.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One trigger-typed node's shape, as carried in a lifecycle event payload.
/// Restricted to trigger-typed nodes only - action nodes never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventNode {
    pub node_id: i64,
    pub node_type: crate::NodeType,
    pub node_category: String,
    pub custom_config: serde_json::Value,
}

/// Payload shared by `WORKFLOW_ACTIVATED`, `WORKFLOW_UPDATED`, and
/// `WORKFLOW_DEACTIVATED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNodesPayload {
    pub workflow_id: i64,
    pub nodes: Vec<EventNode>,
}

/// Payload for `WORKFLOW_DELETED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowIdPayload {
    pub workflow_id: i64,
}

/// A control-plane lifecycle event, published on the `workflow_events`
/// pub/sub topic whenever a workflow's activation state changes or an
/// active workflow's trigger node configuration changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkflowEvent {
    #[serde(rename = "WORKFLOW_ACTIVATED")]
    Activated { payload: WorkflowNodesPayload },
    #[serde(rename = "WORKFLOW_DEACTIVATED")]
    Deactivated { payload: WorkflowNodesPayload },
    #[serde(rename = "WORKFLOW_UPDATED")]
    Updated { payload: WorkflowNodesPayload },
    #[serde(rename = "WORKFLOW_DELETED")]
    Deleted { payload: WorkflowIdPayload },
}

impl WorkflowEvent {
    pub fn workflow_id(&self) -> i64 {
        match self {
            WorkflowEvent::Activated { payload }
            | WorkflowEvent::Deactivated { payload }
            | WorkflowEvent::Updated { payload } => payload.workflow_id,
            WorkflowEvent::Deleted { payload } => payload.workflow_id,
        }
    }

    /// The wire envelope `{type, timestamp, payload}` published on
    /// `workflow_events` (spec §6).
    pub fn envelope(&self) -> serde_json::Value {
        let (type_str, payload) = match self {
            WorkflowEvent::Activated { payload } => {
                ("WORKFLOW_ACTIVATED", serde_json::to_value(payload))
            }
            WorkflowEvent::Deactivated { payload } => {
                ("WORKFLOW_DEACTIVATED", serde_json::to_value(payload))
            }
            WorkflowEvent::Updated { payload } => {
                ("WORKFLOW_UPDATED", serde_json::to_value(payload))
            }
            WorkflowEvent::Deleted { payload } => {
                ("WORKFLOW_DELETED", serde_json::to_value(payload))
            }
        };

        serde_json::json!({
            "type": type_str,
            "timestamp": Utc::now().to_rfc3339(),
            "payload": payload.unwrap_or(serde_json::Value::Null),
        })
    }
}

/// Parse a `{type, timestamp, payload}` envelope back into a `WorkflowEvent`.
/// Returns `None` on an unrecognized `type` or malformed payload - callers
/// log and drop per the "bad event payload" policy (spec §7).
pub fn parse_envelope(raw: &serde_json::Value) -> Option<WorkflowEvent> {
    let event_type = raw.get("type")?.as_str()?;
    let payload = raw.get("payload")?.clone();

    match event_type {
        "WORKFLOW_ACTIVATED" => Some(WorkflowEvent::Activated {
            payload: serde_json::from_value(payload).ok()?,
        }),
        "WORKFLOW_DEACTIVATED" => Some(WorkflowEvent::Deactivated {
            payload: serde_json::from_value(payload).ok()?,
        }),
        "WORKFLOW_UPDATED" => Some(WorkflowEvent::Updated {
            payload: serde_json::from_value(payload).ok()?,
        }),
        "WORKFLOW_DELETED" => Some(WorkflowEvent::Deleted {
            payload: serde_json::from_value(payload).ok()?,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node() -> EventNode {
        EventNode {
            node_id: 1,
            node_type: crate::NodeType::Trigger,
            node_category: "scheduler".to_string(),
            custom_config: serde_json::json!({"interval_seconds": 5}),
        }
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let event = WorkflowEvent::Activated {
            payload: WorkflowNodesPayload {
                workflow_id: 42,
                nodes: vec![sample_node()],
            },
        };

        let envelope = event.envelope();
        assert_eq!(envelope["type"], "WORKFLOW_ACTIVATED");

        let parsed = parse_envelope(&envelope).expect("envelope parses");
        assert_eq!(parsed.workflow_id(), 42);
        assert!(matches!(parsed, WorkflowEvent::Activated { .. }));
    }

    #[test]
    fn unknown_type_is_dropped_not_panicked() {
        let raw = serde_json::json!({"type": "WORKFLOW_RENAMED", "payload": {}});
        assert!(parse_envelope(&raw).is_none());
    }

    #[test]
    fn deleted_payload_has_no_nodes() {
        let event = WorkflowEvent::Deleted {
            payload: WorkflowIdPayload { workflow_id: 7 },
        };
        assert_eq!(event.workflow_id(), 7);
        assert_eq!(event.envelope()["payload"]["workflow_id"], 7);
    }
}
