//! Workflow model - directed graph of typed trigger/action nodes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a node plays in the graph. Trigger nodes start invocations and never
/// run an action; action nodes resolve to a handler in the action registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Trigger,
    Action,
}

/// A workflow - the top-level automation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub owner: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(owner: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            owner,
            active: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Descriptor for one typed input/output field a node declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    pub name: String,
    pub data_type: String,
    pub is_output: bool,
}

/// Static description of a node's shape: its name, role, category (which
/// selects a handler at execution time), and the input/output fields it
/// declares. Config metadata is descriptive only - the executor does not
/// validate `custom_config` against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    pub node_type: NodeType,
    /// Selects the handler in the action or trigger-handler registry
    /// (e.g. "scheduler", "webhook-bot", "send_email").
    pub category: String,
    pub config_metadata: Vec<ConfigField>,
}

/// One node placed in a workflow's graph, with its concrete per-instance
/// configuration. `custom_config` values are either literal JSON or a
/// `{{ dotted.path }}` template string resolved against the execution
/// context at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: i64,
    pub workflow_id: i64,
    pub definition: NodeDefinition,
    pub custom_config: serde_json::Value,
}

impl WorkflowNode {
    /// Case-insensitive check against the trigger fast-path categories
    /// honored by the executor (spec §4.4 step 3).
    pub fn is_trigger_fast_path(&self) -> bool {
        matches!(self.definition.node_type, NodeType::Trigger)
            || matches!(
                self.definition.category.to_lowercase().as_str(),
                "trigger" | "scheduler" | "webhook"
            )
    }
}

/// A directed edge between two nodes in the same workflow. `condition`, when
/// present, gates whether the executor submits the target once the source
/// has produced a result (forwarded only when `condition == result.status`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConnection {
    pub workflow_id: i64,
    pub from_node: i64,
    pub to_node: i64,
    pub condition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_fast_path_is_case_insensitive() {
        let node = WorkflowNode {
            id: 1,
            workflow_id: 1,
            definition: NodeDefinition {
                name: "Webhook".into(),
                node_type: NodeType::Action,
                category: "WebHook".into(),
                config_metadata: vec![],
            },
            custom_config: serde_json::json!({}),
        };
        assert!(node.is_trigger_fast_path());
    }

    #[test]
    fn action_node_is_not_trigger_fast_path() {
        let node = WorkflowNode {
            id: 1,
            workflow_id: 1,
            definition: NodeDefinition {
                name: "Send email".into(),
                node_type: NodeType::Action,
                category: "send_email".into(),
                config_metadata: vec![],
            },
            custom_config: serde_json::json!({}),
        };
        assert!(!node.is_trigger_fast_path());
    }
}
