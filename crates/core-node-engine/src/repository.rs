//! Narrow repository interface the core depends on instead of issuing SQL
//! directly (spec §6, §3.1). A Postgres-backed implementation follows the
//! teacher's `*_from_row` row-decoding convention; an in-memory
//! implementation backs tests and the example binaries.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use core_models::{NodeDefinition, NodeType, Workflow, WorkflowConnection, WorkflowNode};

use crate::error::NodeEngineError;

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn get_workflow(&self, workflow_id: i64) -> Result<Workflow, NodeEngineError>;
    async fn list_nodes(&self, workflow_id: i64) -> Result<Vec<WorkflowNode>, NodeEngineError>;
    async fn list_nodes_by_type(
        &self,
        workflow_id: i64,
        node_type: NodeType,
    ) -> Result<Vec<WorkflowNode>, NodeEngineError>;
    async fn list_connections(
        &self,
        workflow_id: i64,
    ) -> Result<Vec<WorkflowConnection>, NodeEngineError>;
}

/// `HashMap`-backed store behind an `RwLock`, used by tests and the example
/// binaries since the core crate cannot assume a live Postgres instance is
/// available in this implementation's own test run (spec §3.1).
#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<HashMap<i64, Workflow>>,
    nodes: RwLock<HashMap<i64, Vec<WorkflowNode>>>,
    connections: RwLock<HashMap<i64, Vec<WorkflowConnection>>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_workflow(&self, workflow: Workflow) {
        self.workflows
            .write()
            .expect("workflow map poisoned")
            .insert(workflow.id, workflow);
    }

    pub fn insert_nodes(&self, workflow_id: i64, nodes: Vec<WorkflowNode>) {
        self.nodes
            .write()
            .expect("node map poisoned")
            .insert(workflow_id, nodes);
    }

    pub fn insert_connections(&self, workflow_id: i64, connections: Vec<WorkflowConnection>) {
        self.connections
            .write()
            .expect("connection map poisoned")
            .insert(workflow_id, connections);
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn get_workflow(&self, workflow_id: i64) -> Result<Workflow, NodeEngineError> {
        self.workflows
            .read()
            .expect("workflow map poisoned")
            .get(&workflow_id)
            .cloned()
            .ok_or(NodeEngineError::WorkflowNotFound(workflow_id))
    }

    async fn list_nodes(&self, workflow_id: i64) -> Result<Vec<WorkflowNode>, NodeEngineError> {
        Ok(self
            .nodes
            .read()
            .expect("node map poisoned")
            .get(&workflow_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_nodes_by_type(
        &self,
        workflow_id: i64,
        node_type: NodeType,
    ) -> Result<Vec<WorkflowNode>, NodeEngineError> {
        Ok(self
            .list_nodes(workflow_id)
            .await?
            .into_iter()
            .filter(|n| n.definition.node_type == node_type)
            .collect())
    }

    async fn list_connections(
        &self,
        workflow_id: i64,
    ) -> Result<Vec<WorkflowConnection>, NodeEngineError> {
        Ok(self
            .connections
            .read()
            .expect("connection map poisoned")
            .get(&workflow_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Postgres-backed implementation querying `workflows`, `workflow_nodes`
/// (joined to `node_definitions`), and `workflow_connections` (spec §6).
pub struct PgWorkflowRepository {
    pool: sqlx::PgPool,
}

impl PgWorkflowRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowRepository for PgWorkflowRepository {
    async fn get_workflow(&self, workflow_id: i64) -> Result<Workflow, NodeEngineError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, active, created_at, updated_at
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(NodeEngineError::WorkflowNotFound(workflow_id))?;

        workflow_from_row(&row)
    }

    async fn list_nodes(&self, workflow_id: i64) -> Result<Vec<WorkflowNode>, NodeEngineError> {
        let rows = sqlx::query(
            r#"
            SELECT
                wn.id, wn.workflow_id, wn.custom_config,
                nd.name, nd.node_type, nd.category, nd.config_metadata
            FROM workflow_nodes wn
            JOIN node_definitions nd ON nd.id = wn.node_definition_id
            WHERE wn.workflow_id = $1
            ORDER BY wn.id
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(node_from_row).collect()
    }

    async fn list_nodes_by_type(
        &self,
        workflow_id: i64,
        node_type: NodeType,
    ) -> Result<Vec<WorkflowNode>, NodeEngineError> {
        Ok(self
            .list_nodes(workflow_id)
            .await?
            .into_iter()
            .filter(|n| n.definition.node_type == node_type)
            .collect())
    }

    async fn list_connections(
        &self,
        workflow_id: i64,
    ) -> Result<Vec<WorkflowConnection>, NodeEngineError> {
        let rows = sqlx::query(
            r#"
            SELECT workflow_id, from_node, to_node, condition
            FROM workflow_connections
            WHERE workflow_id = $1
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(connection_from_row).collect()
    }
}

fn workflow_from_row(row: &sqlx::postgres::PgRow) -> Result<Workflow, NodeEngineError> {
    use sqlx::Row;
    Ok(Workflow {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn node_from_row(row: &sqlx::postgres::PgRow) -> Result<WorkflowNode, NodeEngineError> {
    use sqlx::Row;

    let node_type_str: String = row.try_get("node_type")?;
    let config_metadata_json: serde_json::Value = row.try_get("config_metadata")?;

    Ok(WorkflowNode {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        definition: NodeDefinition {
            name: row.try_get("name")?,
            node_type: serde_json::from_str(&format!("\"{}\"", node_type_str))
                .unwrap_or(NodeType::Action),
            category: row.try_get("category")?,
            config_metadata: serde_json::from_value(config_metadata_json).unwrap_or_default(),
        },
        custom_config: row.try_get("custom_config")?,
    })
}

fn connection_from_row(row: &sqlx::postgres::PgRow) -> Result<WorkflowConnection, NodeEngineError> {
    use sqlx::Row;
    Ok(WorkflowConnection {
        workflow_id: row.try_get("workflow_id")?,
        from_node: row.try_get("from_node")?,
        to_node: row.try_get("to_node")?,
        condition: row.try_get("condition")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_models::ConfigField;
    use uuid::Uuid;

    fn sample_definition(category: &str, node_type: NodeType) -> NodeDefinition {
        NodeDefinition {
            name: category.into(),
            node_type,
            category: category.into(),
            config_metadata: vec![ConfigField {
                name: "x".into(),
                data_type: "string".into(),
                is_output: false,
            }],
        }
    }

    #[tokio::test]
    async fn in_memory_repository_round_trips() {
        let repo = InMemoryWorkflowRepository::new();
        repo.insert_workflow(Workflow::new(Uuid::new_v4()));
        repo.insert_nodes(
            0,
            vec![WorkflowNode {
                id: 1,
                workflow_id: 0,
                definition: sample_definition("scheduler", NodeType::Trigger),
                custom_config: serde_json::json!({}),
            }],
        );
        repo.insert_connections(0, vec![]);

        let workflow = repo.get_workflow(0).await.unwrap();
        assert!(!workflow.active);

        let triggers = repo
            .list_nodes_by_type(0, NodeType::Trigger)
            .await
            .unwrap();
        assert_eq!(triggers.len(), 1);
    }

    #[tokio::test]
    async fn missing_workflow_is_not_found() {
        let repo = InMemoryWorkflowRepository::new();
        assert!(matches!(
            repo.get_workflow(404).await,
            Err(NodeEngineError::WorkflowNotFound(404))
        ));
    }
}
