//! DAG executor - concurrent, join-aware evaluation of one workflow
//! invocation (spec §4.4).

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};
use tracing::{error, info, instrument, warn};

use core_models::{WorkflowConnection, WorkflowNode};

use crate::context::ExecutionContext;
use crate::error::NodeEngineError;
use crate::registry::ActionRegistry;
use crate::template::resolve_config;

/// Default bounded worker-pool size (spec §4.4).
pub const DEFAULT_PARALLELISM: usize = 8;

/// Concurrent DAG runner. One instance is reused across invocations; all
/// per-invocation state lives in `Inner`, built fresh by `execute`.
#[derive(Clone)]
pub struct GraphExecutor {
    actions: ActionRegistry,
    parallelism: usize,
}

impl GraphExecutor {
    pub fn new(actions: ActionRegistry) -> Self {
        Self {
            actions,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Evaluate `nodes`/`connections` as a join-aware dataflow DAG seeded
    /// by `ctx`. Returns the completion map `R` once every reachable node
    /// has either produced a result or been permanently starved by a
    /// failed ancestor (spec §4.4 determinism properties).
    #[instrument(skip(self, nodes, connections, ctx), fields(node_count = nodes.len()))]
    pub async fn execute(
        &self,
        nodes: Vec<WorkflowNode>,
        connections: Vec<WorkflowConnection>,
        ctx: ExecutionContext,
    ) -> Result<HashMap<i64, Value>, NodeEngineError> {
        let node_map: HashMap<i64, WorkflowNode> =
            nodes.into_iter().map(|n| (n.id, n)).collect();

        let mut forward: HashMap<i64, Vec<WorkflowConnection>> = HashMap::new();
        let mut reverse: HashMap<i64, Vec<i64>> = HashMap::new();
        for edge in &connections {
            forward.entry(edge.from_node).or_default().push(edge.clone());
            reverse.entry(edge.to_node).or_default().push(edge.from_node);
        }

        let initial: Vec<i64> = node_map
            .keys()
            .copied()
            .filter(|id| reverse.get(id).map(|p| p.is_empty()).unwrap_or(true))
            .collect();

        let mut submitted = HashSet::new();
        submitted.extend(initial.iter().copied());

        let inner = Arc::new(Inner {
            node_map,
            forward,
            reverse,
            base_ctx: ctx,
            state: Mutex::new(ExecState {
                completed: HashMap::new(),
                submitted,
            }),
            pending: AtomicUsize::new(initial.len()),
            notify: Notify::new(),
            actions: self.actions.clone(),
            semaphore: Arc::new(Semaphore::new(self.parallelism)),
        });

        for node_id in initial {
            let inner = inner.clone();
            tokio::spawn(async move {
                run_node(inner, node_id).await;
            });
        }

        wait_for_completion(&inner).await;

        let state = inner.state.lock().expect("completion map mutex poisoned");
        Ok(state.completed.clone())
    }
}

struct ExecState {
    completed: HashMap<i64, Value>,
    submitted: HashSet<i64>,
}

struct Inner {
    node_map: HashMap<i64, WorkflowNode>,
    forward: HashMap<i64, Vec<WorkflowConnection>>,
    reverse: HashMap<i64, Vec<i64>>,
    base_ctx: ExecutionContext,
    state: Mutex<ExecState>,
    pending: AtomicUsize,
    notify: Notify,
    actions: ActionRegistry,
    semaphore: Arc<Semaphore>,
}

async fn wait_for_completion(inner: &Arc<Inner>) {
    loop {
        let notified = inner.notify.notified();
        if inner.pending.load(Ordering::SeqCst) == 0 {
            break;
        }
        notified.await;
    }
}

fn mark_task_done(inner: &Arc<Inner>) {
    if inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
        inner.notify.notify_one();
    }
}

/// Evaluate one node: build its enhanced context from parent results,
/// run its action (or take the trigger fast-path), commit the result to
/// the shared completion map, then attempt to submit every child whose
/// join barrier is now satisfied.
async fn run_node(inner: Arc<Inner>, node_id: i64) {
    let Some(node) = inner.node_map.get(&node_id).cloned() else {
        warn!(node_id, "node referenced by an edge is missing from the graph");
        mark_task_done(&inner);
        return;
    };

    let mut ctx = build_child_context(&inner, node_id);

    let result = if node.is_trigger_fast_path() {
        serde_json::json!({"trigger_completed": true})
    } else {
        let resolved_config = resolve_config(&node.custom_config, &ctx);

        let handler = match inner.actions.get(&node.definition.category) {
            Ok(h) => h,
            Err(e) => {
                error!(node_id, category = %node.definition.category, error = %e, "unknown node category");
                mark_task_done(&inner);
                return;
            }
        };

        let _permit = inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("executor semaphore closed");

        match handler.run(resolved_config, &ctx).await {
            Ok(value) => value,
            Err(e) => {
                error!(node_id, error = %e, "node handler failed; descendants starved");
                mark_task_done(&inner);
                return;
            }
        }
    };

    ctx.values
        .insert(format!("node_{}_output", node_id), result.clone());

    {
        let mut state = inner.state.lock().expect("completion map mutex poisoned");
        state.completed.insert(node_id, result.clone());
    }
    info!(node_id, "node completed");

    if let Some(edges) = inner.forward.get(&node_id).cloned() {
        for edge in edges {
            if let Some(condition) = &edge.condition {
                let status = result.get("status").and_then(|v| v.as_str());
                if status != Some(condition.as_str()) {
                    continue;
                }
            }
            try_submit(&inner, edge.to_node);
        }
    }

    mark_task_done(&inner);
}

/// Build the per-node enhanced context: parent outputs overlaid on a fresh
/// fork of the invocation's base context (spec §4.4 step 2).
fn build_child_context(inner: &Arc<Inner>, node_id: i64) -> ExecutionContext {
    let mut ctx = inner.base_ctx.fork();

    let parents = inner.reverse.get(&node_id).cloned().unwrap_or_default();
    if parents.is_empty() {
        return ctx;
    }

    let state = inner.state.lock().expect("completion map mutex poisoned");
    let mut all_results = Vec::with_capacity(parents.len());
    for parent_id in &parents {
        if let Some(result) = state.completed.get(parent_id) {
            ctx.values
                .insert(format!("parent_{}_result", parent_id), result.clone());
            all_results.push(serde_json::json!({"parent_id": parent_id, "result": result}));
        }
    }
    drop(state);

    if parents.len() == 1 {
        if let Some(first) = all_results.first() {
            ctx.values
                .insert("parent_result".to_string(), first["result"].clone());
        }
    } else {
        ctx.values
            .insert("all_parent_results".to_string(), Value::Array(all_results));
    }

    ctx
}

/// Claim and spawn `target` exactly once, the instant every structural
/// parent (per `reverse`) has a result in the completion map. A parent
/// whose outgoing edge condition did not match still counts as complete
/// for this readiness check - only its own edge's submission is skipped
/// (spec §4.4 step 7 and the condition open question, resolved in
/// DESIGN.md).
fn try_submit(inner: &Arc<Inner>, target: i64) {
    let should_spawn = {
        let mut state = inner.state.lock().expect("completion map mutex poisoned");
        if state.submitted.contains(&target) {
            false
        } else {
            let ready = inner
                .reverse
                .get(&target)
                .map(|parents| parents.iter().all(|p| state.completed.contains_key(p)))
                .unwrap_or(true);
            if ready {
                state.submitted.insert(target);
            }
            ready
        }
    };

    if should_spawn {
        inner.pending.fetch_add(1, Ordering::SeqCst);
        let inner = inner.clone();
        tokio::spawn(async move {
            run_node(inner, target).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::registry::{ActionHandler, ActionRegistry};
    use async_trait::async_trait;
    use core_models::{NodeDefinition, NodeType};
    use std::time::Duration;

    fn trigger_node(id: i64) -> WorkflowNode {
        WorkflowNode {
            id,
            workflow_id: 1,
            definition: NodeDefinition {
                name: "Trigger".into(),
                node_type: NodeType::Trigger,
                category: "scheduler".into(),
                config_metadata: vec![],
            },
            custom_config: serde_json::json!({}),
        }
    }

    fn action_node(id: i64, category: &str, config: Value) -> WorkflowNode {
        WorkflowNode {
            id,
            workflow_id: 1,
            definition: NodeDefinition {
                name: category.into(),
                node_type: NodeType::Action,
                category: category.into(),
                config_metadata: vec![],
            },
            custom_config: config,
        }
    }

    fn edge(from: i64, to: i64) -> WorkflowConnection {
        WorkflowConnection {
            workflow_id: 1,
            from_node: from,
            to_node: to,
            condition: None,
        }
    }

    struct SleepyEcho {
        millis: u64,
    }

    #[async_trait]
    impl ActionHandler for SleepyEcho {
        async fn run(&self, config: Value, _ctx: &ExecutionContext) -> Result<Value, NodeEngineError> {
            tokio::time::sleep(Duration::from_millis(self.millis)).await;
            Ok(config)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl ActionHandler for AlwaysFails {
        async fn run(&self, _config: Value, _ctx: &ExecutionContext) -> Result<Value, NodeEngineError> {
            Err(NodeEngineError::NodeExecutionFailed {
                node_id: 0,
                message: "boom".into(),
            })
        }
    }

    #[tokio::test]
    async fn trigger_fast_path_produces_sentinel_and_runs_child() {
        let actions = ActionRegistry::new().register(
            "echo",
            Arc::new(SleepyEcho { millis: 0 }),
        );
        let executor = GraphExecutor::new(actions);

        let nodes = vec![trigger_node(1), action_node(2, "echo", serde_json::json!({"to": "{{ parent_result.trigger_completed }}"}))];
        let connections = vec![edge(1, 2)];

        let result = executor
            .execute(nodes, connections, ExecutionContext::default())
            .await
            .unwrap();

        assert_eq!(result[&1]["trigger_completed"], true);
        assert_eq!(result[&2]["to"], true);
    }

    #[tokio::test]
    async fn fan_in_join_waits_for_both_parents() {
        let actions = ActionRegistry::new()
            .register("a", Arc::new(SleepyEcho { millis: 50 }))
            .register("b", Arc::new(SleepyEcho { millis: 200 }));
        let executor = GraphExecutor::new(actions);

        let nodes = vec![
            trigger_node(1),
            action_node(2, "a", serde_json::json!({"x": 1})),
            action_node(3, "b", serde_json::json!({"x": 2})),
            action_node(4, "a", serde_json::json!({"x": 3})),
        ];
        let connections = vec![edge(1, 2), edge(1, 3), edge(2, 4), edge(3, 4)];

        let result = executor
            .execute(nodes, connections, ExecutionContext::default())
            .await
            .unwrap();

        assert!(result.contains_key(&4));
    }

    #[tokio::test]
    async fn failed_action_starves_descendants_but_not_siblings() {
        let actions = ActionRegistry::new()
            .register("fails", Arc::new(AlwaysFails))
            .register("ok", Arc::new(SleepyEcho { millis: 0 }));
        let executor = GraphExecutor::new(actions);

        // T -> A (fails), T -> B (ok); A -> C; B -> D
        let nodes = vec![
            trigger_node(1),
            action_node(2, "fails", serde_json::json!({})),
            action_node(3, "ok", serde_json::json!({})),
            action_node(4, "ok", serde_json::json!({})),
            action_node(5, "ok", serde_json::json!({})),
        ];
        let connections = vec![edge(1, 2), edge(1, 3), edge(2, 4), edge(3, 5)];

        let result = executor
            .execute(nodes, connections, ExecutionContext::default())
            .await
            .unwrap();

        assert!(!result.contains_key(&4), "C must never run");
        assert!(result.contains_key(&5), "D must run");
        assert!(!result.contains_key(&2), "the failing node itself has no result");
    }

    #[tokio::test]
    async fn unreachable_edge_target_does_not_hang() {
        let actions = ActionRegistry::new().register("ok", Arc::new(SleepyEcho { millis: 0 }));
        let executor = GraphExecutor::new(actions);

        let nodes = vec![trigger_node(1), action_node(2, "ok", serde_json::json!({}))];
        // edge references a node id (99) that doesn't exist in the graph
        let connections = vec![edge(1, 2), edge(2, 99)];

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            executor.execute(nodes, connections, ExecutionContext::default()),
        )
        .await
        .expect("executor must not hang on a dangling edge")
        .unwrap();

        assert!(result.contains_key(&2));
    }
}
