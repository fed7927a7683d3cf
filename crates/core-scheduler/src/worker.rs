//! Trigger worker - the consumer-group reader that turns trigger stream
//! entries into DAG executions (spec §4.3).

use std::sync::Arc;
use std::time::Duration;

use core_node_engine::{ExecutionContext, GraphExecutor, Services, WorkflowRepository};
use tracing::{error, info, warn};

use crate::error::SchedulerError;
use crate::stream::{StreamEntry, TriggerStream};

/// Default idle threshold before a pending entry is eligible for reclaim
/// (spec §4.3.1).
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(60);
/// Default interval between reclaim sweeps (spec §4.3.1).
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(30);

/// One trigger-consuming replica: reads a batch from the stream as
/// `consumer_name` within `group`, runs each record's workflow to
/// completion, and acks on success. A failed execution is logged and
/// left unacked, so it becomes eligible for reclaim and retry by this or
/// another replica (spec §4.3, §7: at-least-once delivery).
pub struct TriggerWorker {
    stream: Arc<dyn TriggerStream>,
    repository: Arc<dyn WorkflowRepository>,
    executor: GraphExecutor,
    services: Arc<Services>,
    group: String,
    consumer_name: String,
}

impl TriggerWorker {
    pub fn new(
        stream: Arc<dyn TriggerStream>,
        repository: Arc<dyn WorkflowRepository>,
        executor: GraphExecutor,
        services: Arc<Services>,
        group: impl Into<String>,
        consumer_name: impl Into<String>,
    ) -> Self {
        Self {
            stream,
            repository,
            executor,
            services,
            group: group.into(),
            consumer_name: consumer_name.into(),
        }
    }

    /// Read and process up to `count` entries once; returns how many were
    /// read. Used directly by tests and by `run_forever`'s loop body.
    pub async fn run_once(&self, count: usize, block_ms: u64) -> Result<usize, SchedulerError> {
        let entries = self
            .stream
            .read_group(&self.group, &self.consumer_name, count, block_ms)
            .await?;
        let read = entries.len();

        for entry in entries {
            self.process(entry).await;
        }

        Ok(read)
    }

    async fn process(&self, entry: StreamEntry) {
        let StreamEntry { id, record } = entry;
        let workflow_id = record.workflow_id;

        let outcome = self.execute_workflow(workflow_id, record.context).await;
        match outcome {
            Ok(()) => {
                if let Err(e) = self.stream.ack(&self.group, &id).await {
                    error!(workflow_id, entry_id = %id, error = %e, "failed to ack trigger entry");
                }
            }
            Err(e) => {
                error!(
                    workflow_id,
                    entry_id = %id,
                    error = %e,
                    "workflow execution failed; leaving entry pending for reclaim"
                );
            }
        }
    }

    async fn execute_workflow(
        &self,
        workflow_id: i64,
        context: serde_json::Value,
    ) -> Result<(), SchedulerError> {
        let nodes = self.repository.list_nodes(workflow_id).await?;
        let connections = self.repository.list_connections(workflow_id).await?;

        let ctx = ExecutionContext::from_trigger(context).with_services(self.services.clone());
        let completed = self.executor.execute(nodes, connections, ctx).await?;

        info!(workflow_id, nodes_completed = completed.len(), "workflow run completed");
        Ok(())
    }

    /// Reclaim entries idle longer than `idle_threshold` and process them
    /// immediately under this consumer (spec §4.3.1).
    pub async fn reclaim_once(&self, idle_threshold: Duration) -> Result<usize, SchedulerError> {
        let entries = self
            .stream
            .reclaim_idle(&self.group, &self.consumer_name, idle_threshold.as_millis() as u64)
            .await?;
        let reclaimed = entries.len();

        for entry in entries {
            warn!(entry_id = %entry.id, "reclaimed idle pending trigger entry");
            self.process(entry).await;
        }

        Ok(reclaimed)
    }

    /// Run forever: alternate batch reads with periodic reclaim sweeps.
    pub async fn run_forever(
        self: Arc<Self>,
        batch_size: usize,
        block_ms: u64,
        reclaim_interval: Duration,
        idle_threshold: Duration,
    ) {
        let reclaimer = {
            let worker = self.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(reclaim_interval);
                loop {
                    interval.tick().await;
                    if let Err(e) = worker.reclaim_once(idle_threshold).await {
                        error!(error = %e, "trigger reclaim sweep failed");
                    }
                }
            })
        };

        let reader = {
            let worker = self.clone();
            tokio::spawn(async move {
                loop {
                    if let Err(e) = worker.run_once(batch_size, block_ms).await {
                        error!(error = %e, "trigger read failed");
                    }
                }
            })
        };

        let _ = tokio::join!(reclaimer, reader);
    }
}
