//! Scheduler runtime - drains due schedules onto the trigger stream and
//! reacts to control-plane lifecycle events (spec §4.2, §4.2.1).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use core_integrations::ControlPlaneSubscriber;
use core_models::{TriggerRecord, WorkflowEvent};
use tracing::{error, info, warn};

use crate::error::SchedulerError;
use crate::store::ScheduleStore;
use crate::stream::TriggerStream;
use crate::trigger_handlers::TriggerHandlerRegistry;

/// Default interval between `drain_due` sweeps (spec §4.2.1).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Ties the schedule store, trigger stream, control-plane subscription,
/// and trigger-handler registry into the single scheduler replica shape
/// described in spec §4.2.1: one tick loop draining due schedules, one
/// event loop reacting to workflow lifecycle changes.
pub struct SchedulerRunner {
    store: Arc<dyn ScheduleStore>,
    stream: Arc<dyn TriggerStream>,
    handlers: Arc<TriggerHandlerRegistry>,
}

impl SchedulerRunner {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        stream: Arc<dyn TriggerStream>,
        handlers: Arc<TriggerHandlerRegistry>,
    ) -> Self {
        Self {
            store,
            stream,
            handlers,
        }
    }

    /// One drain cycle: every schedule due at or before `now` is emitted
    /// onto the trigger stream, then either re-armed (recurring, under
    /// `max_occurrences`) or retired (spec §3, §4.2).
    pub async fn drain_tick(&self, now: chrono::DateTime<Utc>) -> Result<usize, SchedulerError> {
        let due = self.store.drain_due(now).await?;
        let count = due.len();

        for mut schedule in due {
            let record = TriggerRecord::new(schedule.workflow_id, schedule.context.clone());
            if let Err(e) = self.stream.emit(record).await {
                error!(workflow_id = schedule.workflow_id, error = %e, "failed to emit trigger record");
                continue;
            }

            if !schedule.advance(now) {
                if let Err(e) = self.store.upsert(schedule).await {
                    error!(error = %e, "failed to re-arm recurring schedule");
                }
            }
        }

        Ok(count)
    }

    /// React to one control-plane lifecycle event (spec §4.1, §4.6).
    /// `WORKFLOW_DELETED` carries no node list, so it can only clear the
    /// schedule store directly - the trigger-handler registry's
    /// `cleanup` needs the category/config a `WorkflowIdPayload` does
    /// not carry, an asymmetry inherent to the event shapes themselves.
    pub async fn handle_event(&self, event: WorkflowEvent) {
        match event {
            WorkflowEvent::Activated { payload } | WorkflowEvent::Updated { payload } => {
                for node in &payload.nodes {
                    match self.handlers.get(&node.node_category) {
                        Ok(handler) => {
                            if let Err(e) = handler.handle(payload.workflow_id, node).await {
                                error!(
                                    workflow_id = payload.workflow_id,
                                    category = %node.node_category,
                                    error = %e,
                                    "trigger handler activation failed"
                                );
                            }
                        }
                        Err(e) => warn!(
                            workflow_id = payload.workflow_id,
                            category = %node.node_category,
                            error = %e,
                            "no trigger handler for category"
                        ),
                    }
                }
            }
            WorkflowEvent::Deactivated { payload } => {
                for node in &payload.nodes {
                    match self.handlers.get(&node.node_category) {
                        Ok(handler) => {
                            if let Err(e) = handler.cleanup(payload.workflow_id, node).await {
                                error!(
                                    workflow_id = payload.workflow_id,
                                    category = %node.node_category,
                                    error = %e,
                                    "trigger handler cleanup failed"
                                );
                            }
                        }
                        Err(e) => warn!(
                            workflow_id = payload.workflow_id,
                            category = %node.node_category,
                            error = %e,
                            "no trigger handler for category"
                        ),
                    }
                }
            }
            WorkflowEvent::Deleted { payload } => {
                if let Err(e) = self.store.remove_by_workflow(payload.workflow_id).await {
                    error!(
                        workflow_id = payload.workflow_id,
                        error = %e,
                        "failed to clear schedules for deleted workflow"
                    );
                }
            }
        }
    }

    /// Interleave the tick loop with the control-plane subscription
    /// forever. Each is independent: a lagging event stream never blocks
    /// the tick, and a slow tick never blocks event delivery, since both
    /// run as separate tasks over the same `Arc`-shared state.
    pub async fn run_forever(
        self: Arc<Self>,
        mut subscriber: ControlPlaneSubscriber,
        tick_interval: Duration,
    ) {
        let ticker = {
            let runner = self.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick_interval);
                loop {
                    interval.tick().await;
                    if let Err(e) = runner.drain_tick(Utc::now()).await {
                        error!(error = %e, "scheduler drain tick failed");
                    }
                }
            })
        };

        let events = {
            let runner = self.clone();
            tokio::spawn(async move {
                loop {
                    match subscriber.next_event().await {
                        Some(event) => {
                            info!(workflow_id = event.workflow_id(), "handling control-plane event");
                            runner.handle_event(event).await;
                        }
                        None => {
                            warn!("control-plane subscription closed; scheduler event loop exiting");
                            break;
                        }
                    }
                }
            })
        };

        let _ = tokio::join!(ticker, events);
    }
}
