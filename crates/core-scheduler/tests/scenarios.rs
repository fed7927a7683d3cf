//! Multi-module scenario tests (spec §8 S1, S2, S6), driven entirely
//! against in-memory fakes so they run without a live Redis.

use std::sync::Arc;

use chrono::Utc;
use core_models::{EventNode, NodeType, Schedule, WorkflowEvent, WorkflowNodesPayload};
use core_scheduler::{
    InMemoryScheduleStore, InMemoryTriggerStream, SchedulerRunner, SchedulerTriggerHandler,
    TriggerHandlerRegistry,
};

fn scheduler_node(workflow_id: i64, config: serde_json::Value) -> (i64, EventNode) {
    (
        workflow_id,
        EventNode {
            node_id: 1,
            node_type: NodeType::Trigger,
            node_category: "scheduler".to_string(),
            custom_config: config,
        },
    )
}

fn build_runner() -> (
    Arc<InMemoryScheduleStore>,
    Arc<InMemoryTriggerStream>,
    SchedulerRunner,
) {
    let store = Arc::new(InMemoryScheduleStore::new());
    let stream = Arc::new(InMemoryTriggerStream::new());
    let mut registry = TriggerHandlerRegistry::new();
    registry.register(
        "scheduler",
        Arc::new(SchedulerTriggerHandler::new(store.clone())),
    );
    let runner = SchedulerRunner::new(store.clone(), stream.clone(), Arc::new(registry));
    (store, stream, runner)
}

/// S1 - one-shot scheduler: activation with `delay_seconds: 3` produces
/// exactly one trigger record once the delay has elapsed, and the
/// schedule retires afterwards.
#[tokio::test]
async fn s1_one_shot_scheduler_fires_exactly_once() {
    let (store, stream, runner) = build_runner();
    let t0 = Utc::now();

    let (workflow_id, node) = scheduler_node(1, serde_json::json!({"delay_seconds": 3}));
    runner
        .handle_event(WorkflowEvent::Activated {
            payload: WorkflowNodesPayload {
                workflow_id,
                nodes: vec![node],
            },
        })
        .await;
    assert_eq!(store.len().await.unwrap(), 1);

    // Before the delay elapses nothing is due.
    let emitted_early = runner.drain_tick(t0).await.unwrap();
    assert_eq!(emitted_early, 0);

    // After the delay, exactly one trigger record is emitted and the
    // schedule is retired.
    let after_delay = t0 + chrono::Duration::seconds(4);
    let emitted = runner.drain_tick(after_delay).await.unwrap();
    assert_eq!(emitted, 1);
    assert_eq!(store.len().await.unwrap(), 0);

    let entries = stream.read_group("g", "c", 10, 0).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record.workflow_id, workflow_id);
}

/// S2 - recurring with max_occurrences: over three drain ticks spaced
/// one interval apart, exactly 3 trigger records are produced and the
/// schedule set is empty afterwards.
#[tokio::test]
async fn s2_recurring_schedule_fires_exactly_max_occurrences_times() {
    let (store, stream, runner) = build_runner();
    let t0 = Utc::now();

    let (workflow_id, node) = scheduler_node(
        2,
        serde_json::json!({"interval_seconds": 1, "max_occurrences": 3}),
    );
    runner
        .handle_event(WorkflowEvent::Activated {
            payload: WorkflowNodesPayload {
                workflow_id,
                nodes: vec![node],
            },
        })
        .await;

    let mut total_emitted = 0;
    for tick in 0..3 {
        let now = t0 + chrono::Duration::seconds(tick);
        total_emitted += runner.drain_tick(now).await.unwrap();
    }

    assert_eq!(total_emitted, 3);
    assert_eq!(store.len().await.unwrap(), 0);

    let entries = stream.read_group("g", "c", 10, 0).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.record.workflow_id == workflow_id));
}

/// S6 - UPDATED replaces the prior schedule: activating at interval 60
/// then emitting UPDATED with interval 5 leaves exactly one entry for
/// the workflow, and its cadence is 5s, not 60s.
#[tokio::test]
async fn s6_updated_event_replaces_prior_schedule() {
    let (store, _stream, runner) = build_runner();
    let t0 = Utc::now();

    let (workflow_id, slow_node) = scheduler_node(3, serde_json::json!({"interval_seconds": 60}));
    runner
        .handle_event(WorkflowEvent::Activated {
            payload: WorkflowNodesPayload {
                workflow_id,
                nodes: vec![slow_node],
            },
        })
        .await;
    assert_eq!(store.len().await.unwrap(), 1);

    let (_, fast_node) = scheduler_node(3, serde_json::json!({"interval_seconds": 5}));
    runner
        .handle_event(WorkflowEvent::Updated {
            payload: WorkflowNodesPayload {
                workflow_id,
                nodes: vec![fast_node],
            },
        })
        .await;

    // Still exactly one schedule for this workflow after reconvergence.
    assert_eq!(store.len().await.unwrap(), 1);

    // drain_due at t0 + 5s should now find it due (5s cadence), whereas
    // the original 60s schedule would not have been.
    let due = store.drain_due(t0 + chrono::Duration::seconds(5)).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].interval_seconds, Some(5));
}

/// Sanity check on the underlying model used by the scenarios above:
/// `Schedule::advance` is what gives S2 its "exactly 3, then empty"
/// shape, independent of the store/stream plumbing.
#[tokio::test]
async fn schedule_advance_matches_s2_expectations() {
    let mut schedule = Schedule::new(2, Utc::now())
        .with_interval(1)
        .with_max_occurrences(3);

    assert!(!schedule.advance(Utc::now()));
    assert!(!schedule.advance(Utc::now()));
    assert!(schedule.advance(Utc::now()));
    assert_eq!(schedule.occurrences, 3);
}
