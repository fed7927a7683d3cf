//! Schedule store - the scheduler's priority set `Z` keyed by fire-time
//! (spec §4.2, §6). Members are JSON-encoded `Schedule` payloads; scores
//! are UTC unix seconds.
//!
//! `Z` is removed-and-reinserted per workflow rather than updated in
//! place (spec §3: "updating a schedule is remove by workflow_id, then
//! re-insert"), which is why every mutating operation here is phrased as
//! a scan-and-filter rather than a keyed lookup - the payload, not the
//! workflow_id, is the zset member.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::sync::RwLock;
use tracing::warn;

use core_models::Schedule;

use crate::error::SchedulerError;

const ZSET_KEY: &str = "workflow_schedules_zset";

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Remove any existing entry for `schedule.workflow_id`, then insert
    /// `schedule` scored by `next_run` (spec §4.2 Register/Update).
    async fn upsert(&self, schedule: Schedule) -> Result<(), SchedulerError>;

    /// Remove every entry for `workflow_id` (spec §4.2 Deactivated/Deleted).
    async fn remove_by_workflow(&self, workflow_id: i64) -> Result<(), SchedulerError>;

    /// Atomically-enough (single scheduler replica, spec §9) pop every
    /// entry scored in `[0, now]` and return it for the caller to drain.
    async fn drain_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, SchedulerError>;

    /// Number of entries currently registered, for tests and diagnostics.
    async fn len(&self) -> Result<usize, SchedulerError>;
}

/// Redis-backed implementation. Removal-by-workflow is a linear scan over
/// the full zset - acceptable at the expected cardinalities of ≤10^4
/// (spec §4.2) - since Redis has no secondary index on zset member
/// contents.
pub struct RedisScheduleStore {
    client: redis::Client,
}

impl RedisScheduleStore {
    pub fn new(redis_url: &str) -> Result<Self, SchedulerError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }

    async fn all_members(
        &self,
        conn: &mut redis::aio::Connection,
    ) -> Result<Vec<String>, SchedulerError> {
        Ok(conn.zrange(ZSET_KEY, 0, -1).await?)
    }
}

#[async_trait]
impl ScheduleStore for RedisScheduleStore {
    async fn upsert(&self, schedule: Schedule) -> Result<(), SchedulerError> {
        let mut conn = self.client.get_async_connection().await?;
        let members = self.all_members(&mut conn).await?;

        let stale: Vec<&String> = members
            .iter()
            .filter(|raw| {
                serde_json::from_str::<Schedule>(raw)
                    .map(|s| s.workflow_id == schedule.workflow_id)
                    .unwrap_or(false)
            })
            .collect();
        if !stale.is_empty() {
            conn.zrem::<_, _, ()>(ZSET_KEY, &stale).await?;
        }

        let payload = serde_json::to_string(&schedule)?;
        let score = schedule.next_run.timestamp() as f64;
        conn.zadd::<_, _, _, ()>(ZSET_KEY, payload, score).await?;
        Ok(())
    }

    async fn remove_by_workflow(&self, workflow_id: i64) -> Result<(), SchedulerError> {
        let mut conn = self.client.get_async_connection().await?;
        let members = self.all_members(&mut conn).await?;

        let stale: Vec<&String> = members
            .iter()
            .filter(|raw| {
                serde_json::from_str::<Schedule>(raw)
                    .map(|s| s.workflow_id == workflow_id)
                    .unwrap_or(false)
            })
            .collect();
        if !stale.is_empty() {
            conn.zrem::<_, _, ()>(ZSET_KEY, &stale).await?;
        }
        Ok(())
    }

    async fn drain_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, SchedulerError> {
        let mut conn = self.client.get_async_connection().await?;
        let due: Vec<String> = conn
            .zrangebyscore(ZSET_KEY, 0, now.timestamp() as f64)
            .await?;

        if due.is_empty() {
            return Ok(Vec::new());
        }
        conn.zrem::<_, _, ()>(ZSET_KEY, &due).await?;

        Ok(due
            .into_iter()
            .filter_map(|raw| match serde_json::from_str(&raw) {
                Ok(schedule) => Some(schedule),
                Err(e) => {
                    warn!(error = %e, "dropping unparseable schedule payload");
                    None
                }
            })
            .collect())
    }

    async fn len(&self) -> Result<usize, SchedulerError> {
        let mut conn = self.client.get_async_connection().await?;
        Ok(conn.zcard(ZSET_KEY).await?)
    }
}

/// In-memory fake used by tests and the example binaries, since this
/// crate's own test run cannot assume a live Redis instance (mirrors
/// `core_node_engine::InMemoryWorkflowRepository`).
#[derive(Default)]
pub struct InMemoryScheduleStore {
    entries: RwLock<Vec<Schedule>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn upsert(&self, schedule: Schedule) -> Result<(), SchedulerError> {
        let mut entries = self.entries.write().expect("schedule store poisoned");
        entries.retain(|s| s.workflow_id != schedule.workflow_id);
        entries.push(schedule);
        Ok(())
    }

    async fn remove_by_workflow(&self, workflow_id: i64) -> Result<(), SchedulerError> {
        let mut entries = self.entries.write().expect("schedule store poisoned");
        entries.retain(|s| s.workflow_id != workflow_id);
        Ok(())
    }

    async fn drain_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, SchedulerError> {
        let mut entries = self.entries.write().expect("schedule store poisoned");
        let (due, remaining): (Vec<Schedule>, Vec<Schedule>) =
            entries.drain(..).partition(|s| s.next_run <= now);
        *entries = remaining;
        Ok(due)
    }

    async fn len(&self) -> Result<usize, SchedulerError> {
        Ok(self.entries.read().expect("schedule store poisoned").len())
    }
}
