//! Trigger stream - the append-only `workflow_triggers` record log with
//! named consumer groups (spec §4.3, §6). Entries carry `workflow_id`
//! (ASCII integer) and `context` (UTF-8 JSON object); the stream provides
//! consumer-group mutual exclusion across trigger workers per entry.

use async_trait::async_trait;
use redis::aio::Connection;
use redis::AsyncCommands;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use core_models::TriggerRecord;

use crate::error::SchedulerError;

pub const STREAM_NAME: &str = "workflow_triggers";

/// One claimed stream entry: the consumer-group-assigned id (needed for
/// ack) paired with the decoded record.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub record: TriggerRecord,
}

#[async_trait]
pub trait TriggerStream: Send + Sync {
    /// Append a trigger record, returning its stream-assigned id.
    async fn emit(&self, record: TriggerRecord) -> Result<String, SchedulerError>;

    /// Block-read up to `count` new entries as `group`/`consumer`
    /// (spec §6: read mode `>`, block ≤5s). An empty result means idle.
    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamEntry>, SchedulerError>;

    /// Acknowledge successful processing of `entry_id`.
    async fn ack(&self, group: &str, entry_id: &str) -> Result<(), SchedulerError>;

    /// Reclaim entries that have sat unacked (pending) for at least
    /// `idle_ms`, assigning them to `consumer` (spec §4.3.1).
    async fn reclaim_idle(
        &self,
        group: &str,
        consumer: &str,
        idle_ms: u64,
    ) -> Result<Vec<StreamEntry>, SchedulerError>;
}

/// Redis-backed implementation over `XADD`/`XREADGROUP`/`XACK`/`XCLAIM`.
/// Raw `redis::cmd` calls are used for the stream primitives (mirroring
/// the teacher's own use of `redis::cmd("PING")` in `backend-api::cache`)
/// rather than the higher-level stream helpers, to keep the wire shape
/// explicit: field names `workflow_id`/`context` are exactly the spec's
/// required fields (spec §6).
pub struct RedisTriggerStream {
    client: redis::Client,
}

impl RedisTriggerStream {
    /// `group` is the consumer group to create up front (spec §6 fixes it
    /// as `workflow_group`, but deployments may override it via
    /// `TRIGGER_CONSUMER_GROUP` - see `Config`); it must match whatever
    /// group name `TriggerWorker` later reads with, or `XREADGROUP` fails
    /// with `NOGROUP`.
    pub async fn new(redis_url: &str, group: &str) -> Result<Self, SchedulerError> {
        let client = redis::Client::open(redis_url)?;
        let this = Self { client };
        this.ensure_group(group).await?;
        Ok(this)
    }

    async fn connection(&self) -> Result<Connection, SchedulerError> {
        Ok(self.client.get_async_connection().await?)
    }

    /// Idempotent consumer-group creation (`MKSTREAM`); `BUSYGROUP` (the
    /// group already exists) is not an error.
    async fn ensure_group(&self, group: &str) -> Result<(), SchedulerError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(STREAM_NAME)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TriggerStream for RedisTriggerStream {
    async fn emit(&self, record: TriggerRecord) -> Result<String, SchedulerError> {
        let mut conn = self.connection().await?;
        let context = serde_json::to_string(&record.context)?;
        let id: String = redis::cmd("XADD")
            .arg(STREAM_NAME)
            .arg("*")
            .arg("workflow_id")
            .arg(record.workflow_id)
            .arg("context")
            .arg(context)
            .query_async(&mut conn)
            .await?;
        Ok(id)
    }

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamEntry>, SchedulerError> {
        let mut conn = self.connection().await?;
        let reply: redis::Value = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(STREAM_NAME)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        Ok(parse_xread_reply(reply))
    }

    async fn ack(&self, group: &str, entry_id: &str) -> Result<(), SchedulerError> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.xack(STREAM_NAME, group, &[entry_id]).await?;
        Ok(())
    }

    async fn reclaim_idle(
        &self,
        group: &str,
        consumer: &str,
        idle_ms: u64,
    ) -> Result<Vec<StreamEntry>, SchedulerError> {
        let mut conn = self.connection().await?;

        // XPENDING <stream> <group> IDLE <idle_ms> - + 100
        let pending: redis::Value = redis::cmd("XPENDING")
            .arg(STREAM_NAME)
            .arg(group)
            .arg("IDLE")
            .arg(idle_ms)
            .arg("-")
            .arg("+")
            .arg(100)
            .query_async(&mut conn)
            .await?;

        let pending_ids = parse_xpending_ids(pending);
        if pending_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(STREAM_NAME)
            .arg(group)
            .arg(consumer)
            .arg(idle_ms);
        for id in &pending_ids {
            cmd.arg(id);
        }
        let claimed: redis::Value = cmd.query_async(&mut conn).await?;

        Ok(parse_xclaim_reply(claimed))
    }
}

fn decode_record(fields: &[(redis::Value, redis::Value)]) -> Option<TriggerRecord> {
    let mut workflow_id = None;
    let mut context = None;

    for (k, v) in fields {
        let key = value_to_string(k)?;
        let val = value_to_string(v)?;
        match key.as_str() {
            "workflow_id" => workflow_id = val.parse::<i64>().ok(),
            "context" => context = serde_json::from_str(&val).ok(),
            _ => {}
        }
    }

    Some(TriggerRecord {
        workflow_id: workflow_id?,
        context: context.unwrap_or(serde_json::json!({})),
    })
}

fn value_to_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::Data(bytes) => String::from_utf8(bytes.clone()).ok(),
        redis::Value::Status(s) => Some(s.clone()),
        redis::Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

/// Parse the nested `XREADGROUP` reply shape:
/// `[[stream_name, [[id, [field, value, ...]], ...]], ...]`.
fn parse_xread_reply(value: redis::Value) -> Vec<StreamEntry> {
    let mut entries = Vec::new();
    let redis::Value::Bulk(streams) = value else {
        return entries;
    };

    for stream in streams {
        let redis::Value::Bulk(stream_parts) = stream else {
            continue;
        };
        let Some(redis::Value::Bulk(stream_entries)) = stream_parts.into_iter().nth(1) else {
            continue;
        };

        for entry in stream_entries {
            let redis::Value::Bulk(entry_parts) = entry else {
                continue;
            };
            let mut iter = entry_parts.into_iter();
            let Some(id_value) = iter.next() else { continue };
            let Some(id) = value_to_string(&id_value) else { continue };
            let Some(redis::Value::Bulk(raw_fields)) = iter.next() else {
                continue;
            };

            let fields: Vec<(redis::Value, redis::Value)> = raw_fields
                .chunks(2)
                .filter_map(|pair| match pair {
                    [k, v] => Some((k.clone(), v.clone())),
                    _ => None,
                })
                .collect();

            if let Some(record) = decode_record(&fields) {
                entries.push(StreamEntry { id, record });
            }
        }
    }

    entries
}

/// Parse the summary-less form of `XPENDING` (`IDLE ... start end count`)
/// down to just the entry ids, which is all `reclaim_idle` needs.
fn parse_xpending_ids(value: redis::Value) -> Vec<String> {
    let redis::Value::Bulk(rows) = value else {
        return Vec::new();
    };

    rows.into_iter()
        .filter_map(|row| {
            let redis::Value::Bulk(fields) = row else {
                return None;
            };
            let id_value = fields.into_iter().next()?;
            value_to_string(&id_value)
        })
        .collect()
}

/// `XCLAIM` (without `JUSTID`) replies with full entries, same shape as
/// one stream's worth of `XREADGROUP` entries.
fn parse_xclaim_reply(value: redis::Value) -> Vec<StreamEntry> {
    let redis::Value::Bulk(entries) = value else {
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let redis::Value::Bulk(entry_parts) = entry else {
                return None;
            };
            let mut iter = entry_parts.into_iter();
            let id = value_to_string(&iter.next()?)?;
            let redis::Value::Bulk(raw_fields) = iter.next()? else {
                return None;
            };
            let fields: Vec<(redis::Value, redis::Value)> = raw_fields
                .chunks(2)
                .filter_map(|pair| match pair {
                    [k, v] => Some((k.clone(), v.clone())),
                    _ => None,
                })
                .collect();
            decode_record(&fields).map(|record| StreamEntry { id, record })
        })
        .collect()
}

/// In-memory fake used by tests: a FIFO queue plus a pending map keyed by
/// a monotonic id counter, enough to exercise the consumer-group
/// exclusivity and ack/no-ack contracts without a live Redis.
#[derive(Default)]
pub struct InMemoryTriggerStream {
    next_id: AtomicU64,
    queue: Mutex<VecDeque<StreamEntry>>,
    pending: Mutex<std::collections::HashMap<String, StreamEntry>>,
}

impl InMemoryTriggerStream {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TriggerStream for InMemoryTriggerStream {
    async fn emit(&self, record: TriggerRecord) -> Result<String, SchedulerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.queue
            .lock()
            .expect("trigger stream queue poisoned")
            .push_back(StreamEntry {
                id: id.clone(),
                record,
            });
        Ok(id)
    }

    async fn read_group(
        &self,
        _group: &str,
        _consumer: &str,
        count: usize,
        _block_ms: u64,
    ) -> Result<Vec<StreamEntry>, SchedulerError> {
        let mut queue = self.queue.lock().expect("trigger stream queue poisoned");
        let mut pending = self.pending.lock().expect("trigger stream pending poisoned");

        let mut claimed = Vec::new();
        while claimed.len() < count {
            let Some(entry) = queue.pop_front() else {
                break;
            };
            pending.insert(entry.id.clone(), entry.clone());
            claimed.push(entry);
        }
        Ok(claimed)
    }

    async fn ack(&self, _group: &str, entry_id: &str) -> Result<(), SchedulerError> {
        self.pending
            .lock()
            .expect("trigger stream pending poisoned")
            .remove(entry_id);
        Ok(())
    }

    async fn reclaim_idle(
        &self,
        _group: &str,
        _consumer: &str,
        _idle_ms: u64,
    ) -> Result<Vec<StreamEntry>, SchedulerError> {
        // The fake has no per-entry delivery clock; tests exercise reclaim
        // semantics against a live Redis or drive it directly through
        // `pending`/`ack`.
        Ok(self
            .pending
            .lock()
            .expect("trigger stream pending poisoned")
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_records_are_read_exactly_once_until_acked() {
        let stream = InMemoryTriggerStream::new();
        stream
            .emit(TriggerRecord::new(1, serde_json::json!({"a": 1})))
            .await
            .unwrap();

        let first = stream.read_group("g", "c1", 1, 0).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = stream.read_group("g", "c2", 1, 0).await.unwrap();
        assert!(second.is_empty(), "entry already claimed must not be redelivered");

        stream.ack("g", &first[0].id).await.unwrap();
        assert!(stream
            .pending
            .lock()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn unacked_entries_remain_pending() {
        let stream = InMemoryTriggerStream::new();
        stream
            .emit(TriggerRecord::new(1, serde_json::json!({})))
            .await
            .unwrap();
        let entries = stream.read_group("g", "c1", 1, 0).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(stream.pending.lock().unwrap().len(), 1);
    }
}
