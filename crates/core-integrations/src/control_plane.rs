//! Control-plane publisher and subscriber - the `workflow_events` pub/sub
//! topic that couples workflow CRUD to the scheduler and trigger-handler
//! registry (spec §4.1, §6).
//!
//! Publication is fire-and-forget: a dropped `PUBLISH` only delays
//! schedule convergence, since the CRUD layer is expected to re-emit on
//! its own retry path. The subscriber side hands back already-parsed
//! `WorkflowEvent`s and silently drops anything that doesn't parse -
//! malformed payloads are the scheduler's problem to log, not this
//! transport's.

use core_models::{parse_envelope, WorkflowEvent};
use futures_util::StreamExt;
use redis::Client;
use tracing::{error, warn};

const CHANNEL: &str = "workflow_events";

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Thin wrapper over the control-plane channel: `publish(event)` serializes
/// `{type, timestamp, payload}` to JSON and issues a `PUBLISH` on
/// `workflow_events`, logging and swallowing transport errors (spec §4.1).
#[derive(Clone)]
pub struct ControlPlanePublisher {
    client: Client,
}

impl ControlPlanePublisher {
    pub fn new(redis_url: &str) -> Result<Self, ControlPlaneError> {
        Ok(Self {
            client: Client::open(redis_url)?,
        })
    }

    /// Publish one lifecycle event. Best-effort: a transport failure is
    /// logged and swallowed rather than propagated, matching the policy
    /// that a dropped event only delays (never corrupts) schedule state.
    pub async fn publish(&self, event: &WorkflowEvent) {
        let envelope = event.envelope();
        let payload = match serde_json::to_string(&envelope) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "failed to serialize workflow event envelope");
                return;
            }
        };

        let conn = self.client.get_async_connection().await;
        let mut conn = match conn {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to connect to redis for control-plane publish");
                return;
            }
        };

        if let Err(e) = redis::cmd("PUBLISH")
            .arg(CHANNEL)
            .arg(&payload)
            .query_async::<_, i64>(&mut conn)
            .await
        {
            error!(error = %e, "control-plane publish failed");
        }
    }
}

/// Subscriber side used by the scheduler loop to react to lifecycle
/// events. Wraps a dedicated pub/sub connection; `next_event` resolves to
/// `None` only if the underlying connection stream ends (i.e. the
/// connection dropped), never on a single malformed message.
pub struct ControlPlaneSubscriber {
    stream: std::pin::Pin<Box<dyn futures_util::Stream<Item = redis::Msg> + Send>>,
}

impl ControlPlaneSubscriber {
    pub async fn connect(redis_url: &str) -> Result<Self, ControlPlaneError> {
        let client = Client::open(redis_url)?;
        let conn = client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(CHANNEL).await?;

        // `into_on_message` consumes the `PubSub`, which in turn owns the
        // connection - the returned stream keeps it alive for as long as
        // this subscriber does.
        let stream = pubsub.into_on_message();
        Ok(Self {
            stream: Box::pin(stream),
        })
    }

    /// Poll for the next well-formed lifecycle event, silently dropping
    /// malformed payloads (spec §7 "bad event payload" policy - this is
    /// the transport half of that policy; the scheduler logs the drop).
    pub async fn next_event(&mut self) -> Option<WorkflowEvent> {
        loop {
            let msg = self.stream.next().await?;
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "control-plane message payload was not a string");
                    continue;
                }
            };

            let raw: serde_json::Value = match serde_json::from_str(&payload) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "control-plane message was not valid JSON; dropping");
                    continue;
                }
            };

            match parse_envelope(&raw) {
                Some(event) => return Some(event),
                None => {
                    warn!(raw = %payload, "unrecognized control-plane event type; dropping");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_models::{WorkflowEvent, WorkflowIdPayload};

    #[test]
    fn envelope_serializes_to_valid_json_for_publish() {
        let event = WorkflowEvent::Deleted {
            payload: WorkflowIdPayload { workflow_id: 9 },
        };
        let envelope = event.envelope();
        let payload = serde_json::to_string(&envelope).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["type"], "WORKFLOW_DELETED");
    }
}
