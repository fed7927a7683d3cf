//! Schedule model - the scheduler's timed-set payload shape

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recurring or one-shot fire-time policy for a workflow's scheduler
/// trigger. Serialized verbatim as the member stored in the scheduler's
/// ordered set (`workflow_schedules_zset`), scored by `next_run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub workflow_id: i64,
    pub next_run: DateTime<Utc>,
    pub interval_seconds: Option<i64>,
    pub until: Option<DateTime<Utc>>,
    pub max_occurrences: Option<u32>,
    pub occurrences: u32,
    pub context: serde_json::Value,
}

impl Schedule {
    pub fn new(workflow_id: i64, next_run: DateTime<Utc>) -> Self {
        Self {
            workflow_id,
            next_run,
            interval_seconds: None,
            until: None,
            max_occurrences: None,
            occurrences: 0,
            context: serde_json::json!({}),
        }
    }

    pub fn with_interval(mut self, interval_seconds: i64) -> Self {
        self.interval_seconds = Some(interval_seconds);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_max_occurrences(mut self, max_occurrences: u32) -> Self {
        self.max_occurrences = Some(max_occurrences);
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Whether this is a one-shot schedule (no interval configured).
    pub fn is_one_shot(&self) -> bool {
        self.interval_seconds.is_none()
    }

    /// Derive a schedule from a scheduler-category trigger node's
    /// `custom_config` (spec §4.2 Register/Update). `delay_seconds` offsets
    /// the first fire from `now`; a missing `interval_seconds` key produces
    /// a one-shot schedule per the §3 invariant - this repository follows
    /// that written invariant over the original implementation's default of
    /// a 10s recurring interval when the key was absent (see DESIGN.md).
    pub fn from_node_config(workflow_id: i64, config: &serde_json::Value, now: DateTime<Utc>) -> Self {
        let delay_seconds = config
            .get("delay_seconds")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let mut schedule = Self::new(workflow_id, now + chrono::Duration::seconds(delay_seconds));

        if let Some(interval) = config.get("interval_seconds").and_then(|v| v.as_i64()) {
            schedule.interval_seconds = Some(interval);
        }
        if let Some(max) = config.get("max_occurrences").and_then(|v| v.as_u64()) {
            schedule.max_occurrences = Some(max as u32);
        }
        if let Some(until) = config.get("until").and_then(|v| v.as_str()) {
            schedule.until = parse_until(until);
        }
        if let Some(context) = config.get("context") {
            schedule.context = context.clone();
        }

        schedule
    }

    /// Advance `next_run` by one interval and report whether the schedule
    /// should be retired (one-shot fired, occurrences exhausted, or past
    /// `until`). `now` is the drain wallclock.
    pub fn advance(&mut self, now: DateTime<Utc>) -> bool {
        self.occurrences += 1;

        let Some(interval) = self.interval_seconds else {
            return true;
        };

        let next_run = now + chrono::Duration::seconds(interval);
        let exhausted = self
            .max_occurrences
            .map(|max| self.occurrences >= max)
            .unwrap_or(false);
        let past_until = self.until.map(|until| next_run > until).unwrap_or(false);

        if exhausted || past_until {
            return true;
        }

        self.next_run = next_run;
        false
    }
}

/// Parse `until` with timezone awareness; a naive datetime (no offset) is
/// treated as UTC (spec §4.2 clock notes).
fn parse_until(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_retires_after_first_fire() {
        let mut s = Schedule::new(1, Utc::now());
        assert!(s.is_one_shot());
        assert!(s.advance(Utc::now()));
    }

    #[test]
    fn recurring_schedule_reinserts_until_max_occurrences() {
        let mut s = Schedule::new(1, Utc::now()).with_interval(1).with_max_occurrences(3);
        assert!(!s.advance(Utc::now()));
        assert_eq!(s.occurrences, 1);
        assert!(!s.advance(Utc::now()));
        assert_eq!(s.occurrences, 2);
        assert!(s.advance(Utc::now()));
        assert_eq!(s.occurrences, 3);
    }

    #[test]
    fn recurring_schedule_retires_past_until() {
        let now = Utc::now();
        let mut s = Schedule::new(1, now)
            .with_interval(3600)
            .with_until(now + chrono::Duration::seconds(10));
        assert!(s.advance(now));
    }

    #[test]
    fn from_node_config_defaults_to_one_shot_when_interval_absent() {
        let now = Utc::now();
        let schedule = Schedule::from_node_config(1, &serde_json::json!({"delay_seconds": 3}), now);
        assert!(schedule.is_one_shot());
        assert_eq!(schedule.next_run, now + chrono::Duration::seconds(3));
    }

    #[test]
    fn from_node_config_reads_recurring_fields() {
        let now = Utc::now();
        let config = serde_json::json!({
            "interval_seconds": 5,
            "max_occurrences": 3,
            "context": {"a": 1},
        });
        let schedule = Schedule::from_node_config(7, &config, now);
        assert_eq!(schedule.interval_seconds, Some(5));
        assert_eq!(schedule.max_occurrences, Some(3));
        assert_eq!(schedule.context, serde_json::json!({"a": 1}));
    }

    #[test]
    fn from_node_config_parses_naive_until_as_utc() {
        let now = Utc::now();
        let config = serde_json::json!({"interval_seconds": 1, "until": "2099-01-01T00:00:00"});
        let schedule = Schedule::from_node_config(1, &config, now);
        assert_eq!(
            schedule.until,
            Some(chrono::DateTime::parse_from_rfc3339("2099-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc))
        );
    }
}
