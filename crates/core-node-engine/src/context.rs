//! Execution context - the per-invocation value bag threaded through a
//! running DAG, plus the non-serializable "services" slot (spec §3, §9).

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::NodeEngineError;

/// Credential vault interface the executor depends on to unwrap secrets
/// embedded in `custom_config`. Cryptography itself is out of scope here
/// (spec §1) - this is the narrow trait a real credential vault backs.
pub trait CredentialDecryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String, NodeEngineError>;
}

/// Non-copyable handle bag injected into every `ExecutionContext`: a
/// database pool, a credential decryptor, and (implicitly) the process's
/// `tracing` subscriber. Shared by `Arc`, never deep-copied when context
/// is forked for a child node (spec §9).
#[derive(Clone)]
pub struct Services {
    pub db: Option<sqlx::PgPool>,
    pub credentials: Option<Arc<dyn CredentialDecryptor>>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            db: None,
            credentials: None,
        }
    }
}

/// Per-invocation execution context: a mapping from name to value, seeded
/// by the trigger's context and augmented as the DAG executes with
/// `parent_result` / `parent_<id>_result` / `all_parent_results` (spec §3).
///
/// `values` is deep-copied whenever the context is forked for a child node;
/// `services` is shallow-shared via `Arc` per the carve-out in spec §9.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pub values: HashMap<String, Value>,
    pub services: Option<Arc<Services>>,
}

impl ExecutionContext {
    /// Seed a context from a trigger record's JSON context (spec §3).
    pub fn from_trigger(context: Value) -> Self {
        let mut values = HashMap::new();
        if let Value::Object(map) = context {
            for (k, v) in map {
                values.insert(k, v);
            }
        }
        Self {
            values,
            services: None,
        }
    }

    pub fn with_services(mut self, services: Arc<Services>) -> Self {
        self.services = Some(services);
        self
    }

    /// Fork this context for a child node: `values` is deep-copied (plain
    /// JSON clone), `services` is shallow-shared.
    pub fn fork(&self) -> Self {
        Self {
            values: self.values.clone(),
            services: self.services.clone(),
        }
    }

    /// Look up a dotted path (`a.b.c`) against `values`. The first segment
    /// indexes into `values`; subsequent segments index into the resulting
    /// JSON value as an object key. Any failed step resolves to `Value::Null`
    /// (spec §4.4 step 4).
    pub fn resolve_path(&self, path: &str) -> Value {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return Value::Null;
        };
        let Some(mut current) = self.values.get(first).cloned() else {
            return Value::Null;
        };
        for segment in segments {
            current = match current {
                Value::Object(ref map) => match map.get(segment) {
                    Some(v) => v.clone(),
                    None => return Value::Null,
                },
                _ => return Value::Null,
            };
        }
        current
    }

    /// The JSON-serializable view of this context: `services` never
    /// crosses a serialization boundary (spec §9).
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone().into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_trigger_seeds_values_from_object() {
        let ctx = ExecutionContext::from_trigger(serde_json::json!({"email": "x@y"}));
        assert_eq!(ctx.values.get("email").unwrap(), "x@y");
    }

    #[test]
    fn resolve_path_walks_nested_objects() {
        let mut ctx = ExecutionContext::default();
        ctx.values.insert(
            "parent_result".to_string(),
            serde_json::json!({"email": "x@y"}),
        );
        assert_eq!(ctx.resolve_path("parent_result.email"), "x@y");
    }

    #[test]
    fn resolve_path_missing_segment_is_null() {
        let mut ctx = ExecutionContext::default();
        ctx.values
            .insert("parent_result".to_string(), serde_json::json!({}));
        assert_eq!(ctx.resolve_path("parent_result.missing"), Value::Null);
        assert_eq!(ctx.resolve_path("nonexistent"), Value::Null);
    }

    #[test]
    fn fork_deep_copies_values_but_shares_services() {
        let services = Arc::new(Services::default());
        let mut ctx = ExecutionContext::default().with_services(services.clone());
        ctx.values.insert("a".to_string(), serde_json::json!(1));

        let mut child = ctx.fork();
        child.values.insert("b".to_string(), serde_json::json!(2));

        assert!(!ctx.values.contains_key("b"));
        assert!(Arc::ptr_eq(
            ctx.services.as_ref().unwrap(),
            child.services.as_ref().unwrap()
        ));
    }
}
