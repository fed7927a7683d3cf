//! `{{ dotted.path }}` template resolution (spec §4.4 step 4, §6).
//!
//! A config field is a template iff, after trimming surrounding
//! whitespace, its entire string value is wrapped in `{{ }}` - anything
//! else (including a string with a template only partway through) passes
//! through unchanged. There is no operator or filter syntax, and nested
//! templates are explicitly a non-goal (spec §9).

use serde_json::Value;

use crate::context::ExecutionContext;

/// Resolve one config value against `ctx`, recursing into objects and
/// arrays. Strings matching the template shape are replaced by the
/// resolved path value (`Value::Null` on any lookup failure); all other
/// values are returned unchanged.
pub fn resolve_config(config: &Value, ctx: &ExecutionContext) -> Value {
    match config {
        Value::String(s) => match template_path(s) {
            Some(path) => ctx.resolve_path(path),
            None => Value::String(s.clone()),
        },
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_config(v, ctx)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_config(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// If `s`, once trimmed, is exactly `{{ <path> }}`, return the trimmed
/// inner path. Otherwise `None`.
fn template_path(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    Some(inner.trim())
}
