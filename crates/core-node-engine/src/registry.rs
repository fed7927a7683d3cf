//! Node handler registry (action side) - spec §4.5.
//!
//! A process-global map from node category string to action implementation.
//! Lookup by an unknown category fails fast; everything else the executor
//! does is substitutable through this one seam.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::context::ExecutionContext;
use crate::error::NodeEngineError;

/// One action implementation, keyed into the registry by node category.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self, config: Value, ctx: &ExecutionContext) -> Result<Value, NodeEngineError>;
}

/// Strategy table mapping node category to action handler. Built once at
/// process start (spec §4.5) - there is no runtime registration API beyond
/// the builder used during setup.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, category: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(category.into(), handler);
        self
    }

    /// The built-in action categories this repository implements, generalized
    /// away from any one vendor's concrete API surface (spec §4.5): each is
    /// a stub side effect that logs the action and returns a descriptive
    /// JSON result, exactly as a handler whose real I/O is out of scope.
    pub fn with_builtins() -> Self {
        Self::new()
            .register("set_field", Arc::new(SetFieldHandler))
            .register("send_email", Arc::new(SendEmailHandler))
            .register("send_sms", Arc::new(SendSmsHandler))
            .register("send_webhook", Arc::new(SendWebhookHandler))
            .register("condition_if", Arc::new(ConditionIfHandler))
            .register("delay", Arc::new(DelayHandler))
            .register("ai_generate", Arc::new(AiGenerateHandler))
    }

    pub fn get(&self, category: &str) -> Result<Arc<dyn ActionHandler>, NodeEngineError> {
        self.handlers
            .get(category)
            .cloned()
            .ok_or_else(|| NodeEngineError::UnknownCategory(category.to_string()))
    }
}

struct SetFieldHandler;

#[async_trait]
impl ActionHandler for SetFieldHandler {
    async fn run(&self, config: Value, _ctx: &ExecutionContext) -> Result<Value, NodeEngineError> {
        info!(?config, "set_field");
        Ok(serde_json::json!({"status": "ok", "fields": config}))
    }
}

struct SendEmailHandler;

#[async_trait]
impl ActionHandler for SendEmailHandler {
    async fn run(&self, config: Value, _ctx: &ExecutionContext) -> Result<Value, NodeEngineError> {
        let to = config.get("to").cloned().unwrap_or(Value::Null);
        info!(?to, "send_email (stub)");
        Ok(serde_json::json!({"status": "ok", "to": to, "sent": true}))
    }
}

struct SendSmsHandler;

#[async_trait]
impl ActionHandler for SendSmsHandler {
    async fn run(&self, config: Value, _ctx: &ExecutionContext) -> Result<Value, NodeEngineError> {
        let to = config.get("to").cloned().unwrap_or(Value::Null);
        info!(?to, "send_sms (stub)");
        Ok(serde_json::json!({"status": "ok", "to": to, "sent": true}))
    }
}

struct SendWebhookHandler;

#[async_trait]
impl ActionHandler for SendWebhookHandler {
    async fn run(&self, config: Value, _ctx: &ExecutionContext) -> Result<Value, NodeEngineError> {
        let url = config.get("url").cloned().unwrap_or(Value::Null);
        info!(?url, "send_webhook (stub)");
        Ok(serde_json::json!({"status": "ok", "url": url, "delivered": true}))
    }
}

struct ConditionIfHandler;

#[async_trait]
impl ActionHandler for ConditionIfHandler {
    async fn run(&self, config: Value, _ctx: &ExecutionContext) -> Result<Value, NodeEngineError> {
        let passed = config
            .get("expression")
            .map(|v| !matches!(v, Value::Null | Value::Bool(false)))
            .unwrap_or(false);
        Ok(serde_json::json!({"status": if passed { "true" } else { "false" }, "passed": passed}))
    }
}

struct DelayHandler;

#[async_trait]
impl ActionHandler for DelayHandler {
    async fn run(&self, config: Value, _ctx: &ExecutionContext) -> Result<Value, NodeEngineError> {
        let seconds = config.get("seconds").and_then(|v| v.as_u64()).unwrap_or(0);
        tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
        Ok(serde_json::json!({"status": "ok", "delayed_seconds": seconds}))
    }
}

struct AiGenerateHandler;

#[async_trait]
impl ActionHandler for AiGenerateHandler {
    async fn run(&self, config: Value, _ctx: &ExecutionContext) -> Result<Value, NodeEngineError> {
        let prompt = config.get("prompt").cloned().unwrap_or(Value::Null);
        info!(?prompt, "ai_generate (stub)");
        Ok(serde_json::json!({"status": "ok", "prompt": prompt, "completion": "<stubbed completion>"}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_category_is_fast_failure() {
        let registry = ActionRegistry::with_builtins();
        assert!(matches!(
            registry.get("not_a_real_category"),
            Err(NodeEngineError::UnknownCategory(_))
        ));
    }

    #[tokio::test]
    async fn set_field_echoes_config() {
        let registry = ActionRegistry::with_builtins();
        let handler = registry.get("set_field").unwrap();
        let ctx = ExecutionContext::default();
        let result = handler
            .run(serde_json::json!({"name": "x"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result["status"], "ok");
    }

    #[tokio::test]
    async fn condition_if_reflects_truthy_expression() {
        let registry = ActionRegistry::with_builtins();
        let handler = registry.get("condition_if").unwrap();
        let ctx = ExecutionContext::default();
        let result = handler
            .run(serde_json::json!({"expression": true}), &ctx)
            .await
            .unwrap();
        assert_eq!(result["status"], "true");
    }
}
