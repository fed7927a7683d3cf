//! Process configuration - a typed settings struct populated from
//! environment variables at startup, following the teacher's inline
//! `DATABASE_URL` lookup pattern in `jobs-runner/src/main.rs`, generalized
//! into a reusable struct since both binaries (scheduler, trigger worker)
//! share the same knobs (spec §6.1).

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub database_url: String,
    pub webhook_public_url: Option<String>,
    pub trigger_consumer_group: String,
    pub executor_parallelism: usize,
}

impl Config {
    /// Load from the environment. `REDIS_URL` and `DATABASE_URL` are
    /// required; everything else has a sensible default. Missing required
    /// variables are a startup-time error, not a panic.
    pub fn from_env() -> Result<Self> {
        let redis_url = std::env::var("REDIS_URL").context("REDIS_URL must be set")?;
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let webhook_public_url = std::env::var("WEBHOOK_PUBLIC_URL").ok();

        let trigger_consumer_group = std::env::var("TRIGGER_CONSUMER_GROUP")
            .unwrap_or_else(|_| "workflow_group".to_string());

        let executor_parallelism = std::env::var("EXECUTOR_PARALLELISM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(core_node_engine::DEFAULT_PARALLELISM);

        Ok(Self {
            redis_url,
            database_url,
            webhook_public_url,
            trigger_consumer_group,
            executor_parallelism,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable tests must not run concurrently with each
    // other (they mutate shared process state).
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_redis_url_is_a_descriptive_error_not_a_panic() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("REDIS_URL");
        std::env::remove_var("DATABASE_URL");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("REDIS_URL"));
    }

    #[test]
    fn defaults_are_applied_when_optional_vars_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("REDIS_URL", "redis://localhost:6379");
        std::env::set_var("DATABASE_URL", "postgres://localhost/test");
        std::env::remove_var("TRIGGER_CONSUMER_GROUP");
        std::env::remove_var("EXECUTOR_PARALLELISM");

        let config = Config::from_env().unwrap();
        assert_eq!(config.trigger_consumer_group, "workflow_group");
        assert_eq!(config.executor_parallelism, core_node_engine::DEFAULT_PARALLELISM);

        std::env::remove_var("REDIS_URL");
        std::env::remove_var("DATABASE_URL");
    }
}
