//! Core Scheduler - the durable schedule store, trigger stream
//! dispatcher, trigger-handler registry, and the scheduler/worker
//! runtimes built on top of them (spec §4.2, §4.3, §4.6).

pub mod config;
pub mod error;
pub mod scheduler;
pub mod store;
pub mod stream;
pub mod trigger_handlers;
pub mod worker;

pub use config::Config;
pub use error::SchedulerError;
pub use scheduler::{SchedulerRunner, DEFAULT_TICK_INTERVAL};
pub use store::{InMemoryScheduleStore, RedisScheduleStore, ScheduleStore};
pub use stream::{InMemoryTriggerStream, RedisTriggerStream, StreamEntry, TriggerStream};
pub use trigger_handlers::{
    SchedulerTriggerHandler, TriggerHandler, TriggerHandlerRegistry, WebhookBotTriggerHandler,
};
pub use worker::{TriggerWorker, DEFAULT_IDLE_THRESHOLD, DEFAULT_RECLAIM_INTERVAL};
