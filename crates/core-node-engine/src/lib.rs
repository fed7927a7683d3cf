//! Core Node Engine - the DAG executor and action-handler registry
//! (spec §4.4, §4.5): per-invocation concurrent evaluation of a workflow's
//! node graph with join synchronization and template resolution.

pub mod context;
pub mod error;
pub mod executor;
pub mod registry;
pub mod repository;
pub mod template;

pub use context::{CredentialDecryptor, ExecutionContext, Services};
pub use error::NodeEngineError;
pub use executor::{GraphExecutor, DEFAULT_PARALLELISM};
pub use registry::{ActionHandler, ActionRegistry};
pub use repository::{InMemoryWorkflowRepository, PgWorkflowRepository, WorkflowRepository};
pub use template::resolve_config;
