//! Core Models - Shared domain types for the workflow engine
//!
//! This crate contains the shared structs and enums describing a workflow's
//! graph, its schedules, its pending trigger invocations, and the
//! control-plane events published around its lifecycle. It is the single
//! source of truth for these shapes across the node engine, the
//! integrations crate, and the background runner binaries.

pub mod event;
pub mod node;
pub mod schedule;
pub mod trigger;

pub use event::*;
pub use node::*;
pub use schedule::*;
pub use trigger::*;
