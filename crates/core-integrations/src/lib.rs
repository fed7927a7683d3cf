//! Core Integrations - control-plane publisher, credential decryption, and
//! webhook-style trigger handlers (spec §4.1, §4.6, §9).
//!
//! This crate is the one place the core depends on an external transport
//! (Redis pub/sub) and an external HTTP call (webhook install/remove); the
//! scheduler and DAG executor never touch either directly.

pub mod control_plane;
pub mod credential;
pub mod encryption;
pub mod webhook;

pub use control_plane::{ControlPlanePublisher, ControlPlaneSubscriber};
pub use credential::AesGcmCredentialDecryptor;
pub use webhook::{ReqwestWebhookHandler, WebhookHandler, WebhookInstallError};
