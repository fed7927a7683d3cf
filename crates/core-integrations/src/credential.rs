//! Default `CredentialDecryptor` backing the `core_node_engine::Services`
//! bag. Cryptography is out of scope for the executor (spec §1) - this is
//! one illustrative implementation behind that narrow trait, keyed from
//! `SECRET_KEY` / `CREDENTIALS_SECRET_KEY` (spec §6).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use core_node_engine::{CredentialDecryptor, NodeEngineError};

use crate::encryption;

pub struct AesGcmCredentialDecryptor {
    key: [u8; 32],
}

impl AesGcmCredentialDecryptor {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Load the key from `SECRET_KEY` (falling back to
    /// `CREDENTIALS_SECRET_KEY`), base64-decoded to 32 bytes.
    pub fn from_env() -> anyhow::Result<Self> {
        let raw = std::env::var("SECRET_KEY")
            .or_else(|_| std::env::var("CREDENTIALS_SECRET_KEY"))
            .map_err(|_| anyhow::anyhow!("SECRET_KEY or CREDENTIALS_SECRET_KEY must be set"))?;

        let decoded = STANDARD
            .decode(&raw)
            .map_err(|e| anyhow::anyhow!("SECRET_KEY is not valid base64: {e}"))?;
        let key: [u8; 32] = decoded
            .try_into()
            .map_err(|_| anyhow::anyhow!("SECRET_KEY must decode to exactly 32 bytes"))?;

        Ok(Self::new(key))
    }
}

impl CredentialDecryptor for AesGcmCredentialDecryptor {
    fn decrypt(&self, ciphertext: &str) -> Result<String, NodeEngineError> {
        let bytes = STANDARD.decode(ciphertext).map_err(|e| {
            NodeEngineError::NodeExecutionFailed {
                node_id: 0,
                message: format!("credential is not valid base64: {e}"),
            }
        })?;
        let plaintext = encryption::decrypt(&bytes, &self.key).map_err(|e| {
            NodeEngineError::NodeExecutionFailed {
                node_id: 0,
                message: format!("credential decryption failed: {e}"),
            }
        })?;
        String::from_utf8(plaintext).map_err(|e| NodeEngineError::NodeExecutionFailed {
            node_id: 0,
            message: format!("decrypted credential is not valid UTF-8: {e}"),
        })
    }
}
