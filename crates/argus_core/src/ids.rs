//! Identifiers used across the orchestrator.
//!
//! Run ids are caller-supplied or generated with a short uuid suffix so that
//! audit queries stay readable. Fingerprints are hex SHA-256 digests computed
//! by the audit crate; the newtype keeps them from being confused with other
//! strings in envelope provenance.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for one top-level run/request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh run id of the form `mcp_<8 hex chars>`.
    pub fn generate() -> Self {
        Self(format!("mcp_{}", short_hex()))
    }

    /// Wrap a caller-supplied id verbatim.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a context envelope (`env-<8 hex chars>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvelopeId(String);

impl EnvelopeId {
    pub fn generate() -> Self {
        Self(format!("env-{}", short_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-encoded SHA-256 content fingerprint of an audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already hex-encoded digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn short_hex() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_run_id_shape() {
        let id = RunId::generate();
        assert!(id.as_str().starts_with("mcp_"));
        assert_eq!(id.as_str().len(), "mcp_".len() + 8);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_caller_supplied_id_is_verbatim() {
        let id = RunId::new("req-42");
        assert_eq!(id.as_str(), "req-42");
        assert_eq!(id.to_string(), "req-42");
    }

    #[test]
    fn test_envelope_id_prefix() {
        let id = EnvelopeId::generate();
        assert!(id.as_str().starts_with("env-"));
    }

    #[test]
    fn test_fingerprint_serializes_transparent() {
        let fp = Fingerprint::from_hex("ab12");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, "\"ab12\"");
    }
}
