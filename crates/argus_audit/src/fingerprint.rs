//! Deterministic content fingerprints.
//!
//! The fingerprint is SHA-256 over the JCS (RFC 8785) canonical serialization
//! of `{run_id, action, payload}`. Canonicalization sorts object keys, so two
//! payloads with the same content but different field order hash identically.

use argus_core::{ArgusError, Fingerprint, RunId};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Compute the fingerprint for one audit record.
pub fn compute_fingerprint(
    run_id: &RunId,
    action: &str,
    payload: &Value,
) -> Result<Fingerprint, ArgusError> {
    let document = json!({
        "run_id": run_id.as_str(),
        "action": action,
        "payload": payload,
    });
    let canonical = serde_jcs::to_vec(&document)
        .map_err(|e| ArgusError::Persistence(format!("canonical serialization failed: {e}")))?;
    let digest = Sha256::digest(&canonical);
    Ok(Fingerprint::from_hex(format!("{digest:x}")))
}
