//! Content-addressed, append-only audit log.
//!
//! Every tool invocation and backend call in a run is persisted with a
//! deterministic SHA-256 fingerprint over its canonical serialization, making
//! each record independently verifiable and giving callers a tamper-evidence
//! token.

pub mod fingerprint;
pub mod store;


pub use fingerprint::compute_fingerprint;
pub use store::{AuditStore, RunSummary, StepRecord};
