//! Structured step references.
//!
//! A step is identified by `{symbol, stage}`; the `"AAPL:quote"` form is
//! presentation only and never carries control-flow meaning.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::Fingerprint;

/// Pipeline stage within one symbol's tool sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Quote,
    Fundamentals,
    History,
}

impl Stage {
    /// All stages, in the execution order used by the orchestrator.
    pub const ALL: [Stage; 3] = [Stage::Quote, Stage::Fundamentals, Stage::History];

    /// Name of the registered tool that serves this stage.
    pub fn tool_name(self) -> &'static str {
        match self {
            Stage::Quote => "get_quote",
            Stage::Fundamentals => "fundamentals",
            Stage::History => "get_history",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Quote => "quote",
            Stage::Fundamentals => "fundamentals",
            Stage::History => "history",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to one step of a run: which entity, which stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepRef {
    pub symbol: String,
    pub stage: Stage,
}

impl StepRef {
    pub fn new(symbol: impl Into<String>, stage: Stage) -> Self {
        Self {
            symbol: symbol.into(),
            stage,
        }
    }

    /// Human-readable label, e.g. `AAPL:quote`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.stage)
    }
}

/// One entry in the step list returned to the caller.
///
/// Successful steps carry a detail snapshot and the fingerprint of their
/// persisted audit record; failed steps carry the error string instead.
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub step: StepRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_hash: Option<Fingerprint>,
    pub duration_ms: u64,
}

impl TraceStep {
    pub fn success(
        step: StepRef,
        detail: Value,
        audit_hash: Fingerprint,
        duration_ms: u64,
    ) -> Self {
        Self {
            step,
            detail: Some(detail),
            error: None,
            audit_hash: Some(audit_hash),
            duration_ms,
        }
    }

    pub fn failure(
        step: StepRef,
        error: String,
        audit_hash: Option<Fingerprint>,
        duration_ms: u64,
    ) -> Self {
        Self {
            step,
            detail: None,
            error: Some(error),
            audit_hash,
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
