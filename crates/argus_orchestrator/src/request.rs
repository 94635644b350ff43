//! Analyze request/response DTOs.

use argus_backend::BackendResult;
use argus_core::{Envelope, TraceStep};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_symbols() -> Vec<String> {
    vec!["AAPL".to_string()]
}

/// An analysis request as submitted by a caller.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    /// Caller-supplied run id; one is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    /// Remote workflow name; falls back to the configured default.
    #[serde(default)]
    pub workflow: Option<String>,
    /// Opaque extra parameters, recorded in the audit trail.
    #[serde(default)]
    pub params: Option<Value>,
}

impl Default for AnalyzeRequest {
    fn default() -> Self {
        Self {
            id: None,
            system_prompt: None,
            query: None,
            symbols: default_symbols(),
            workflow: None,
            params: None,
        }
    }
}

impl AnalyzeRequest {
    pub fn for_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Everything one run produced, returned to the caller.
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub id: String,
    pub steps: Vec<TraceStep>,
    pub envelope: Envelope,
    pub backend: BackendResult,
    /// Fingerprint of the closing audit record for the whole run.
    pub audit_hash: String,
}
