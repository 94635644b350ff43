//! Context envelope — the bounded, structured bundle handed to a reasoning
//! backend.
//!
//! The builder only assembles records the orchestrator already produced and
//! audited; every tool-output snippet must carry the fingerprint of its
//! persisted step record. An empty fingerprint is a programming error and
//! fails the build immediately.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::ids::{EnvelopeId, Fingerprint};
use crate::step::StepRef;

/// Truncation marker appended to over-cap snippets.
pub const TRUNCATION_MARKER: &str = "...";

// ============================================================================
// Envelope types
// ============================================================================

/// A named text slot with its origin.
#[derive(Debug, Clone, Serialize)]
pub struct SlotContent {
    pub content: String,
    pub source: String,
    pub ts: DateTime<Utc>,
}

/// One capped tool-output snippet, tied back to its audit record.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutputSlot {
    pub step: StepRef,
    pub snippet: String,
    pub audit_hash: Fingerprint,
}

#[derive(Debug, Clone, Serialize)]
pub struct Slots {
    pub system_instructions: SlotContent,
    pub user_query: SlotContent,
    pub tool_outputs: Vec<ToolOutputSlot>,
}

/// Provenance reference: which tool ran for which entity, and the fingerprint
/// of the resulting step record.
#[derive(Debug, Clone, Serialize)]
pub struct ProvenanceRef {
    pub tool: String,
    pub symbol: String,
    pub audit_hash: Fingerprint,
}

/// The unit handed to a reasoning backend. Never mutated after handoff.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub envelope_id: EnvelopeId,
    pub user_id: String,
    pub session_id: String,
    pub slots: Slots,
    pub provenance: Vec<ProvenanceRef>,
    pub created_at: DateTime<Utc>,
}

/// Input to the builder: a tool output that has already been audited.
#[derive(Debug, Clone)]
pub struct AuditedToolOutput {
    pub step: StepRef,
    pub tool: String,
    pub detail: Value,
    pub fingerprint: Fingerprint,
}

// ============================================================================
// Builder
// ============================================================================

pub struct EnvelopeBuilder {
    snippet_cap: usize,
    user_id: String,
}

impl EnvelopeBuilder {
    pub fn new(snippet_cap: usize) -> Self {
        Self {
            snippet_cap,
            user_id: "ui".to_string(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Assemble an envelope from already-audited tool outputs.
    ///
    /// Fails if any output carries an empty fingerprint — the envelope is
    /// never built from un-audited data.
    pub fn build(
        &self,
        system_instructions: &str,
        user_query: &str,
        outputs: &[AuditedToolOutput],
    ) -> Result<Envelope> {
        let now = Utc::now();

        let mut tool_outputs = Vec::with_capacity(outputs.len());
        let mut provenance = Vec::with_capacity(outputs.len());

        for output in outputs {
            if output.fingerprint.is_empty() {
                bail!(
                    "tool output {} has no audit fingerprint; refusing to build envelope",
                    output.step
                );
            }

            let snippet = truncate_snippet(serialize_detail(&output.detail), self.snippet_cap);
            tool_outputs.push(ToolOutputSlot {
                step: output.step.clone(),
                snippet,
                audit_hash: output.fingerprint.clone(),
            });
            provenance.push(ProvenanceRef {
                tool: output.tool.clone(),
                symbol: output.step.symbol.clone(),
                audit_hash: output.fingerprint.clone(),
            });
        }

        Ok(Envelope {
            envelope_id: EnvelopeId::generate(),
            user_id: self.user_id.clone(),
            session_id: format!("sess-{}", uuid::Uuid::new_v4().simple()),
            slots: Slots {
                system_instructions: SlotContent {
                    content: system_instructions.to_string(),
                    source: "system".to_string(),
                    ts: now,
                },
                user_query: SlotContent {
                    content: user_query.to_string(),
                    source: "user".to_string(),
                    ts: now,
                },
                tool_outputs,
            },
            provenance,
            created_at: now,
        })
    }
}

/// Canonical string form of a tool output: strings verbatim, everything else
/// compact JSON.
fn serialize_detail(detail: &Value) -> String {
    match detail {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Cap a snippet at `cap` characters, cutting at the nearest char boundary at
/// or below the cap, and append the truncation marker.
fn truncate_snippet(snippet: String, cap: usize) -> String {
    if snippet.chars().count() <= cap {
        return snippet;
    }
    let mut cut: String = snippet.chars().take(cap).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Stage;
    use proptest::prelude::*;
    use serde_json::json;

    fn output(symbol: &str, stage: Stage, detail: Value, fp: &str) -> AuditedToolOutput {
        AuditedToolOutput {
            step: StepRef::new(symbol, stage),
            tool: stage.tool_name().to_string(),
            detail,
            fingerprint: Fingerprint::from_hex(fp),
        }
    }

    #[test]
    fn test_build_links_slots_to_provenance() {
        let builder = EnvelopeBuilder::new(2000);
        let outputs = vec![
            output("AAPL", Stage::Quote, json!({"price": 150.0}), "aa11"),
            output("AAPL", Stage::History, json!({"points": 20}), "bb22"),
        ];
        let envelope = builder.build("be careful", "analyze", &outputs).unwrap();

        assert_eq!(envelope.slots.tool_outputs.len(), 2);
        assert_eq!(envelope.provenance.len(), 2);
        assert_eq!(envelope.provenance[0].tool, "get_quote");
        assert_eq!(envelope.provenance[0].symbol, "AAPL");
        assert_eq!(
            envelope.slots.tool_outputs[0].audit_hash,
            envelope.provenance[0].audit_hash
        );
        assert_eq!(envelope.slots.system_instructions.content, "be careful");
        assert_eq!(envelope.slots.user_query.content, "analyze");
        assert!(envelope.envelope_id.as_str().starts_with("env-"));
    }

    #[test]
    fn test_empty_fingerprint_fails_fast() {
        let builder = EnvelopeBuilder::new(2000);
        let outputs = vec![output("AAPL", Stage::Quote, json!({}), "")];
        let err = builder.build("", "q", &outputs).unwrap_err();
        assert!(err.to_string().contains("no audit fingerprint"));
    }

    #[test]
    fn test_over_cap_snippet_is_truncated_with_marker() {
        let builder = EnvelopeBuilder::new(2000);
        let long = "x".repeat(5000);
        let outputs = vec![output("AAPL", Stage::Quote, Value::String(long), "aa")];
        let envelope = builder.build("", "q", &outputs).unwrap();
        let snippet = &envelope.slots.tool_outputs[0].snippet;
        assert_eq!(snippet.chars().count(), 2000 + TRUNCATION_MARKER.len());
        assert!(snippet.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_under_cap_snippet_is_verbatim() {
        let builder = EnvelopeBuilder::new(2000);
        let outputs = vec![output(
            "AAPL",
            Stage::Quote,
            Value::String("short output".to_string()),
            "aa",
        )];
        let envelope = builder.build("", "q", &outputs).unwrap();
        assert_eq!(envelope.slots.tool_outputs[0].snippet, "short output");
    }

    #[test]
    fn test_truncation_respects_multibyte_boundaries() {
        // 4-byte characters; a byte-index cut would panic or split a char.
        let text: String = "𝛼".repeat(100);
        let truncated = truncate_snippet(text, 50);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncated.chars().count(), 50 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_non_string_detail_serialized_as_json() {
        let builder = EnvelopeBuilder::new(2000);
        let outputs = vec![output("MSFT", Stage::Fundamentals, json!({"beta": 1.2}), "cc")];
        let envelope = builder.build("", "q", &outputs).unwrap();
        assert_eq!(envelope.slots.tool_outputs[0].snippet, r#"{"beta":1.2}"#);
    }

    proptest! {
        #[test]
        fn prop_truncation_never_exceeds_cap(s in "\\PC*", cap in 1usize..64) {
            let out = truncate_snippet(s.clone(), cap);
            let char_count = out.chars().count();
            prop_assert!(char_count <= cap + TRUNCATION_MARKER.len());
            if s.chars().count() > cap {
                prop_assert!(out.ends_with(TRUNCATION_MARKER));
            } else {
                prop_assert_eq!(out, s);
            }
        }
    }
}
