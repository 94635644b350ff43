//! Local multi-role emulation of the workflow backend.
//!
//! Each analytical role (technical, fundamental) gets one chat-completion
//! call constrained to a declared JSON shape. A response that fails to parse
//! degrades to a stand-in carrying the truncated raw text — it never aborts
//! the dispatch.

use anyhow::Result;
use argus_core::Envelope;
use serde_json::{json, Value};

use crate::chat::{ChatBackend, ChatMessage, ChatParams};

/// Outcome of parsing one role's model response.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleParse {
    Parsed(Value),
    Degraded { raw: String, reason: String },
}

/// Parse a model response that was asked for strict JSON.
pub fn parse_role_response(content: &str) -> RoleParse {
    match serde_json::from_str::<Value>(content.trim()) {
        Ok(value) if value.is_object() => RoleParse::Parsed(value),
        Ok(other) => RoleParse::Degraded {
            raw: content.to_string(),
            reason: format!("expected a JSON object, got {}", json_type_name(&other)),
        },
        Err(e) => RoleParse::Degraded {
            raw: content.to_string(),
            reason: format!("not valid JSON: {e}"),
        },
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One analytical role of the emulated workflow.
struct AnalystRole {
    name: &'static str,
    system_prompt: &'static str,
    report_key: &'static str,
    /// Keys of the structured fields that stay empty in a degraded stand-in.
    empty_fields: &'static [(&'static str, fn() -> Value)],
}

fn empty_array() -> Value {
    json!([])
}

fn empty_object() -> Value {
    json!({})
}

fn empty_string() -> Value {
    json!("")
}

const ROLES: [AnalystRole; 2] = [
    AnalystRole {
        name: "technical",
        system_prompt: "You are a Technical Analysis agent. Return strictly JSON with keys: \
            technical_report (markdown), technical_signals (array of {name,value,confidence}), \
            chart_actions (list), confidence (0-1).",
        report_key: "technical_report",
        empty_fields: &[
            ("technical_signals", empty_array),
            ("chart_actions", empty_array),
        ],
    },
    AnalystRole {
        name: "fundamental",
        system_prompt: "You are a Fundamental Analysis agent. Return strictly JSON with keys: \
            fundamental_report (markdown), fundamental_metrics (object), thesis (string), \
            actions (list), confidence (0-1).",
        report_key: "fundamental_report",
        empty_fields: &[
            ("fundamental_metrics", empty_object),
            ("thesis", empty_string),
            ("actions", empty_array),
        ],
    },
];

/// Sections produced by one emulation pass.
#[derive(Debug, Clone)]
pub struct EmulatedSections {
    pub technical: Value,
    pub fundamental: Value,
}

/// Run every role against the packed envelope and assemble the sections.
pub async fn emulate(chat: &dyn ChatBackend, envelope: &Envelope) -> Result<EmulatedSections> {
    let envelope_text = pack_envelope_text(envelope);
    let params = ChatParams::default();

    let mut sections = Vec::with_capacity(ROLES.len());
    for role in &ROLES {
        let messages = [
            ChatMessage::system(role.system_prompt),
            ChatMessage::user(format!(
                "ENVELOPE:\n\n{envelope_text}\n\nRespond with JSON as described."
            )),
        ];
        let reply = chat.chat(&messages, &params).await?;

        let section = match parse_role_response(&reply.content) {
            RoleParse::Parsed(value) => value,
            RoleParse::Degraded { raw, reason } => {
                tracing::warn!("{} role response degraded: {}", role.name, reason);
                degraded_section(role, &raw, &reason)
            }
        };
        sections.push(section);
    }

    let mut iter = sections.into_iter();
    Ok(EmulatedSections {
        technical: iter.next().unwrap_or_else(|| json!({})),
        fundamental: iter.next().unwrap_or_else(|| json!({})),
    })
}

/// Minimal structured stand-in for a role whose response did not parse.
fn degraded_section(role: &AnalystRole, raw: &str, reason: &str) -> Value {
    let preview: String = raw.chars().take(800).collect();
    let mut section = json!({
        role.report_key: preview,
        "confidence": 0.5,
        "degraded": reason,
    });
    for (key, empty) in role.empty_fields {
        section[*key] = empty();
    }
    section
}

/// Compact text rendering of an envelope for emulation prompts.
pub fn pack_envelope_text(envelope: &Envelope) -> String {
    let mut parts = Vec::new();
    let slots = &envelope.slots;

    if !slots.system_instructions.content.is_empty() {
        parts.push(format!(
            "SYSTEM: {}",
            shorten(&slots.system_instructions.content, 800)
        ));
    }
    if !slots.user_query.content.is_empty() {
        parts.push(format!(
            "USER QUERY: {}",
            shorten(&slots.user_query.content, 800)
        ));
    }
    for output in &slots.tool_outputs {
        parts.push(format!("{}: {}", output.step, shorten(&output.snippet, 800)));
    }

    parts.join("\n\n")
}

/// Shorten to at most `max_chars`, preferring a sentence boundary when one
/// falls in the back 40% of the window.
fn shorten(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }

    let cut: String = trimmed.chars().take(max_chars).collect();
    // Byte offset of the 60% char mark; rfind yields byte offsets, so the
    // comparison must not mix them with char counts.
    let min_end = cut
        .char_indices()
        .nth(max_chars * 6 / 10)
        .map(|(i, _)| i)
        .unwrap_or(cut.len());
    match cut.rfind(['.', '!', '?']) {
        Some(pos) if pos >= min_end => format!("{} ...", &cut[..=pos]),
        _ => format!("{cut} ..."),
    }
}
