//! Tool abstraction types — shared between the registry, the orchestrator,
//! and the gateway so that none of them needs a reverse dependency on the
//! registry crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sensitivity tier advertised in the tool manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    #[default]
    Low,
    Medium,
    High,
}

/// A callable tool with schema-described parameters.
///
/// Implementors must be reentrant: the registry does not serialize calls and
/// the same tool may be invoked concurrently for different symbols.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used for registration and dispatch.
    fn name(&self) -> &str;

    /// Human-readable description for the manifest.
    fn description(&self) -> &str;

    /// JSON Schema the arguments are validated against before invocation.
    fn params_schema(&self) -> Value;

    /// Optional JSON Schema describing the output shape.
    fn output_schema(&self) -> Option<Value> {
        None
    }

    fn sensitivity(&self) -> Sensitivity {
        Sensitivity::Low
    }

    /// Execute with already-validated arguments.
    async fn execute(&self, args: &Value) -> anyhow::Result<Value>;
}

/// Manifest entry for one registered tool. Never exposes the callable.
#[derive(Debug, Clone, Serialize)]
pub struct ToolManifestEntry {
    pub name: String,
    pub description: String,
    pub params_schema: Value,
    pub sensitivity: Sensitivity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitivity_serde() {
        assert_eq!(
            serde_json::to_string(&Sensitivity::Low).unwrap(),
            "\"low\""
        );
        let tier: Sensitivity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(tier, Sensitivity::High);
    }

    #[test]
    fn test_manifest_entry_has_no_callable() {
        let entry = ToolManifestEntry {
            name: "get_quote".to_string(),
            description: "Get current quote".to_string(),
            params_schema: serde_json::json!({"type": "object"}),
            sensitivity: Sensitivity::Low,
        };
        let value = serde_json::to_value(&entry).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
    }
}
