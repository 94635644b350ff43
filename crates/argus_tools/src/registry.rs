//! Tool registry.
//!
//! An explicit registry object constructed once at startup and passed by
//! reference — no global mutable state. Arguments are validated against each
//! tool's parameter schema before the callable runs, so a rejected call has
//! no side effects.

use std::collections::HashMap;
use std::sync::Arc;

use argus_core::{ArgusError, Tool, ToolManifestEntry};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

struct Registration {
    tool: Arc<dyn Tool>,
    schema: Value,
    compiled: JSONSchema,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Registration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Re-registering a name is an error; silent overwrite
    /// would let one tool shadow another's audit trail.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ArgusError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ArgusError::DuplicateTool(name));
        }

        let schema = tool.params_schema();
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .map_err(|e| ArgusError::SchemaValidation {
                field: "params_schema".to_string(),
                message: format!("tool '{name}' has an invalid schema: {e}"),
            })?;

        tracing::debug!("Registered tool: {}", name);
        self.tools.insert(
            name,
            Registration {
                tool,
                schema,
                compiled,
            },
        );
        Ok(())
    }

    /// Validate `args` against the tool's schema, then invoke it.
    pub async fn call(&self, name: &str, args: &Value) -> Result<Value, ArgusError> {
        let registration = self
            .tools
            .get(name)
            .ok_or_else(|| ArgusError::ToolNotFound(name.to_string()))?;

        if let Err(mut errors) = registration.compiled.validate(args) {
            // Report the first violation; the rest usually cascade from it.
            let first = errors.next();
            let (field, message) = match first {
                Some(err) => {
                    let path = err.instance_path.to_string();
                    let field = if path.is_empty() { "params".to_string() } else { path };
                    (field, err.to_string())
                }
                None => ("params".to_string(), "schema validation failed".to_string()),
            };
            return Err(ArgusError::SchemaValidation { field, message });
        }

        registration
            .tool
            .execute(args)
            .await
            .map_err(|e| ArgusError::ToolExecution {
                tool: name.to_string(),
                message: e.to_string(),
            })
    }

    /// Manifest of every registered tool. Never exposes the callables.
    pub fn manifest(&self) -> Vec<ToolManifestEntry> {
        let mut entries: Vec<ToolManifestEntry> = self
            .tools
            .values()
            .map(|r| ToolManifestEntry {
                name: r.tool.name().to_string(),
                description: r.tool.description().to_string(),
                params_schema: r.schema.clone(),
                sensitivity: r.tool.sensitivity(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}
