use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArgusConfig {
    pub audit: AuditConfig,
    pub backend: BackendConfig,
    pub envelope: EnvelopeConfig,
    pub market: MarketConfig,
    pub gateway: GatewayConfig,
}

impl ArgusConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: ArgusConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env
    /// overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ARGUS_AUDIT_DB") {
            self.audit.db_path = v;
        }
        if let Ok(v) = std::env::var("LANGGRAPH_BASE") {
            self.backend.workflow_base = v;
        }
        if let Ok(v) = std::env::var("GROQ_CHAT_URL") {
            self.backend.chat_url = v;
        }
        if let Ok(v) = std::env::var("GROQ_MODEL") {
            self.backend.chat_model = v;
        }
        if let Ok(v) = std::env::var("ARGUS_REMOTE_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.backend.remote_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("ARGUS_SNIPPET_CAP") {
            if let Ok(n) = v.parse() {
                self.envelope.snippet_cap = n;
            }
        }
        if let Ok(v) = std::env::var("MCP_API_KEY") {
            self.gateway.api_key = v;
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_PER_MIN") {
            if let Ok(n) = v.parse() {
                self.gateway.rate_limit_per_min = n;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// SQLite database file for the audit log.
    pub db_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            db_path: "mcp_audit.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the remote workflow engine.
    pub workflow_base: String,
    /// Workflow invoked when a request does not name one.
    pub default_workflow: String,
    /// OpenAI-compatible chat completions endpoint used for local emulation.
    pub chat_url: String,
    pub chat_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Bound on the remote workflow call; expiry falls through to emulation.
    pub remote_timeout_secs: u64,
    /// Bound on each chat-completion call.
    pub chat_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            workflow_base: "https://api.langgraph.com/v1".to_string(),
            default_workflow: "stock-analysis".to_string(),
            chat_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            chat_model: "openai/gpt-oss-120b".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            remote_timeout_secs: 90,
            chat_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Maximum characters per tool-output snippet before truncation.
    pub snippet_cap: usize,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self { snippet_cap: 2000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Base URL of the market data provider.
    pub base_url: String,
    pub timeout_secs: u64,
    pub default_period: String,
    pub default_interval: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            timeout_secs: 20,
            default_period: "1mo".to_string(),
            default_interval: "1d".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Accepted API key. A single-key deployment, matching the source system.
    pub api_key: String,
    pub rate_limit_per_min: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            api_key: "dev-local-key".to_string(),
            rate_limit_per_min: 120,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ArgusConfig::default();
        assert_eq!(cfg.audit.db_path, "mcp_audit.db");
        assert_eq!(cfg.envelope.snippet_cap, 2000);
        assert_eq!(cfg.backend.default_workflow, "stock-analysis");
        assert_eq!(cfg.gateway.rate_limit_per_min, 120);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[audit]
db_path = "audit-test.db"
"#;
        let cfg: ArgusConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.audit.db_path, "audit-test.db");
        // Defaults for unspecified fields
        assert_eq!(cfg.envelope.snippet_cap, 2000);
        assert_eq!(cfg.backend.max_tokens, 512);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[audit]
db_path = "data/audit.db"

[backend]
workflow_base = "https://workflows.example.com/v1"
default_workflow = "eq-research"
chat_url = "https://llm.example.com/v1/chat/completions"
chat_model = "analyst-8b"
temperature = 0.4
max_tokens = 1024
remote_timeout_secs = 30
chat_timeout_secs = 15

[envelope]
snippet_cap = 500

[market]
base_url = "https://md.example.com"
timeout_secs = 5
default_period = "3mo"
default_interval = "1wk"

[gateway]
host = "127.0.0.1"
port = 9090
api_key = "secret"
rate_limit_per_min = 10
"#;
        let cfg: ArgusConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.backend.default_workflow, "eq-research");
        assert_eq!(cfg.backend.remote_timeout_secs, 30);
        assert_eq!(cfg.envelope.snippet_cap, 500);
        assert_eq!(cfg.market.default_period, "3mo");
        assert_eq!(cfg.gateway.port, 9090);
        assert_eq!(cfg.gateway.api_key, "secret");
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("ARGUS_SNIPPET_CAP", "750");
        std::env::set_var("GROQ_MODEL", "env-model");

        let mut cfg = ArgusConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.envelope.snippet_cap, 750);
        assert_eq!(cfg.backend.chat_model, "env-model");

        std::env::remove_var("ARGUS_SNIPPET_CAP");
        std::env::remove_var("GROQ_MODEL");

        // Nonexistent path returns defaults (no env interference)
        let cfg = ArgusConfig::load_or_default("/nonexistent/path.toml");
        assert_eq!(cfg.envelope.snippet_cap, 2000);
    }
}
