//! Ordered credential resolution.
//!
//! Secrets (backend API keys) are looked up through an ordered list of
//! providers; the first `Found` wins. The standard chain is process
//! environment first, then an optional TOML secrets file.

use std::collections::HashMap;
use std::path::Path;

/// Outcome of a single provider lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    NotFound,
}

pub trait CredentialProvider: Send + Sync {
    /// Short provider name reported alongside resolved keys ("env",
    /// "secrets_file", ...).
    fn name(&self) -> &'static str;

    fn lookup(&self, key: &str) -> Lookup;
}

/// Reads from the process environment.
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn name(&self) -> &'static str {
        "env"
    }

    fn lookup(&self, key: &str) -> Lookup {
        match std::env::var(key) {
            Ok(v) if !v.is_empty() => Lookup::Found(v),
            _ => Lookup::NotFound,
        }
    }
}

/// Reads from a flat TOML file of `KEY = "value"` pairs, loaded once.
pub struct FileCredentials {
    values: HashMap<String, String>,
}

impl FileCredentials {
    /// Load the secrets file. A missing or unparseable file yields an empty
    /// provider; secret lookup errors must never crash startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let values = std::fs::read_to_string(path.as_ref())
            .ok()
            .and_then(|content| toml::from_str::<HashMap<String, String>>(&content).ok())
            .unwrap_or_default();
        Self { values }
    }

    #[cfg(test)]
    fn from_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl CredentialProvider for FileCredentials {
    fn name(&self) -> &'static str {
        "secrets_file"
    }

    fn lookup(&self, key: &str) -> Lookup {
        match self.values.get(key) {
            Some(v) if !v.is_empty() => Lookup::Found(v.clone()),
            _ => Lookup::NotFound,
        }
    }
}

/// Providers tried in order; first `Found` wins.
pub struct CredentialChain {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialChain {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    /// Env first, then the secrets file named by `ARGUS_SECRETS_FILE`
    /// (default `secrets.toml`).
    pub fn standard() -> Self {
        let secrets_path =
            std::env::var("ARGUS_SECRETS_FILE").unwrap_or_else(|_| "secrets.toml".to_string());
        Self::new(vec![
            Box::new(EnvCredentials),
            Box::new(FileCredentials::load(secrets_path)),
        ])
    }

    /// Resolve a key, returning the value and the name of the provider that
    /// supplied it.
    pub fn resolve(&self, key: &str) -> Option<(String, &'static str)> {
        for provider in &self.providers {
            if let Lookup::Found(value) = provider.lookup(key) {
                tracing::debug!("Resolved credential '{}' from {}", key, provider.name());
                return Some((value, provider.name()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider {
        name: &'static str,
        values: HashMap<String, String>,
    }

    impl CredentialProvider for StaticProvider {
        fn name(&self) -> &'static str {
            self.name
        }
        fn lookup(&self, key: &str) -> Lookup {
            match self.values.get(key) {
                Some(v) => Lookup::Found(v.clone()),
                None => Lookup::NotFound,
            }
        }
    }

    fn provider(name: &'static str, pairs: &[(&str, &str)]) -> Box<dyn CredentialProvider> {
        Box::new(StaticProvider {
            name,
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    #[test]
    fn test_first_found_wins() {
        let chain = CredentialChain::new(vec![
            provider("first", &[("API_KEY", "from-first")]),
            provider("second", &[("API_KEY", "from-second")]),
        ]);
        let (value, source) = chain.resolve("API_KEY").unwrap();
        assert_eq!(value, "from-first");
        assert_eq!(source, "first");
    }

    #[test]
    fn test_falls_through_to_later_provider() {
        let chain = CredentialChain::new(vec![
            provider("first", &[]),
            provider("second", &[("API_KEY", "from-second")]),
        ]);
        let (value, source) = chain.resolve("API_KEY").unwrap();
        assert_eq!(value, "from-second");
        assert_eq!(source, "second");
    }

    #[test]
    fn test_missing_everywhere_is_none() {
        let chain = CredentialChain::new(vec![provider("first", &[]), provider("second", &[])]);
        assert!(chain.resolve("API_KEY").is_none());
    }

    #[test]
    fn test_file_provider_ignores_empty_values() {
        let mut values = HashMap::new();
        values.insert("EMPTY".to_string(), String::new());
        values.insert("SET".to_string(), "v".to_string());
        let file = FileCredentials::from_values(values);
        assert_eq!(file.lookup("EMPTY"), Lookup::NotFound);
        assert_eq!(file.lookup("SET"), Lookup::Found("v".to_string()));
    }

    #[test]
    fn test_file_provider_missing_file_is_empty() {
        let file = FileCredentials::load("/nonexistent/secrets.toml");
        assert_eq!(file.lookup("ANYTHING"), Lookup::NotFound);
    }
}
