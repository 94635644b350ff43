//! Remote workflow engine client.

use std::time::Duration;

use argus_core::{ArgusError, CredentialChain, Envelope};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// A remote workflow backend: envelope in, arbitrary JSON out.
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn run(
        &self,
        workflow: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<Value, ArgusError>;
}

/// HTTP client for `POST {base}/workflows/{name}/run`.
#[derive(Debug, Clone)]
pub struct WorkflowClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl WorkflowClient {
    pub fn new(base_url: &str, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build a client only if a workflow credential is configured; `None`
    /// means the dispatcher skips straight to local emulation.
    pub fn from_credentials(
        credentials: &CredentialChain,
        base_url: &str,
    ) -> anyhow::Result<Option<Self>> {
        match credentials.resolve("LANGGRAPH_API_KEY") {
            Some((key, source)) => {
                tracing::info!("Remote workflow backend configured (key from {})", source);
                Ok(Some(Self::new(base_url, key)?))
            }
            None => {
                tracing::info!("No workflow credential found; using local emulation only");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl WorkflowBackend for WorkflowClient {
    async fn run(
        &self,
        workflow: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<Value, ArgusError> {
        let url = format!("{}/workflows/{}/run", self.base_url, workflow);
        let payload = json!({"input": {"envelope": envelope}});

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ArgusError::BackendUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(ArgusError::BackendUnavailable(format!(
                "workflow '{workflow}' returned {status}: {preview}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ArgusError::BackendMalformedResponse(e.to_string()))
    }
}
