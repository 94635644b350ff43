//! Remote-first dispatch with local fallback.

use std::sync::Arc;
use std::time::Duration;

use argus_core::Envelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::chat::ChatBackend;
use crate::emulation;
use crate::workflow::WorkflowBackend;

/// Which backend produced the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendSource {
    Remote,
    LocalFallback,
}

/// Unified result of one dispatch, regardless of which path served it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendResult {
    pub source: BackendSource,
    /// Raw remote workflow payload, present only for remote dispatches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fundamental: Option<Value>,
    /// Why the remote path was not used, when a remote backend was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Routes an envelope to the remote workflow engine when one is configured,
/// falling back to local emulation on any remote failure.
pub struct Dispatcher {
    remote: Option<Arc<dyn WorkflowBackend>>,
    chat: Arc<dyn ChatBackend>,
}

impl Dispatcher {
    pub fn new(remote: Option<Arc<dyn WorkflowBackend>>, chat: Arc<dyn ChatBackend>) -> Self {
        Self { remote, chat }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Resolve an envelope to exactly one result. Never fails: remote errors
    /// divert to local emulation, and emulation errors degrade in place.
    pub async fn dispatch(
        &self,
        workflow: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> BackendResult {
        let mut remote_error = None;

        if let Some(remote) = &self.remote {
            match remote.run(workflow, envelope, timeout).await {
                Ok(payload) => {
                    tracing::info!("Remote workflow '{}' completed", workflow);
                    return BackendResult {
                        source: BackendSource::Remote,
                        payload: Some(payload),
                        technical: None,
                        fundamental: None,
                        remote_error: None,
                        generated_at: Utc::now(),
                    };
                }
                Err(e) => {
                    tracing::warn!("Remote workflow '{}' failed, falling back: {}", workflow, e);
                    remote_error = Some(e.to_string());
                }
            }
        }

        let (technical, fundamental) = match emulation::emulate(self.chat.as_ref(), envelope).await
        {
            Ok(sections) => (sections.technical, sections.fundamental),
            Err(e) => {
                tracing::error!("Local emulation failed: {:#}", e);
                let stub = json!({"error": e.to_string(), "confidence": 0.0});
                (stub.clone(), stub)
            }
        };

        BackendResult {
            source: BackendSource::LocalFallback,
            payload: None,
            technical: Some(technical),
            fundamental: Some(fundamental),
            remote_error,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ChatParams};
    use argus_core::{ArgusError, AuditedToolOutput, EnvelopeBuilder, Fingerprint, Stage, StepRef};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockChat;

    #[async_trait]
    impl ChatBackend for MockChat {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _params: &ChatParams,
        ) -> anyhow::Result<ChatMessage> {
            Ok(ChatMessage {
                role: "assistant".to_string(),
                content: r#"{"report": "steady", "confidence": 0.5}"#.to_string(),
            })
        }
    }

    struct FailingRemote {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkflowBackend for FailingRemote {
        async fn run(
            &self,
            workflow: &str,
            _envelope: &Envelope,
            _timeout: Duration,
        ) -> Result<Value, ArgusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ArgusError::BackendUnavailable(format!(
                "workflow '{workflow}' timed out after 90s"
            )))
        }
    }

    struct HealthyRemote;

    #[async_trait]
    impl WorkflowBackend for HealthyRemote {
        async fn run(
            &self,
            _workflow: &str,
            _envelope: &Envelope,
            _timeout: Duration,
        ) -> Result<Value, ArgusError> {
            Ok(json!({"result": "remote analysis", "confidence": 0.9}))
        }
    }

    fn envelope() -> Envelope {
        let outputs = vec![AuditedToolOutput {
            step: StepRef::new("MSFT", Stage::Quote),
            tool: "get_quote".to_string(),
            detail: json!({"price": 410.0}),
            fingerprint: Fingerprint::from_hex("bb22"),
        }];
        EnvelopeBuilder::new(2000)
            .build("analyst", "analyze MSFT", &outputs)
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_remote_goes_straight_to_local() {
        let dispatcher = Dispatcher::new(None, Arc::new(MockChat));
        let result = dispatcher
            .dispatch("stock-analysis", &envelope(), Duration::from_secs(1))
            .await;

        assert_eq!(result.source, BackendSource::LocalFallback);
        assert!(result.remote_error.is_none());
        assert!(result.payload.is_none());
        assert!(result.technical.is_some());
        assert!(result.fundamental.is_some());
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_with_cause() {
        let remote = Arc::new(FailingRemote {
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(Some(remote.clone()), Arc::new(MockChat));
        let result = dispatcher
            .dispatch("stock-analysis", &envelope(), Duration::from_secs(1))
            .await;

        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.source, BackendSource::LocalFallback);
        let cause = result.remote_error.expect("remote error should be recorded");
        assert!(cause.contains("timed out"));
        assert!(result.technical.is_some());
    }

    #[tokio::test]
    async fn test_healthy_remote_wins() {
        let dispatcher = Dispatcher::new(Some(Arc::new(HealthyRemote)), Arc::new(MockChat));
        let result = dispatcher
            .dispatch("stock-analysis", &envelope(), Duration::from_secs(1))
            .await;

        assert_eq!(result.source, BackendSource::Remote);
        assert_eq!(result.payload.unwrap()["result"], "remote analysis");
        assert!(result.technical.is_none());
        assert!(result.remote_error.is_none());
    }

    #[test]
    fn test_source_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(BackendSource::LocalFallback).unwrap(),
            json!("local_fallback")
        );
        assert_eq!(
            serde_json::to_value(BackendSource::Remote).unwrap(),
            json!("remote")
        );
    }
}
