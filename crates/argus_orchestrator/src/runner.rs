//! The analysis run pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use argus_audit::AuditStore;
use argus_backend::Dispatcher;
use argus_core::{
    ArgusError, AuditedToolOutput, EnvelopeBuilder, RunId, Stage, StepRef, TraceStep,
};
use argus_tools::ToolRegistry;
use chrono::Utc;
use serde_json::{json, Value};

use crate::request::{AnalysisResponse, AnalyzeRequest};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a cautious financial analysis orchestrator. Ground every claim in the \
     provided tool outputs and state uncertainty explicitly.";

/// Drives one analysis run end to end: tool gathering, auditing, envelope
/// assembly, backend dispatch.
pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    audit: AuditStore,
    dispatcher: Arc<Dispatcher>,
    envelope_builder: EnvelopeBuilder,
    default_workflow: String,
    remote_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        audit: AuditStore,
        dispatcher: Arc<Dispatcher>,
        snippet_cap: usize,
        default_workflow: impl Into<String>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            audit,
            dispatcher,
            envelope_builder: EnvelopeBuilder::new(snippet_cap),
            default_workflow: default_workflow.into(),
            remote_timeout,
        }
    }

    pub fn audit_store(&self) -> &AuditStore {
        &self.audit
    }

    /// Run one analysis. A failed run still leaves a closing audit record
    /// explaining what went wrong.
    pub async fn run(&self, request: AnalyzeRequest) -> Result<AnalysisResponse> {
        let run_id = match &request.id {
            Some(id) => RunId::new(id.clone()),
            None => RunId::generate(),
        };
        tracing::info!("Starting analysis run {} ({:?})", run_id, request.symbols);

        match self.run_inner(&run_id, request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                let payload = json!({
                    "run_id": run_id.as_str(),
                    "error": format!("{e:#}"),
                    "ts": Utc::now().to_rfc3339(),
                });
                if let Err(audit_err) = self.audit.record(&run_id, "analyze_error", &payload).await
                {
                    tracing::error!("Could not audit run failure: {}", audit_err);
                }
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        run_id: &RunId,
        request: AnalyzeRequest,
    ) -> Result<AnalysisResponse> {
        let system_prompt = request
            .system_prompt
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let query = request.query.as_deref().unwrap_or("");
        let workflow = request
            .workflow
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.default_workflow);

        let mut steps = Vec::new();
        let mut audited_outputs = Vec::new();

        for symbol in &request.symbols {
            let symbol = symbol.trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            for stage in Stage::ALL {
                let step = StepRef::new(symbol.clone(), stage);
                let trace =
                    self.execute_step(run_id, &step, &mut audited_outputs).await?;
                steps.push(trace);
            }
        }

        let envelope = self
            .envelope_builder
            .build(system_prompt, query, &audited_outputs)
            .context("Failed to build context envelope")?;

        self.audit
            .record(
                run_id,
                "envelope",
                &json!({
                    "run_id": run_id.as_str(),
                    "envelope_id": envelope.envelope_id.as_str(),
                    "slots": envelope.slots.tool_outputs.len(),
                    "provenance": envelope.provenance.len(),
                    "ts": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let backend = self
            .dispatcher
            .dispatch(workflow, &envelope, self.remote_timeout)
            .await;

        let closing = self
            .audit
            .record(
                run_id,
                "analyze",
                &json!({
                    "run_id": run_id.as_str(),
                    "workflow": workflow,
                    "query": query,
                    "symbols": request.symbols,
                    "params": request.params,
                    "envelope_id": envelope.envelope_id.as_str(),
                    "source": backend.source,
                    "remote_error": backend.remote_error.clone(),
                    "steps_ok": steps.iter().filter(|s| s.is_success()).count(),
                    "steps_failed": steps.iter().filter(|s| !s.is_success()).count(),
                    "ts": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        tracing::info!(
            "Run {} complete: {} steps, backend={:?}",
            run_id,
            steps.len(),
            backend.source
        );

        Ok(AnalysisResponse {
            id: run_id.as_str().to_string(),
            steps,
            envelope,
            backend,
            audit_hash: closing.as_str().to_string(),
        })
    }

    /// Execute one tool step, audit the outcome either way, and fold a
    /// successful output into the envelope inputs.
    ///
    /// Tool failures return a failure trace and let the run continue; only
    /// audit write failures propagate.
    async fn execute_step(
        &self,
        run_id: &RunId,
        step: &StepRef,
        audited_outputs: &mut Vec<AuditedToolOutput>,
    ) -> Result<TraceStep, ArgusError> {
        let tool = step.stage.tool_name();
        let args = json!({"symbol": step.symbol});
        let started = Instant::now();

        match self.registry.call(tool, &args).await {
            Ok(result) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                let detail = step_detail(step.stage, &result);
                let fingerprint = self
                    .audit
                    .record(
                        run_id,
                        &step.label(),
                        &json!({
                            "run_id": run_id.as_str(),
                            "tool": tool,
                            "args": args,
                            "result": detail,
                            "duration_ms": duration_ms,
                            "ts": Utc::now().to_rfc3339(),
                        }),
                    )
                    .await?;

                audited_outputs.push(AuditedToolOutput {
                    step: step.clone(),
                    tool: tool.to_string(),
                    detail: detail.clone(),
                    fingerprint: fingerprint.clone(),
                });
                Ok(TraceStep::success(step.clone(), detail, fingerprint, duration_ms))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!("Step {} failed: {}", step, e);
                let duration_ms = started.elapsed().as_millis() as u64;
                let fingerprint = self
                    .audit
                    .record(
                        run_id,
                        &step.label(),
                        &json!({
                            "run_id": run_id.as_str(),
                            "tool": tool,
                            "args": args,
                            "error": e.to_string(),
                            "duration_ms": duration_ms,
                            "ts": Utc::now().to_rfc3339(),
                        }),
                    )
                    .await?;
                Ok(TraceStep::failure(
                    step.clone(),
                    e.to_string(),
                    Some(fingerprint),
                    duration_ms,
                ))
            }
        }
    }
}

/// What of a tool result goes into the audit trail and envelope. History
/// results are summarized to a point count; full candle arrays would drown
/// the snippet cap without informing the backend.
fn step_detail(stage: Stage, result: &Value) -> Value {
    match stage {
        Stage::History => {
            let points = result["data"].as_array().map(|a| a.len()).unwrap_or(0);
            json!({"points": points})
        }
        _ => result.clone(),
    }
}

// ============================================================================
// Tests
// ============================================================================
