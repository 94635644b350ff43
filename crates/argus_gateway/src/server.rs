use std::sync::Arc;

use argus_audit::AuditStore;
use argus_backend::{ChatBackend, ChatParams};
use argus_core::config::GatewayConfig;
use argus_core::RunId;
use argus_orchestrator::{AnalyzeRequest, Orchestrator};
use argus_tools::ToolRegistry;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::auth::{authorize, Rejection};
use crate::rate_limit::RateLimiter;
use crate::types::{ComposeRequest, RpcRequest};

/// Shared state for the gateway server.
#[derive(Clone)]
struct AppState {
    registry: Arc<ToolRegistry>,
    audit: AuditStore,
    orchestrator: Arc<Orchestrator>,
    chat: Arc<dyn ChatBackend>,
    api_key: Arc<str>,
    limiter: Arc<RateLimiter>,
    chat_params: ChatParams,
}

/// The gateway HTTP server.
///
/// - `GET /healthz` — liveness, unauthenticated
/// - `GET /mcp/manifest` — registered tools and their schemas
/// - `POST /mcp/rpc` — single tool invocation (`tool.call`)
/// - `POST /mcp/analyze` — full analysis run
/// - `GET /mcp/audit` — recent run summaries
/// - `GET /mcp/audit/:run_id` — full trace for one run
/// - `POST /llm/compose` — direct chat completion
pub struct GatewayServer {
    state: AppState,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(
        config: &GatewayConfig,
        registry: Arc<ToolRegistry>,
        audit: AuditStore,
        orchestrator: Arc<Orchestrator>,
        chat: Arc<dyn ChatBackend>,
        chat_params: ChatParams,
    ) -> Self {
        let state = AppState {
            registry,
            audit,
            orchestrator,
            chat,
            api_key: config.api_key.clone().into(),
            limiter: Arc::new(RateLimiter::new(config.rate_limit_per_min)),
            chat_params,
        };
        Self {
            state,
            host: config.host.clone(),
            port: config.port,
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/mcp/manifest", get(manifest))
            .route("/mcp/rpc", post(rpc))
            .route("/mcp/analyze", post(analyze))
            .route("/mcp/audit", get(audit_runs))
            .route("/mcp/audit/:run_id", get(audit_trace))
            .route("/llm/compose", post(compose))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Start the server. Spawns a background task and returns its join handle.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        let app = self.router();
        let addr = format!("{}:{}", self.host, self.port);

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(&addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!("Gateway failed to bind {}: {}", addr, e);
                    return;
                }
            };
            tracing::info!("Gateway listening on {}", addr);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Gateway server error: {}", e);
            }
        })
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn manifest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    authorize(&headers, &state.api_key, &state.limiter)?;
    Ok(Json(json!({"tools": state.registry.manifest()})))
}

/// POST /mcp/rpc — one tool invocation.
///
/// Tool-level failures (unknown tool, schema rejection, execution error) are
/// reported in-band with a 200 so callers can distinguish them from transport
/// problems. Successful calls are audited and return the record fingerprint.
async fn rpc(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> Result<Json<Value>, Rejection> {
    authorize(&headers, &state.api_key, &state.limiter)?;

    let run_id = match &request.id {
        Some(id) => RunId::new(id.clone()),
        None => RunId::generate(),
    };

    if request.method != "tool.call" {
        return Ok(Json(json!({
            "id": run_id.as_str(),
            "error": format!("unsupported method '{}'", request.method),
        })));
    }

    let name = &request.params.name;
    let args = &request.params.arguments;
    match state.registry.call(name, args).await {
        Ok(result) => {
            let fingerprint = state
                .audit
                .record(
                    &run_id,
                    "tool_call",
                    &json!({
                        "run_id": run_id.as_str(),
                        "tool": name,
                        "args": args,
                        "result": result,
                        "ts": Utc::now().to_rfc3339(),
                    }),
                )
                .await
                .map_err(internal_error)?;

            Ok(Json(json!({
                "id": run_id.as_str(),
                "result": result,
                "audit_hash": fingerprint.as_str(),
            })))
        }
        Err(e) => Ok(Json(json!({
            "id": run_id.as_str(),
            "error": e.to_string(),
        }))),
    }
}

async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Value>, Rejection> {
    authorize(&headers, &state.api_key, &state.limiter)?;

    let response = state
        .orchestrator
        .run(request)
        .await
        .map_err(|e| internal_error(format!("{e:#}")))?;
    serde_json::to_value(response)
        .map(Json)
        .map_err(internal_error)
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

async fn audit_runs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, Rejection> {
    authorize(&headers, &state.api_key, &state.limiter)?;

    let limit = query.limit.clamp(1, 200);
    let runs = state.audit.list_runs(limit).await.map_err(internal_error)?;
    Ok(Json(json!({"runs": runs})))
}

async fn audit_trace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, Rejection> {
    authorize(&headers, &state.api_key, &state.limiter)?;

    let run_id = RunId::new(run_id);
    let records = state
        .audit
        .get_trace(&run_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({"run_id": run_id.as_str(), "records": records})))
}

/// POST /llm/compose — one chat completion outside the analysis pipeline.
async fn compose(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ComposeRequest>,
) -> Result<Json<Value>, Rejection> {
    authorize(&headers, &state.api_key, &state.limiter)?;

    let messages = request.resolve_messages();
    if messages.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "either messages or prompt is required"})),
        ));
    }

    let params = ChatParams {
        temperature: request.temperature.unwrap_or(state.chat_params.temperature),
        max_tokens: request.max_tokens.unwrap_or(state.chat_params.max_tokens),
    };

    let reply = state.chat.chat(&messages, &params).await.map_err(|e| {
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({"detail": format!("chat backend failed: {e:#}")})),
        )
    })?;
    Ok(Json(json!({"content": reply.content})))
}

fn internal_error(e: impl ToString) -> Rejection {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"detail": e.to_string()})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_backend::{ChatMessage, Dispatcher};
    use argus_tools::{register_market_tools, FixtureMarketData};
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::time::Duration;
    use tempfile::TempDir;

    struct MockChat;

    #[async_trait]
    impl ChatBackend for MockChat {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _params: &ChatParams,
        ) -> anyhow::Result<ChatMessage> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ChatMessage {
                role: "assistant".to_string(),
                content: format!("echo: {last}"),
            })
        }
    }

    async fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let audit = AuditStore::open(dir.path().join("audit.db")).await.unwrap();

        let mut registry = ToolRegistry::new();
        register_market_tools(
            &mut registry,
            Arc::new(FixtureMarketData::sample()),
            &argus_core::config::MarketConfig::default(),
        )
        .unwrap();
        let registry = Arc::new(registry);

        let chat: Arc<dyn ChatBackend> = Arc::new(MockChat);
        let dispatcher = Arc::new(Dispatcher::new(None, chat.clone()));
        let orchestrator = Arc::new(Orchestrator::new(
            registry.clone(),
            audit.clone(),
            dispatcher,
            2000,
            "stock-analysis",
            Duration::from_secs(5),
        ));

        let state = AppState {
            registry,
            audit,
            orchestrator,
            chat,
            api_key: "dev-local-key".into(),
            limiter: Arc::new(RateLimiter::new(120)),
            chat_params: ChatParams::default(),
        };
        (state, dir)
    }

    fn auth_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("dev-local-key"));
        headers
    }

    #[tokio::test]
    async fn test_healthz() {
        let Json(body) = healthz().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_manifest_requires_key() {
        let (state, _dir) = test_state().await;
        let err = manifest(State(state), HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_manifest_lists_tools() {
        let (state, _dir) = test_state().await;
        let Json(body) = manifest(State(state), auth_headers()).await.unwrap();
        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 3);
        assert_eq!(tools[0]["name"], "fundamentals");
    }

    #[tokio::test]
    async fn test_rpc_tool_call_is_audited() {
        let (state, _dir) = test_state().await;
        let request: RpcRequest = serde_json::from_value(json!({
            "id": "rpc-1",
            "method": "tool.call",
            "params": {"name": "get_quote", "arguments": {"symbol": "AAPL"}},
        }))
        .unwrap();

        let Json(body) = rpc(State(state.clone()), auth_headers(), Json(request))
            .await
            .unwrap();
        assert_eq!(body["id"], "rpc-1");
        assert_eq!(body["result"]["symbol"], "AAPL");
        let hash = body["audit_hash"].as_str().unwrap();

        let trace = state.audit.get_trace(&RunId::new("rpc-1")).await.unwrap();
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].action, "tool_call");
        assert_eq!(trace[0].fingerprint.as_str(), hash);
    }

    #[tokio::test]
    async fn test_rpc_unknown_method_reports_in_band() {
        let (state, _dir) = test_state().await;
        let request: RpcRequest =
            serde_json::from_value(json!({"method": "tool.list", "params": {}})).unwrap();

        let Json(body) = rpc(State(state), auth_headers(), Json(request))
            .await
            .unwrap();
        assert!(body["error"].as_str().unwrap().contains("tool.list"));
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn test_rpc_schema_rejection_reports_in_band() {
        let (state, _dir) = test_state().await;
        let request: RpcRequest = serde_json::from_value(json!({
            "method": "tool.call",
            "params": {"name": "get_quote", "arguments": {}},
        }))
        .unwrap();

        let Json(body) = rpc(State(state.clone()), auth_headers(), Json(request))
            .await
            .unwrap();
        assert!(body["error"].as_str().unwrap().contains("symbol"));
        // Rejected calls leave no audit record.
        let runs = state.audit.list_runs(10).await.unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_endpoint_runs_pipeline() {
        let (state, _dir) = test_state().await;
        let request: AnalyzeRequest =
            serde_json::from_value(json!({"symbols": ["AAPL"], "query": "how is AAPL"})).unwrap();

        let Json(body) = analyze(State(state), auth_headers(), Json(request))
            .await
            .unwrap();
        assert_eq!(body["steps"].as_array().unwrap().len(), 3);
        assert_eq!(body["backend"]["source"], "local_fallback");
        assert!(body["audit_hash"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_audit_endpoints_list_and_trace() {
        let (state, _dir) = test_state().await;
        let request: AnalyzeRequest =
            serde_json::from_value(json!({"id": "run-9", "symbols": ["AAPL"]})).unwrap();
        let _ = analyze(State(state.clone()), auth_headers(), Json(request))
            .await
            .unwrap();

        let Json(body) = audit_runs(
            State(state.clone()),
            auth_headers(),
            Query(AuditQuery { limit: 10 }),
        )
        .await
        .unwrap();
        assert_eq!(body["runs"][0]["run_id"], "run-9");

        let Json(body) = audit_trace(State(state), auth_headers(), Path("run-9".to_string()))
            .await
            .unwrap();
        assert_eq!(body["run_id"], "run-9");
        assert_eq!(body["records"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_compose_uses_chat_backend() {
        let (state, _dir) = test_state().await;
        let request: ComposeRequest =
            serde_json::from_value(json!({"prompt": "hello there"})).unwrap();

        let Json(body) = compose(State(state), auth_headers(), Json(request))
            .await
            .unwrap();
        assert_eq!(body["content"], "echo: hello there");
    }

    #[tokio::test]
    async fn test_compose_accepts_message_array() {
        let (state, _dir) = test_state().await;
        let request: ComposeRequest = serde_json::from_value(json!({
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "ok"},
                {"role": "user", "content": "second"},
            ],
        }))
        .unwrap();

        // MockChat echoes the last message, so a multi-turn history survives
        // the passthrough intact.
        let Json(body) = compose(State(state), auth_headers(), Json(request))
            .await
            .unwrap();
        assert_eq!(body["content"], "echo: second");
    }

    #[tokio::test]
    async fn test_compose_rejects_empty_request() {
        let (state, _dir) = test_state().await;
        let request: ComposeRequest = serde_json::from_value(json!({})).unwrap();

        let err = compose(State(state), auth_headers(), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
