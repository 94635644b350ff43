use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use argus_audit::AuditStore;
use argus_backend::{
    ChatBackend, ChatParams, Dispatcher, OpenAiCompatChat, WorkflowBackend, WorkflowClient,
};
use argus_core::{ArgusConfig, CredentialChain};
use argus_gateway::GatewayServer;
use argus_orchestrator::{AnalyzeRequest, Orchestrator};
use argus_tools::{register_market_tools, FixtureMarketData, HttpMarketData, MarketData, ToolRegistry};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "argus", version, about = "Audited stock-analysis orchestrator")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "argus.toml")]
    config: String,

    /// Use the deterministic in-memory market data provider
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway
    Serve,
    /// Run one analysis and print the result as JSON
    Analyze {
        /// Ticker symbols to analyze
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Free-form question to ground the analysis
        #[arg(short, long)]
        query: Option<String>,

        /// Remote workflow name override
        #[arg(short, long)]
        workflow: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = ArgusConfig::load_or_default(&args.config);

    let wiring = Wiring::build(&config, args.offline).await?;

    match args.command {
        Command::Serve => {
            let server = GatewayServer::new(
                &config.gateway,
                wiring.registry,
                wiring.audit,
                wiring.orchestrator,
                wiring.chat,
                wiring.chat_params,
            );
            info!(
                "Serving on {}:{} (offline={})",
                config.gateway.host, config.gateway.port, args.offline
            );
            server.start().await.context("Gateway task panicked")?;
        }
        Command::Analyze {
            symbols,
            query,
            workflow,
        } => {
            let request = AnalyzeRequest {
                query,
                workflow,
                ..AnalyzeRequest::for_symbols(symbols)
            };
            let response = wiring.orchestrator.run(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// Everything a gateway or one-shot run needs, wired from config.
struct Wiring {
    registry: Arc<ToolRegistry>,
    audit: AuditStore,
    orchestrator: Arc<Orchestrator>,
    chat: Arc<dyn ChatBackend>,
    chat_params: ChatParams,
}

impl Wiring {
    async fn build(config: &ArgusConfig, offline: bool) -> Result<Self> {
        info!("Opening audit store at {}", config.audit.db_path);
        let audit = AuditStore::open(&config.audit.db_path).await?;

        let provider: Arc<dyn MarketData> = if offline {
            info!("Using fixture market data");
            Arc::new(FixtureMarketData::sample())
        } else {
            Arc::new(HttpMarketData::new(
                &config.market.base_url,
                Duration::from_secs(config.market.timeout_secs),
            )?)
        };

        let mut registry = ToolRegistry::new();
        register_market_tools(&mut registry, provider, &config.market)?;
        let registry = Arc::new(registry);

        let credentials = CredentialChain::standard();
        let chat_key = credentials.resolve("GROQ_API_KEY").map(|(key, _)| key);
        let chat: Arc<dyn ChatBackend> = Arc::new(OpenAiCompatChat::new(
            &config.backend.chat_url,
            &config.backend.chat_model,
            chat_key,
            Duration::from_secs(config.backend.chat_timeout_secs),
        )?);

        let remote = WorkflowClient::from_credentials(&credentials, &config.backend.workflow_base)?
            .map(|client| Arc::new(client) as Arc<dyn WorkflowBackend>);
        let dispatcher = Arc::new(Dispatcher::new(remote, chat.clone()));

        let orchestrator = Arc::new(Orchestrator::new(
            registry.clone(),
            audit.clone(),
            dispatcher,
            config.envelope.snippet_cap,
            config.backend.default_workflow.clone(),
            Duration::from_secs(config.backend.remote_timeout_secs),
        ));

        Ok(Self {
            registry,
            audit,
            orchestrator,
            chat,
            chat_params: ChatParams {
                temperature: config.backend.temperature,
                max_tokens: config.backend.max_tokens,
            },
        })
    }
}
