//! Market data tools: quote, history, fundamentals.
//!
//! The concrete data source is an external collaborator behind the
//! `MarketData` trait; the tools only adapt it to the registry contract.

use std::sync::Arc;

use argus_core::config::MarketConfig;
use argus_core::{ArgusError, Sensitivity, Tool};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::registry::ToolRegistry;

// ============================================================================
// Provider-facing data shapes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    #[serde(rename = "shortName")]
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    pub symbol: String,
    pub data: Vec<Candle>,
}

/// Fixed scalar metrics; field names match the provider's wire keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fundamentals {
    #[serde(rename = "marketCap")]
    pub market_cap: Option<f64>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<f64>,
    pub beta: Option<f64>,
    #[serde(rename = "debtToEquity")]
    pub debt_to_equity: Option<f64>,
    #[serde(rename = "dividendYield")]
    pub dividend_yield: Option<f64>,
}

/// External market-data provider. Implementations must be reentrant.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, symbol: &str) -> anyhow::Result<Quote>;
    async fn history(&self, symbol: &str, period: &str, interval: &str)
        -> anyhow::Result<History>;
    async fn fundamentals(&self, symbol: &str) -> anyhow::Result<Fundamentals>;
}

// ============================================================================
// Tools
// ============================================================================

fn symbol_arg(args: &Value) -> anyhow::Result<String> {
    // The registry validates before invocation; this guard covers direct use.
    args["symbol"]
        .as_str()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing 'symbol' argument"))
}

pub struct QuoteTool {
    provider: Arc<dyn MarketData>,
}

#[async_trait]
impl Tool for QuoteTool {
    fn name(&self) -> &str {
        "get_quote"
    }

    fn description(&self) -> &str {
        "Get current quote"
    }

    fn params_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"symbol": {"type": "string"}},
            "required": ["symbol"],
        })
    }

    async fn execute(&self, args: &Value) -> anyhow::Result<Value> {
        let symbol = symbol_arg(args)?;
        let quote = self.provider.quote(&symbol).await?;
        Ok(serde_json::to_value(quote)?)
    }
}

pub struct HistoryTool {
    provider: Arc<dyn MarketData>,
    default_period: String,
    default_interval: String,
}

#[async_trait]
impl Tool for HistoryTool {
    fn name(&self) -> &str {
        "get_history"
    }

    fn description(&self) -> &str {
        "Get historical price data"
    }

    fn params_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {"type": "string"},
                "period": {"type": "string"},
                "interval": {"type": "string"},
            },
            "required": ["symbol"],
        })
    }

    async fn execute(&self, args: &Value) -> anyhow::Result<Value> {
        let symbol = symbol_arg(args)?;
        let period = args["period"].as_str().unwrap_or(&self.default_period);
        let interval = args["interval"].as_str().unwrap_or(&self.default_interval);
        let history = self.provider.history(&symbol, period, interval).await?;
        Ok(serde_json::to_value(history)?)
    }
}

pub struct FundamentalsTool {
    provider: Arc<dyn MarketData>,
}

#[async_trait]
impl Tool for FundamentalsTool {
    fn name(&self) -> &str {
        "fundamentals"
    }

    fn description(&self) -> &str {
        "Get fundamentals"
    }

    fn params_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"symbol": {"type": "string"}},
            "required": ["symbol"],
        })
    }

    fn sensitivity(&self) -> Sensitivity {
        Sensitivity::Low
    }

    async fn execute(&self, args: &Value) -> anyhow::Result<Value> {
        let symbol = symbol_arg(args)?;
        let fundamentals = self.provider.fundamentals(&symbol).await?;
        Ok(serde_json::to_value(fundamentals)?)
    }
}

/// Register the three market tools against one shared provider. History
/// calls that name no period/interval fall back to the configured defaults.
pub fn register_market_tools(
    registry: &mut ToolRegistry,
    provider: Arc<dyn MarketData>,
    market: &MarketConfig,
) -> Result<(), ArgusError> {
    registry.register(Arc::new(QuoteTool {
        provider: provider.clone(),
    }))?;
    registry.register(Arc::new(HistoryTool {
        provider: provider.clone(),
        default_period: market.default_period.clone(),
        default_interval: market.default_interval.clone(),
    }))?;
    registry.register(Arc::new(FundamentalsTool { provider }))?;
    Ok(())
}
