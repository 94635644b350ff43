//! HTTP market-data provider against a Yahoo-style chart API.
//!
//! Quote and history come from the chart endpoint; fundamentals come from the
//! quote-summary endpoint. Missing metrics are tolerated and surface as
//! `None` — the upstream feed is patchy for thin tickers.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;

use crate::market::{Candle, Fundamentals, History, MarketData, Quote};

#[derive(Debug, Clone)]
pub struct HttpMarketData {
    client: Client,
    base_url: String,
}

impl HttpMarketData {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .user_agent("argus/0.1")
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_chart(&self, symbol: &str, range: &str, interval: &str) -> Result<Value> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={}&interval={}",
            self.base_url, symbol, range, interval
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("chart request for {symbol} failed"))?;

        if !response.status().is_success() {
            anyhow::bail!("chart request for {symbol} returned {}", response.status());
        }

        let body: Value = response.json().await?;
        body.pointer("/chart/result/0")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("chart response for {symbol} has no result"))
    }
}

#[async_trait]
impl MarketData for HttpMarketData {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let result = self.fetch_chart(symbol, "5d", "1m").await?;
        let meta = &result["meta"];

        // Prefer the live price; fall back to the previous close like the
        // upstream UI does outside market hours.
        let price = meta["regularMarketPrice"]
            .as_f64()
            .or_else(|| meta["chartPreviousClose"].as_f64())
            .or_else(|| meta["previousClose"].as_f64());

        Ok(Quote {
            symbol: symbol.to_uppercase(),
            price,
            currency: meta["currency"].as_str().map(str::to_string),
            short_name: meta["shortName"]
                .as_str()
                .or_else(|| meta["longName"].as_str())
                .map(str::to_string),
        })
    }

    async fn history(&self, symbol: &str, period: &str, interval: &str) -> Result<History> {
        let result = self.fetch_chart(symbol, period, interval).await?;

        let timestamps = result["timestamp"].as_array().cloned().unwrap_or_default();
        let quote = result
            .pointer("/indicators/quote/0")
            .cloned()
            .unwrap_or(Value::Null);

        let series = |key: &str| -> Vec<Value> { quote[key].as_array().cloned().unwrap_or_default() };
        let opens = series("open");
        let highs = series("high");
        let lows = series("low");
        let closes = series("close");
        let volumes = series("volume");

        let mut data = Vec::with_capacity(timestamps.len());
        for (i, ts) in timestamps.iter().enumerate() {
            // Rows with a null close are halted/empty buckets; skip them.
            let close = match closes.get(i).and_then(Value::as_f64) {
                Some(c) => c,
                None => continue,
            };
            let date = ts
                .as_i64()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            data.push(Candle {
                date,
                open: opens.get(i).and_then(Value::as_f64).unwrap_or(close),
                high: highs.get(i).and_then(Value::as_f64).unwrap_or(close),
                low: lows.get(i).and_then(Value::as_f64).unwrap_or(close),
                close,
                volume: volumes.get(i).and_then(Value::as_i64).unwrap_or(0),
            });
        }

        Ok(History {
            symbol: symbol.to_uppercase(),
            data,
        })
    }

    async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules=summaryDetail,defaultKeyStatistics,financialData",
            self.base_url, symbol
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("fundamentals request for {symbol} failed"))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "fundamentals request for {symbol} returned {}",
                response.status()
            );
        }

        let body: Value = response.json().await?;
        let result = body
            .pointer("/quoteSummary/result/0")
            .cloned()
            .unwrap_or(Value::Null);

        let metric = |module: &str, key: &str| -> Option<f64> {
            result
                .pointer(&format!("/{module}/{key}/raw"))
                .and_then(Value::as_f64)
                .or_else(|| {
                    result
                        .pointer(&format!("/{module}/{key}"))
                        .and_then(Value::as_f64)
                })
        };

        Ok(Fundamentals {
            market_cap: metric("summaryDetail", "marketCap"),
            trailing_pe: metric("summaryDetail", "trailingPE"),
            forward_pe: metric("summaryDetail", "forwardPE"),
            beta: metric("summaryDetail", "beta")
                .or_else(|| metric("defaultKeyStatistics", "beta")),
            debt_to_equity: metric("financialData", "debtToEquity"),
            dividend_yield: metric("summaryDetail", "dividendYield"),
        })
    }
}
