//! In-memory market data — deterministic fixtures for tests and offline runs.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::market::{Candle, Fundamentals, History, MarketData, Quote};

/// Deterministic provider backed by in-memory tables.
///
/// Stages can be forced to fail per symbol to exercise partial-failure
/// handling without a network.
#[derive(Default)]
pub struct FixtureMarketData {
    quotes: HashMap<String, Quote>,
    histories: HashMap<String, History>,
    fundamentals: HashMap<String, Fundamentals>,
    failing: HashSet<(String, &'static str)>,
}

impl FixtureMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small fixture with one liquid ticker, enough for smoke tests.
    pub fn sample() -> Self {
        let mut fixture = Self::new();
        fixture.insert_symbol("AAPL", 150.0, 20);
        fixture
    }

    /// Add a symbol with a flat quote and a synthetic `points`-day history.
    pub fn insert_symbol(&mut self, symbol: &str, price: f64, points: usize) {
        let symbol = symbol.to_uppercase();
        self.quotes.insert(
            symbol.clone(),
            Quote {
                symbol: symbol.clone(),
                price: Some(price),
                currency: Some("USD".to_string()),
                short_name: Some(format!("{symbol} Inc.")),
            },
        );

        let data = (0..points)
            .map(|i| {
                let drift = i as f64 * 0.5;
                Candle {
                    date: format!("2024-01-{:02}", i + 1),
                    open: price + drift,
                    high: price + drift + 1.0,
                    low: price + drift - 1.0,
                    close: price + drift + 0.25,
                    volume: 1_000_000 + i as i64 * 10_000,
                }
            })
            .collect();
        self.histories.insert(
            symbol.clone(),
            History {
                symbol: symbol.clone(),
                data,
            },
        );

        self.fundamentals.insert(
            symbol,
            Fundamentals {
                market_cap: Some(2.4e12),
                trailing_pe: Some(28.5),
                forward_pe: Some(25.1),
                beta: Some(1.2),
                debt_to_equity: Some(170.0),
                dividend_yield: Some(0.005),
            },
        );
    }

    /// Force one stage to fail for a symbol ("quote", "history",
    /// "fundamentals").
    pub fn fail_stage(&mut self, symbol: &str, stage: &'static str) {
        self.failing.insert((symbol.to_uppercase(), stage));
    }

    fn check(&self, symbol: &str, stage: &'static str) -> anyhow::Result<()> {
        if self.failing.contains(&(symbol.to_uppercase(), stage)) {
            anyhow::bail!("fixture: {stage} unavailable for {symbol}");
        }
        Ok(())
    }
}

#[async_trait]
impl MarketData for FixtureMarketData {
    async fn quote(&self, symbol: &str) -> anyhow::Result<Quote> {
        self.check(symbol, "quote")?;
        self.quotes
            .get(&symbol.to_uppercase())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("fixture: unknown symbol {symbol}"))
    }

    async fn history(
        &self,
        symbol: &str,
        _period: &str,
        _interval: &str,
    ) -> anyhow::Result<History> {
        self.check(symbol, "history")?;
        self.histories
            .get(&symbol.to_uppercase())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("fixture: unknown symbol {symbol}"))
    }

    async fn fundamentals(&self, symbol: &str) -> anyhow::Result<Fundamentals> {
        self.check(symbol, "fundamentals")?;
        self.fundamentals
            .get(&symbol.to_uppercase())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("fixture: unknown symbol {symbol}"))
    }
}
