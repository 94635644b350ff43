//! Tool registry and the market-data tools it serves.

pub mod market;
pub mod providers;
pub mod registry;

pub use market::{register_market_tools, Candle, Fundamentals, History, MarketData, Quote};
pub use providers::fixture::FixtureMarketData;
pub use providers::http::HttpMarketData;
pub use registry::ToolRegistry;
