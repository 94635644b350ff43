//! HTTP gateway: tool RPC, analysis, audit queries, direct compose.

pub mod auth;
pub mod rate_limit;
pub mod server;
pub mod types;

pub use rate_limit::RateLimiter;
pub use server::GatewayServer;
pub use types::{ComposeRequest, RpcRequest};
