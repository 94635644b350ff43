//! Analysis run orchestration.
//!
//! One run: gather market data per symbol through the tool registry, audit
//! every step, assemble the context envelope from audited outputs only, then
//! dispatch to a reasoning backend. Individual step failures degrade the run;
//! only a failed audit write aborts it.

pub mod request;
pub mod runner;

pub use request::{AnalysisResponse, AnalyzeRequest};
pub use runner::Orchestrator;
