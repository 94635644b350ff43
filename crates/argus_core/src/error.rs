//! Error taxonomy shared by every crate in the workspace.
//!
//! The split matters for propagation: tool-level failures are captured as
//! step errors and never abort a run, backend failures trigger fallback, and
//! persistence failures are fatal because an untracked action would break the
//! audit guarantee.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArgusError {
    /// The named tool is not present in the registry.
    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    /// Arguments failed validation against the tool's parameter schema.
    /// The underlying callable was never invoked.
    #[error("invalid params at '{field}': {message}")]
    SchemaValidation { field: String, message: String },

    /// The tool itself failed; the original message is preserved.
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// The remote reasoning backend failed or timed out. Non-fatal: the
    /// dispatcher falls back to local emulation.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A model response could not be parsed into the declared shape.
    /// Non-fatal: the dispatcher degrades to a structured stand-in.
    #[error("backend response not parseable: {0}")]
    BackendMalformedResponse(String),

    /// An audit write failed. Fatal to the run.
    #[error("audit persistence failed: {0}")]
    Persistence(String),

    /// A tool name was registered twice. Fatal at startup.
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
}

impl ArgusError {
    /// Whether this error must abort the enclosing run rather than being
    /// captured as a step-level error or resolved by fallback.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::DuplicateTool(_))
    }
}
