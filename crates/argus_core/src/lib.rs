//! Shared types for the Argus orchestrator: identifiers, error taxonomy,
//! configuration, credential resolution, tool abstractions, step references,
//! and the context envelope.

pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod step;
pub mod tool;

pub use config::ArgusConfig;
pub use credentials::{CredentialChain, CredentialProvider, Lookup};
pub use envelope::{AuditedToolOutput, Envelope, EnvelopeBuilder};
pub use error::ArgusError;
pub use ids::{EnvelopeId, Fingerprint, RunId};
pub use step::{Stage, StepRef, TraceStep};
pub use tool::{Sensitivity, Tool, ToolManifestEntry};
