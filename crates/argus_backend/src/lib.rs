//! Reasoning backend dispatch.
//!
//! A dispatch resolves to exactly one structured result: the remote workflow
//! engine when configured and healthy, otherwise a local multi-role
//! chat-completion emulation. Malformed model output degrades to a tagged
//! stand-in; a dispatch never fails outright.

pub mod chat;
pub mod dispatch;
pub mod emulation;
pub mod workflow;

pub use chat::{ChatBackend, ChatMessage, ChatParams, OpenAiCompatChat};
pub use dispatch::{BackendResult, BackendSource, Dispatcher};
pub use emulation::RoleParse;
pub use workflow::{WorkflowBackend, WorkflowClient};
