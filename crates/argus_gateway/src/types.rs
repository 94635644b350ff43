use argus_backend::ChatMessage;
use serde::Deserialize;
use serde_json::Value;

/// Inbound RPC call. Only `tool.call` is supported; anything else comes back
/// as an in-band error so callers can inspect it.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Caller-chosen run id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: RpcParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcParams {
    #[serde(default, alias = "tool")]
    pub name: String,
    #[serde(default = "empty_object", alias = "args")]
    pub arguments: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Direct chat-completion request, bypassing the analysis pipeline.
///
/// Either a full OpenAI-style `messages` array, or the `system`/`prompt`
/// convenience pair.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ComposeRequest {
    /// The message list to send; empty means the request named neither form.
    pub fn resolve_messages(&self) -> Vec<ChatMessage> {
        if !self.messages.is_empty() {
            return self.messages.clone();
        }
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        if let Some(prompt) = &self.prompt {
            messages.push(ChatMessage::user(prompt.clone()));
        }
        messages
    }
}
