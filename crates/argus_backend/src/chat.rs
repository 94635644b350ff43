//! OpenAI-compatible chat-completion client.
//!
//! Used both for local emulation and the direct compose endpoint. Without an
//! API key the client answers with a deterministic mock so keyless
//! deployments still produce a structured result.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 512,
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a chat completion request and return the first choice message.
    async fn chat(&self, messages: &[ChatMessage], params: &ChatParams) -> Result<ChatMessage>;
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatChat {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatChat {
    pub fn new(url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatChat {
    async fn chat(&self, messages: &[ChatMessage], params: &ChatParams) -> Result<ChatMessage> {
        let Some(api_key) = &self.api_key else {
            // Local mock: echo a prefix of the last message.
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            let preview: String = last.chars().take(400).collect();
            return Ok(ChatMessage {
                role: "assistant".to_string(),
                content: format!("[chat-mock] {preview}"),
            });
        };

        let payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&payload)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat API error ({status}): {error_text}");
        }

        let data: Value = response.json().await?;
        let message = &data["choices"][0]["message"];
        match message["content"].as_str() {
            Some(content) => Ok(ChatMessage {
                role: message["role"].as_str().unwrap_or("assistant").to_string(),
                content: content.to_string(),
            }),
            // Some endpoints return non-standard shapes; keep whatever came back.
            None => Ok(ChatMessage {
                role: "assistant".to_string(),
                content: data.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyless_client_returns_mock() {
        let client = OpenAiCompatChat::new(
            "https://example.invalid/v1/chat/completions",
            "test-model",
            None,
            Duration::from_secs(1),
        )
        .unwrap();

        let reply = client
            .chat(
                &[ChatMessage::user("what is AAPL doing")],
                &ChatParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(reply.role, "assistant");
        assert!(reply.content.starts_with("[chat-mock]"));
        assert!(reply.content.contains("AAPL"));
    }

    #[tokio::test]
    async fn test_mock_preview_is_bounded() {
        let client = OpenAiCompatChat::new(
            "https://example.invalid/v1/chat/completions",
            "test-model",
            None,
            Duration::from_secs(1),
        )
        .unwrap();

        let long = "y".repeat(2000);
        let reply = client
            .chat(&[ChatMessage::user(long)], &ChatParams::default())
            .await
            .unwrap();
        assert!(reply.content.chars().count() <= "[chat-mock] ".len() + 400);
    }
}
