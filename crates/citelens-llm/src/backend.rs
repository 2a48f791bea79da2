//! Chat-completion backend trait and concrete implementations.
//!
//! Backends:
//!   OpenAiCompatibleBackend — any OpenAI-compatible /v1/chat/completions
//!                             endpoint (DeepSeek, OpenAI, Ollama, vLLM, …)
//!   AnthropicBackend        — Anthropic Messages API (claude-*)
//!
//! Responses carry a normalized finish reason and per-call token counts so
//! callers can reject truncated output and keep running usage totals.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::usage::TokenUsage;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Request a JSON-object response where the backend supports it.
    pub json_mode: bool,
}

/// Why the model stopped generating, normalized across providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of turn ("stop" / "end_turn").
    Stop,
    /// Output hit the token limit ("length" / "max_tokens").
    Length,
    Other(String),
}

impl FinishReason {
    fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }

    fn from_anthropic(reason: &str) -> Self {
        match reason {
            "end_turn" | "stop_sequence" => FinishReason::Stop,
            "max_tokens" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, FinishReason::Stop)
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::Other(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError>;
    fn model_id(&self) -> &str;
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_openai_chat(json: &serde_json::Value, fallback_model: &str) -> ChatResponse {
    let choice = &json["choices"][0];
    ChatResponse {
        content: choice["message"]["content"].as_str().unwrap_or("").to_string(),
        model: json["model"].as_str().unwrap_or(fallback_model).to_string(),
        finish_reason: FinishReason::from_openai(choice["finish_reason"].as_str().unwrap_or("")),
        usage: TokenUsage::new(
            json["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            json["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            json["usage"]["total_tokens"].as_u64().unwrap_or(0),
        ),
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::Api { status, message: msg });
    }
    Ok(body)
}

// ── 1. OpenAI-compatible (DeepSeek, OpenAI, Ollama, vLLM, …) ─────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let mut body = serde_json::json!({
            "model":       &self.model,
            "messages":    req.messages,
            "max_tokens":  req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.2),
        });
        if req.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_chat(&json, &self.model))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── 2. Anthropic (claude-*) ───────────────────────────────────────────────────

pub struct AnthropicBackend {
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), model: model.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        // Messages API: the system prompt travels outside the message list
        let system = req
            .messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let messages: Vec<serde_json::Value> = req
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
            .collect();

        // No response_format equivalent; json_mode is enforced by the prompt.
        let mut body = serde_json::json!({
            "model":      &self.model,
            "messages":   messages,
            "max_tokens": req.max_tokens.unwrap_or(4096),
        });
        if let Some(temperature) = req.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system.to_string());
        }

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let json = check_response_status(resp).await?;

        let content = json["content"]
            .as_array()
            .and_then(|blocks| blocks.first())
            .and_then(|b| b["text"].as_str())
            .unwrap_or("")
            .to_string();

        let prompt_tokens = json["usage"]["input_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = json["usage"]["output_tokens"].as_u64().unwrap_or(0);

        Ok(ChatResponse {
            content,
            model: json["model"].as_str().unwrap_or(&self.model).to_string(),
            finish_reason: FinishReason::from_anthropic(
                json["stop_reason"].as_str().unwrap_or(""),
            ),
            usage: TokenUsage::new(prompt_tokens, completion_tokens, prompt_tokens + completion_tokens),
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_chat_full_response() {
        let json = serde_json::json!({
            "model": "deepseek-chat",
            "choices": [{
                "message": { "role": "assistant", "content": "{\"Citations\": []}" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128 }
        });
        let resp = parse_openai_chat(&json, "fallback");
        assert_eq!(resp.content, "{\"Citations\": []}");
        assert_eq!(resp.model, "deepseek-chat");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(resp.usage, TokenUsage::new(120, 8, 128));
    }

    #[test]
    fn test_parse_openai_chat_truncated() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "partial" }, "finish_reason": "length" }]
        });
        let resp = parse_openai_chat(&json, "m");
        assert_eq!(resp.finish_reason, FinishReason::Length);
        assert!(!resp.finish_reason.is_stop());
        assert_eq!(resp.model, "m");
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert!(FinishReason::from_openai("stop").is_stop());
        assert!(FinishReason::from_anthropic("end_turn").is_stop());
        assert_eq!(FinishReason::from_anthropic("max_tokens"), FinishReason::Length);
        assert_eq!(
            FinishReason::from_openai("content_filter"),
            FinishReason::Other("content_filter".to_string())
        );
    }

    #[test]
    fn test_openai_compatible_without_key() {
        // No API key is valid for local OpenAI-compatible servers
        let b = OpenAiCompatibleBackend::new("http://localhost:11434", "llama3:8b", None);
        assert_eq!(b.model_id(), "llama3:8b");
    }

    #[test]
    fn test_anthropic_model_id() {
        let b = AnthropicBackend::new("sk-ant-test", "claude-sonnet-4-5");
        assert_eq!(b.model_id(), "claude-sonnet-4-5");
    }
}
