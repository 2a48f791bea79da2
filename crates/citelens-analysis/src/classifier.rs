//! Snippet classification through a chat-completion backend.
//!
//! The classifier owns prompt templating, the pre-call pause, response
//! parsing (JSON object bounded by the first `{` and last `}`), key
//! normalization, strict schema validation, and running token-usage totals.
//! One failed call is one `ClassifyError`; it is never retried here — the
//! pipeline records it and moves on.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use citelens_llm::{ChatBackend, ChatMessage, ChatRequest, LlmError, TokenUsage};

use crate::record::Judgment;

pub const SYSTEM_PROMPT: &str = "\
You analyze how academic papers talk about one specific cited work. \
You are given an excerpt from a citing paper and told how the cited work may \
appear in it (reference number, author-year citation, or method name). \
Find every statement in the excerpt that refers to the cited work and judge \
whether it characterizes that work favorably (building on it, praising it, \
using it as the state of the art) or unfavorably (pointing out limitations, \
weaknesses, or results it fails on).\n\
\n\
Respond with a single JSON object, nothing else, in exactly this shape:\n\
{\"Citations\": [{\"Text\": \"<the citing statement, quoted from the excerpt>\", \
\"Analysis\": \"<one or two sentences explaining the judgment>\", \
\"Positive\": true}]}\n\
\n\
Use one entry per independent citing statement. If the excerpt contains no \
statement about the cited work, return {\"Citations\": []}. Do not add any \
field beyond Text, Analysis, and Positive.";

pub const USER_TEMPLATE: &str = "\
The cited work is: {paper}\n\
In the excerpt it may appear as reference number [{reference_number}], as an \
author-year citation, or under the name {approach_name}.\n\
\n\
Excerpt:\n\
{text}";

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("no classification backend configured (missing API key?)")]
    NoBackend,
    #[error("backend error: {0}")]
    Backend(#[from] LlmError),
    #[error("response did not finish cleanly: {0}")]
    Incomplete(String),
    #[error("no JSON object found in response")]
    NoJsonObject,
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response failed schema validation: {0}")]
    Schema(String),
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Pause enforced before every call; crude local rate limiting.
    pub pause_seconds: f64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub user_template: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            pause_seconds: 0.0,
            temperature: 0.2,
            max_tokens: 4096,
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_template: USER_TEMPLATE.to_string(),
        }
    }
}

pub struct CitationClassifier {
    backend: Option<Arc<dyn ChatBackend>>,
    config: ClassifierConfig,
    usage: TokenUsage,
}

impl CitationClassifier {
    pub fn new(backend: Option<Arc<dyn ChatBackend>>, config: ClassifierConfig) -> Self {
        if backend.is_none() {
            warn!("No classification backend configured; analysis calls will fail");
        }
        Self { backend, config, usage: TokenUsage::default() }
    }

    /// Running token totals across all calls made by this classifier.
    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn build_user_prompt(
        &self,
        paper_citation: &str,
        reference_number: Option<u32>,
        alias_names: &[String],
        snippet: &str,
    ) -> String {
        let reference_number = reference_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "none".to_string());
        self.config
            .user_template
            .replace("{paper}", paper_citation)
            .replace("{reference_number}", &reference_number)
            .replace("{approach_name}", &alias_names.join(", or "))
            .replace("{text}", snippet)
    }

    /// Classify one snippet into zero or more judgments.
    pub async fn classify(
        &mut self,
        paper_citation: &str,
        reference_number: Option<u32>,
        alias_names: &[String],
        snippet: &str,
    ) -> Result<Vec<Judgment>, ClassifyError> {
        let backend = self.backend.clone().ok_or(ClassifyError::NoBackend)?;

        if self.config.pause_seconds > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(self.config.pause_seconds)).await;
        }

        let user = self.build_user_prompt(paper_citation, reference_number, alias_names, snippet);
        debug!(system = %self.config.system_prompt, user = %user, "Sending classification request");

        let req = ChatRequest {
            messages: vec![
                ChatMessage::system(self.config.system_prompt.clone()),
                ChatMessage::user(user),
            ],
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            json_mode: true,
        };
        let resp = backend.complete(req).await?;

        self.usage.add(&resp.usage);
        debug!(content = %resp.content, usage = %resp.usage, "Received classification response");

        if !resp.finish_reason.is_stop() {
            return Err(ClassifyError::Incomplete(resp.finish_reason.to_string()));
        }

        parse_judgments(&resp.content)
    }
}

/// Parse and validate a raw model response into judgments.
pub fn parse_judgments(raw: &str) -> Result<Vec<Judgment>, ClassifyError> {
    let start = raw.find('{').ok_or(ClassifyError::NoJsonObject)?;
    let end = raw.rfind('}').ok_or(ClassifyError::NoJsonObject)?;
    if end < start {
        return Err(ClassifyError::NoJsonObject);
    }

    let mut value: Value = serde_json::from_str(&raw[start..=end])?;
    normalize_keys(&mut value);
    validate(&value)?;

    let judgments = serde_json::from_value(value["Citations"].take())?;
    Ok(judgments)
}

/// Map lowercase response keys to the canonical capitalized form:
/// `citations` → `Citations`, item fields `text`/`analysis`/`positive` →
/// `Text`/`Analysis`/`Positive`. Applied only when the canonical key is absent.
fn normalize_keys(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else { return };
    if obj.contains_key("Citations") {
        return;
    }
    let Some(items) = obj.remove("citations") else { return };
    let fixed: Vec<Value> = items
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|c| {
                    serde_json::json!({
                        "Text": c.get("text").and_then(Value::as_str).unwrap_or(""),
                        "Analysis": c.get("analysis").and_then(Value::as_str).unwrap_or(""),
                        "Positive": c.get("positive").and_then(Value::as_bool).unwrap_or(false),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    obj.insert("Citations".to_string(), Value::Array(fixed));
}

/// Enforce the response schema: an object holding exactly `Citations`, an
/// array of objects each holding exactly `Text` (string), `Analysis`
/// (string), `Positive` (bool).
fn validate(value: &Value) -> Result<(), ClassifyError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ClassifyError::Schema("response is not a JSON object".to_string()))?;

    for key in obj.keys() {
        if key != "Citations" {
            return Err(ClassifyError::Schema(format!("unexpected field `{key}`")));
        }
    }
    let items = obj
        .get("Citations")
        .and_then(Value::as_array)
        .ok_or_else(|| ClassifyError::Schema("`Citations` must be an array".to_string()))?;

    for (i, item) in items.iter().enumerate() {
        let entry = item.as_object().ok_or_else(|| {
            ClassifyError::Schema(format!("`Citations[{i}]` is not an object"))
        })?;
        for key in entry.keys() {
            if !matches!(key.as_str(), "Text" | "Analysis" | "Positive") {
                return Err(ClassifyError::Schema(format!(
                    "unexpected field `{key}` in `Citations[{i}]`"
                )));
            }
        }
        if entry.get("Text").and_then(Value::as_str).is_none() {
            return Err(ClassifyError::Schema(format!(
                "`Citations[{i}].Text` must be a string"
            )));
        }
        if entry.get("Analysis").and_then(Value::as_str).is_none() {
            return Err(ClassifyError::Schema(format!(
                "`Citations[{i}].Analysis` must be a string"
            )));
        }
        if entry.get("Positive").and_then(Value::as_bool).is_none() {
            return Err(ClassifyError::Schema(format!(
                "`Citations[{i}].Positive` must be a boolean"
            )));
        }
    }
    Ok(())
}
