//! citelens-llm — Chat-completion backend abstraction.
//! Implements the ChatBackend trait used by the analysis classifier.

pub mod backend;
pub mod usage;

pub use backend::{
    AnthropicBackend, ChatBackend, ChatMessage, ChatRequest, ChatResponse, FinishReason, LlmError,
    OpenAiCompatibleBackend,
};
pub use usage::TokenUsage;
