//! Token-usage accounting.

use serde::Serialize;
use std::fmt;

/// Token counters for one call, or a running total across a batch.
///
/// The pipeline is single-threaded, so accumulation is plain addition with
/// no synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self { prompt_tokens, completion_tokens, total_tokens }
    }

    /// Fold another call's counters into this running total.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

impl fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prompt: {}, completion: {}, total: {}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}
