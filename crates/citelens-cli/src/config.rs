//! Configuration loading for Citelens.
//! Reads citelens.toml from the current directory or path in CITELENS_CONFIG.
//! API keys may live in the file or fall back to environment variables
//! (SERPAPI_API_KEY, CITELENS_LLM_API_KEY), typically via .env.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub scholar: ScholarConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_paper_list_dir")]
    pub paper_list_dir: String,
    #[serde(default = "default_author_info_dir")]
    pub author_info_dir: String,
}

fn default_paper_list_dir() -> String { "./paper_list".to_string() }
fn default_author_info_dir() -> String { "./author_info".to_string() }

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            paper_list_dir: default_paper_list_dir(),
            author_info_dir: default_author_info_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarConfig {
    pub api_key: Option<String>,
    pub start_year: Option<u16>,
    pub end_year: Option<u16>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_filename_words")]
    pub num_words_in_filename: usize,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "bool_true")]
    pub fetch_pdfs: bool,
    /// Titles to crawl in paper mode.
    #[serde(default)]
    pub paper_titles: Vec<String>,
    /// Google Scholar author id for author mode.
    pub author_id: Option<String>,
    pub author_name: Option<String>,
}

fn default_page_size()      -> usize { 20 }
fn default_filename_words() -> usize { 8 }
fn default_timeout()        -> u64   { 30 }
fn bool_true()              -> bool  { true }

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            start_year: None,
            end_year: None,
            page_size: default_page_size(),
            num_words_in_filename: default_filename_words(),
            timeout_secs: default_timeout(),
            fetch_pdfs: true,
            paper_titles: Vec::new(),
            author_id: None,
            author_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai_compatible" or "anthropic".
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default)]
    pub pause_seconds: f64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider()    -> String { "openai_compatible".to_string() }
fn default_base_url()    -> String { "https://api.deepseek.com".to_string() }
fn default_model()       -> String { "deepseek-chat".to_string() }
fn default_temperature() -> f32    { 0.2 }
fn default_max_tokens()  -> u32    { 4096 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            pause_seconds: 0.0,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_snippet_length")]
    pub snippet_length: usize,
}

fn default_similarity_threshold() -> f64   { 80.0 }
fn default_snippet_length()       -> usize { 1000 }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            snippet_length: default_snippet_length(),
        }
    }
}

impl Config {
    /// Load configuration from citelens.toml.
    /// Checks CITELENS_CONFIG env var first, then the current directory.
    /// A missing file yields the defaults (keys then come from env vars).
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CITELENS_CONFIG").unwrap_or_else(|_| "citelens.toml".to_string());
        if !Path::new(&path).exists() {
            tracing::warn!(
                "Config file not found: {path}; using defaults. \
                 Copy citelens.example.toml to citelens.toml to customize."
            );
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn serpapi_key(&self) -> Option<String> {
        self.scholar
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("SERPAPI_API_KEY").ok().filter(|k| !k.is_empty()))
    }

    pub fn llm_key(&self) -> Option<String> {
        self.llm
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("CITELENS_LLM_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}
