//! Per-document analysis record: incremental persistence and resume.
//!
//! The record is rewritten whole after every successful snippet
//! classification, so a crash loses at most the one in-flight call. On the
//! next run, indices already in `analyzed` are skipped and their judgments
//! kept; failed indices stay absent and are retried.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

use citelens_common::Result;

/// One positive/negative verdict about a citing statement inside a snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgment {
    /// The citing statement, quoted from the snippet.
    #[serde(rename = "Text")]
    pub text: String,
    /// Short justification for the verdict.
    #[serde(rename = "Analysis")]
    pub analysis: String,
    /// Whether the statement characterizes the target favorably.
    #[serde(rename = "Positive")]
    pub positive: bool,
}

/// Durable state for one citing document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "PaperInfo")]
    pub paper_info: String,
    #[serde(rename = "Citations")]
    pub judgments: Vec<Judgment>,
    /// 1-based snippet indices whose judgments are already recorded.
    #[serde(rename = "AnalyzedSnippetIndices")]
    pub analyzed: BTreeSet<usize>,
    /// (index, message) pairs for classification calls that failed this run.
    #[serde(rename = "EncounteredExceptions")]
    pub failures: Vec<(usize, String)>,
    #[serde(rename = "Snippets")]
    pub snippets: Vec<String>,
    /// True once this run produced something worth persisting.
    #[serde(skip)]
    dirty: bool,
}

impl AnalysisRecord {
    pub fn new(filename: impl Into<String>, paper_info: impl Into<String>) -> Self {
        Self { filename: filename.into(), paper_info: paper_info.into(), ..Default::default() }
    }

    /// Load prior judgments and analyzed indices from `path`. Everything else
    /// (snippets, failures) is reset for the new run; a missing or corrupt
    /// file just means a fresh record.
    pub fn load_or_new(path: &Path, filename: &str, paper_info: &str) -> Self {
        let mut record = Self::new(filename, paper_info);
        match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<AnalysisRecord>(&data) {
                Ok(prior) => {
                    record.judgments = prior.judgments;
                    record.analyzed = prior.analyzed;
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Existing analysis record is corrupt; re-analyzing from scratch"
                    );
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read analysis record");
            }
        }
        record
    }

    /// True iff `index` was already classified (this run or a prior one).
    pub fn should_skip(&self, index: usize) -> bool {
        self.analyzed.contains(&index)
    }

    /// Record a successful classification of snippet `index`.
    pub fn record(&mut self, index: usize, judgments: Vec<Judgment>) {
        self.judgments.extend(judgments);
        self.analyzed.insert(index);
        self.dirty = true;
    }

    /// Record a failed classification; the index stays retryable.
    pub fn record_failure(&mut self, index: usize, message: impl Into<String>) {
        self.failures.push((index, message.into()));
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rewrite the whole record at `path`.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}
