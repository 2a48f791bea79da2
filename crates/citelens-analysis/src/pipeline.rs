//! End-to-end analysis pipeline.
//!
//! Orchestrates the full flow for one paper directory:
//!   1. Load target-paper metadata (synthesized from the directory name when
//!      no `paper_info.json` exists)
//!   2. Load the citing-work records from `citation_info.json`
//!   3. Per citing document: full text → reference number → occurrences →
//!      snippets → classify unjudged snippets, persisting after each success
//!   4. Aggregate per-document judgments into `all_snippets.json`
//!
//! The pipeline is non-destructive: per-snippet and per-document failures are
//! logged and skipped; only a missing paper-list root aborts the run.

use std::path::Path;
use tracing::{info, warn};

use citelens_common::workspace::{
    list_paper_dirs, ANALYSIS_DIR, CITATION_INFO_FILE, PAPER_INFO_FILE, REPORT_FILE,
};
use citelens_common::CitingRecord;
use citelens_llm::TokenUsage;

use crate::classifier::CitationClassifier;
use crate::occurrences::find_occurrences;
use crate::paper::PaperInfo;
use crate::record::AnalysisRecord;
use crate::reference::ReferenceLocator;
use crate::report::{sort_judgments, sort_report, write_report, ReportEntry};
use crate::snippets::extract_snippets;
use crate::text::CharMap;

/// Supplies the plain text of a citing document; None when unavailable.
/// PDF parsing lives behind this seam; the pipeline never touches binaries.
pub trait FullTextProvider {
    fn full_text(&self, path: &Path) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Minimum 0–100 similarity for a reference-list title match.
    pub similarity_threshold: f64,
    /// Width of one classification snippet, in chars.
    pub snippet_length: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { similarity_threshold: 80.0, snippet_length: 1000 }
    }
}

/// Counters for one paper directory.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSummary {
    pub documents_total: usize,
    pub documents_analyzed: usize,
    pub documents_skipped: usize,
    pub snippets_classified: usize,
    pub snippets_failed: usize,
}

pub struct AnalysisPipeline<P> {
    provider: P,
    classifier: CitationClassifier,
    locator: ReferenceLocator,
    options: AnalysisOptions,
}

impl<P: FullTextProvider> AnalysisPipeline<P> {
    pub fn new(provider: P, classifier: CitationClassifier, options: AnalysisOptions) -> Self {
        let locator = ReferenceLocator::new(options.similarity_threshold);
        Self { provider, classifier, locator, options }
    }

    /// Running token totals across every classification call so far.
    pub fn usage(&self) -> TokenUsage {
        self.classifier.usage()
    }

    /// Analyze every paper directory under `root`, in name order.
    pub async fn run(&mut self, root: &Path) -> anyhow::Result<Vec<AnalysisSummary>> {
        if !root.exists() {
            anyhow::bail!(
                "paper list directory not found: {} (crawl citations first)",
                root.display()
            );
        }
        let mut summaries = Vec::new();
        for dir in list_paper_dirs(root)? {
            summaries.push(self.analyze_paper_dir(&dir).await?);
        }
        info!(usage = %self.usage(), "Total token usage for this run");
        Ok(summaries)
    }

    /// Analyze all citing documents of one target paper.
    pub async fn analyze_paper_dir(&mut self, dir: &Path) -> anyhow::Result<AnalysisSummary> {
        info!(dir = %dir.display(), "Starting analysis");
        let mut summary = AnalysisSummary::default();

        let analysis_dir = dir.join(ANALYSIS_DIR);
        std::fs::create_dir_all(&analysis_dir)?;

        let paper_info = PaperInfo::load(&dir.join(PAPER_INFO_FILE)).unwrap_or_else(|| {
            let dirname = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            warn!(dir = %dir.display(), "No usable paper_info.json; using title-only metadata");
            PaperInfo::synthesized(dirname)
        });

        let citations = match load_citations(&dir.join(CITATION_INFO_FILE)) {
            Some(citations) => citations,
            None => {
                warn!(dir = %dir.display(), "No citation_info.json; skipping directory");
                return Ok(summary);
            }
        };
        summary.documents_total = citations.len();

        let paper_citation = paper_info.citation();
        let mut entries: Vec<ReportEntry> = Vec::new();

        for (i, citing) in citations.iter().enumerate() {
            if citing.filename.is_empty() {
                summary.documents_skipped += 1;
                continue;
            }

            let pdf_path = dir.join(format!("{}.pdf", citing.filename));
            let Some(full_text) = self.provider.full_text(&pdf_path) else {
                warn!(filename = %citing.filename, "No full text; skipping document");
                summary.documents_skipped += 1;
                continue;
            };

            // Pure derivation: identical on every run for the same inputs
            let map = CharMap::new(&full_text);
            let reference_number = self.locator.locate(&paper_info.title, &full_text);
            let occurrences = find_occurrences(
                &full_text,
                &map,
                &paper_info.authors,
                paper_info.year,
                reference_number,
                &paper_info.approach_names,
            );
            let snippets =
                extract_snippets(&full_text, &map, &occurrences, self.options.snippet_length);
            info!(
                filename = %citing.filename,
                reference_number,
                occurrences = occurrences.len(),
                snippets = snippets.len(),
                "Citation contexts extracted"
            );

            let record_path = analysis_dir.join(format!("{}.json", citing.filename));
            let mut record = AnalysisRecord::load_or_new(&record_path, &citing.filename, &citing.info);
            record.snippets = snippets.clone();

            for (index, snippet) in snippets.iter().enumerate() {
                let index = index + 1; // snippet indices are 1-based
                if record.should_skip(index) {
                    continue;
                }

                match self
                    .classifier
                    .classify(&paper_citation, reference_number, &paper_info.approach_names, snippet)
                    .await
                {
                    Ok(judgments) => {
                        info!(
                            filename = %citing.filename,
                            index,
                            judgments = judgments.len(),
                            "Snippet classified"
                        );
                        record.record(index, judgments);
                        summary.snippets_classified += 1;
                    }
                    Err(e) => {
                        warn!(filename = %citing.filename, index, error = %e, "Snippet classification failed");
                        record.record_failure(index, e.to_string());
                        summary.snippets_failed += 1;
                    }
                }

                // Durable after every success; a crash loses at most one call
                if record.is_dirty() {
                    if let Err(e) = record.persist(&record_path) {
                        warn!(path = %record_path.display(), error = %e, "Could not persist analysis record");
                    }
                }
            }

            let mut judgments = record.judgments.clone();
            sort_judgments(&mut judgments);
            entries.push(ReportEntry {
                judgments,
                paper: citing.display_label(),
                id: i + 1,
                filename: citing.filename.clone(),
            });
            summary.documents_analyzed += 1;
        }

        sort_report(&mut entries);
        write_report(&analysis_dir.join(REPORT_FILE), &entries)?;
        info!(
            dir = %dir.display(),
            analyzed = summary.documents_analyzed,
            skipped = summary.documents_skipped,
            classified = summary.snippets_classified,
            failed = summary.snippets_failed,
            "Analysis complete"
        );
        Ok(summary)
    }
}

/// Load the citing-work records; None when the file is missing or corrupt.
fn load_citations(path: &Path) -> Option<Vec<CitingRecord>> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(citations) => Some(citations),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable citation_info.json");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = AnalysisOptions::default();
        assert_eq!(options.similarity_threshold, 80.0);
        assert_eq!(options.snippet_length, 1000);
    }

    #[test]
    fn test_load_citations_missing_file() {
        assert!(load_citations(Path::new("/nonexistent/citation_info.json")).is_none());
    }
}
