//! End-to-end pipeline tests over a temporary paper directory, with a
//! scripted chat backend and an in-memory full-text provider.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use citelens_analysis::pipeline::{AnalysisOptions, AnalysisPipeline, FullTextProvider};
use citelens_analysis::{CitationClassifier, ClassifierConfig};
use citelens_llm::{ChatBackend, ChatRequest, ChatResponse, FinishReason, LlmError, TokenUsage};

/// Backend that replays a fixed response and counts calls.
struct ScriptedBackend {
    response: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, _req: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatResponse {
            content: self.response.clone(),
            model: "scripted".to_string(),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::new(100, 10, 110),
        })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

struct MapProvider {
    texts: HashMap<PathBuf, String>,
}

impl FullTextProvider for MapProvider {
    fn full_text(&self, path: &Path) -> Option<String> {
        self.texts.get(path).cloned()
    }
}

const POSITIVE_RESPONSE: &str =
    r#"{"Citations": [{"Text": "We build on [1].", "Analysis": "adopted as baseline", "Positive": true}]}"#;

fn citing_text() -> String {
    // One numeric citation far from the reference list so exactly one snippet
    // is produced; the entry number for the target resolves to 1.
    let filler = "lorem ipsum ".repeat(120);
    format!(
        "We build on [1] throughout this work. {filler}\n\
         References\n\
         [1] Smith, J. Target Paper Title.\n\
         [2] Doe, A. Another Work.\n\
         [3] Roe, B. Third Work.\n"
    )
}

fn setup_paper_dir(root: &Path) -> PathBuf {
    let dir = root.join("Target Paper Title");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("paper_info.json"),
        r#"{"title": "Target Paper Title", "authors": ["Jane Smith"], "year": 2022, "publication": "ICML"}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("citation_info.json"),
        r#"[
            {"index": "001", "title": "A Citing Paper", "info": "B. One - Venue", "abstract": "", "PDF": "", "filename": "A Citing Paper", "link": ""},
            {"index": "002", "title": "Missing PDF Paper", "info": "C. Two - Venue", "abstract": "", "PDF": "", "filename": "Missing PDF Paper", "link": ""}
        ]"#,
    )
    .unwrap();
    dir
}

fn pipeline_for(
    dir: &Path,
    response: &str,
    calls: Arc<AtomicUsize>,
) -> AnalysisPipeline<MapProvider> {
    let mut texts = HashMap::new();
    texts.insert(dir.join("A Citing Paper.pdf"), citing_text());
    let provider = MapProvider { texts };
    let backend = Arc::new(ScriptedBackend { response: response.to_string(), calls });
    let classifier = CitationClassifier::new(Some(backend), ClassifierConfig::default());
    AnalysisPipeline::new(provider, classifier, AnalysisOptions::default())
}

#[tokio::test]
async fn test_full_run_produces_record_and_report() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = setup_paper_dir(tmp.path());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut pipeline = pipeline_for(&dir, POSITIVE_RESPONSE, calls.clone());
    let summary = pipeline.analyze_paper_dir(&dir).await.unwrap();

    assert_eq!(summary.documents_total, 2);
    assert_eq!(summary.documents_analyzed, 1);
    assert_eq!(summary.documents_skipped, 1); // no PDF text for the second record
    assert!(summary.snippets_classified >= 1);
    assert_eq!(summary.snippets_failed, 0);

    // Per-document record persisted with the artifact field names
    let record: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.join("analysis").join("A Citing Paper.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(record["Filename"], "A Citing Paper");
    assert!(!record["AnalyzedSnippetIndices"].as_array().unwrap().is_empty());
    assert_eq!(record["Citations"][0]["Positive"], true);
    assert!(!record["Snippets"].as_array().unwrap().is_empty());

    // Aggregate report exists and carries the analyzed document
    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.join("analysis").join("all_snippets.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report.as_array().unwrap().len(), 1);
    assert_eq!(report[0]["Filename"], "A Citing Paper");
    assert_eq!(report[0]["ID"], 1);

    // Token usage accumulated
    assert_eq!(pipeline.usage().total_tokens, 110 * calls.load(Ordering::SeqCst) as u64);
}

#[tokio::test]
async fn test_second_run_skips_analyzed_snippets() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = setup_paper_dir(tmp.path());

    let first_calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = pipeline_for(&dir, POSITIVE_RESPONSE, first_calls.clone());
    pipeline.analyze_paper_dir(&dir).await.unwrap();
    assert!(first_calls.load(Ordering::SeqCst) >= 1);

    let record_before =
        std::fs::read_to_string(dir.join("analysis").join("A Citing Paper.json")).unwrap();

    // Re-run: every snippet index is already recorded, so the backend must
    // not be invoked and existing judgments must survive untouched.
    let second_calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = pipeline_for(&dir, POSITIVE_RESPONSE, second_calls.clone());
    let summary = pipeline.analyze_paper_dir(&dir).await.unwrap();

    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.snippets_classified, 0);

    let record_after: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.join("analysis").join("A Citing Paper.json")).unwrap(),
    )
    .unwrap();
    let before: serde_json::Value = serde_json::from_str(&record_before).unwrap();
    assert_eq!(record_after["Citations"], before["Citations"]);
    assert_eq!(record_after["AnalyzedSnippetIndices"], before["AnalyzedSnippetIndices"]);
}

#[tokio::test]
async fn test_malformed_response_recorded_and_retried_next_run() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = setup_paper_dir(tmp.path());

    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = pipeline_for(&dir, "I could not produce JSON, sorry.", calls.clone());
    let summary = pipeline.analyze_paper_dir(&dir).await.unwrap();

    assert_eq!(summary.snippets_classified, 0);
    assert!(summary.snippets_failed >= 1);

    // Nothing succeeded, so no record file was written; every index is
    // eligible again on the next run.
    assert!(!dir.join("analysis").join("A Citing Paper.json").exists());

    let retry_calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = pipeline_for(&dir, POSITIVE_RESPONSE, retry_calls.clone());
    let summary = pipeline.analyze_paper_dir(&dir).await.unwrap();
    assert_eq!(retry_calls.load(Ordering::SeqCst), calls.load(Ordering::SeqCst));
    assert!(summary.snippets_classified >= 1);
}

#[tokio::test]
async fn test_empty_full_text_yields_empty_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = setup_paper_dir(tmp.path());

    let calls = Arc::new(AtomicUsize::new(0));
    let mut texts = HashMap::new();
    texts.insert(dir.join("A Citing Paper.pdf"), String::new());
    texts.insert(dir.join("Missing PDF Paper.pdf"), String::new());
    let provider = MapProvider { texts };
    let backend = Arc::new(ScriptedBackend { response: POSITIVE_RESPONSE.to_string(), calls: calls.clone() });
    let classifier = CitationClassifier::new(Some(backend), ClassifierConfig::default());
    let mut pipeline = AnalysisPipeline::new(provider, classifier, AnalysisOptions::default());

    let summary = pipeline.analyze_paper_dir(&dir).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.documents_analyzed, 2);

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.join("analysis").join("all_snippets.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report.as_array().unwrap().len(), 2);
    assert!(report[0]["Citations"].as_array().unwrap().is_empty());
    assert!(report[1]["Citations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_citation_list_skips_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("No Citations Here");
    std::fs::create_dir_all(&dir).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = pipeline_for(&dir, POSITIVE_RESPONSE, calls.clone());
    let summary = pipeline.analyze_paper_dir(&dir).await.unwrap();

    assert_eq!(summary.documents_total, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!dir.join("analysis").join("all_snippets.json").exists());
}

#[tokio::test]
async fn test_missing_root_is_hard_error() {
    let tmp = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = pipeline_for(tmp.path(), POSITIVE_RESPONSE, calls);
    assert!(pipeline.run(&tmp.path().join("does-not-exist")).await.is_err());
}
