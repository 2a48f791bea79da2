//! citelens-analysis — Citation-context extraction and classification.
//!
//! The pipeline for one citing document:
//!   1. Locate the target paper in the document's reference list (fuzzy match)
//!   2. Scan the full text for in-text occurrences (numeric, author-year, alias)
//!   3. Carve merged snippets around the occurrences
//!   4. Classify each snippet through a chat backend, persisting after every
//!      success so interrupted runs resume without re-judging
//!   5. Aggregate per-document judgments into a batch report

pub mod classifier;
pub mod occurrences;
pub mod paper;
pub mod pipeline;
pub mod record;
pub mod reference;
pub mod report;
pub mod snippets;
pub mod text;

pub use classifier::{CitationClassifier, ClassifierConfig, ClassifyError};
pub use paper::PaperInfo;
pub use pipeline::{AnalysisOptions, AnalysisPipeline, AnalysisSummary, FullTextProvider};
pub use record::{AnalysisRecord, Judgment};
pub use report::ReportEntry;
