//! Records exchanged between the crawler and the analysis pipeline.

use serde::{Deserialize, Serialize};

/// One citing work, as persisted in `citation_info.json`.
///
/// `filename` is the join key between the metadata record and the PDF on
/// disk (`<filename>.pdf`) and the per-document analysis artifact
/// (`<filename>.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitingRecord {
    /// Zero-padded 1-based position in the cited-by listing.
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub title: String,
    /// Display string: authors, venue and site, Chicago-derived.
    #[serde(default)]
    pub info: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    /// Direct PDF resource URL, empty when the search result carried none.
    #[serde(default, rename = "PDF")]
    pub pdf: String,
    #[serde(default)]
    pub filename: String,
    /// Landing-page URL of the citing work.
    #[serde(default)]
    pub link: String,
}

impl CitingRecord {
    /// Display label used in the aggregate report.
    pub fn display_label(&self) -> String {
        format!("{}. {}", self.title, self.info)
    }
}
