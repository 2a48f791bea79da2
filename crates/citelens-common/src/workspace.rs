//! Paper-list working directory layout.
//!
//! One directory per target paper under the paper-list root:
//!
//! ```text
//! paper_list/<dir>/
//!   paper_info.json       target-paper metadata
//!   citation_info.json    citing-work records
//!   <filename>.pdf        downloaded citing documents
//!   analysis/             per-document records + aggregate report
//! ```

use std::path::{Path, PathBuf};

/// Subdirectory holding per-document analysis records and the batch report.
pub const ANALYSIS_DIR: &str = "analysis";
/// Target-paper metadata file inside a paper directory.
pub const PAPER_INFO_FILE: &str = "paper_info.json";
/// Citing-work records file inside a paper directory.
pub const CITATION_INFO_FILE: &str = "citation_info.json";
/// Aggregate report file inside the analysis subdirectory.
pub const REPORT_FILE: &str = "all_snippets.json";

/// Derive a filesystem-safe name from a paper title: the first `max_words`
/// words, with characters that break paths or shell globbing removed.
pub fn safe_filename(title: &str, max_words: usize) -> String {
    let words: Vec<&str> = title.split_whitespace().collect();
    let name = if words.len() <= max_words {
        words.join(" ")
    } else {
        words[..max_words].join(" ")
    };
    name.replace(':', "").replace('?', "").replace('/', "_")
}

/// Paper directories under the paper-list root, sorted by name.
pub fn list_paper_dirs(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}
