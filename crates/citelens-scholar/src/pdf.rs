//! lopdf-backed plain-text extraction.
//!
//! The analysis pipeline only consumes extracted text; extraction fidelity
//! is best-effort and a page that fails to decode is skipped.

use std::path::Path;
use tracing::{debug, warn};

/// Extract the plain text of a PDF; None when the file is missing or cannot
/// be opened.
pub fn extract_text(path: &Path) -> Option<String> {
    if !path.exists() {
        warn!(path = %path.display(), "PDF not found");
        return None;
    }
    let doc = match lopdf::Document::load(path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not open PDF");
            return None;
        }
    };

    let mut text = String::new();
    for (&page_num, _) in doc.get_pages().iter() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                debug!(path = %path.display(), page_num, error = %e, "Page extraction failed");
            }
        }
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_none() {
        assert!(extract_text(Path::new("/nonexistent/paper.pdf")).is_none());
    }

    #[test]
    fn test_non_pdf_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fake.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        assert!(extract_text(&path).is_none());
    }
}
