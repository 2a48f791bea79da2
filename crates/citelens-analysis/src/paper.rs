//! Target-paper metadata.

use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::warn;

/// Metadata for the paper whose citations are being analyzed.
///
/// Loaded once per paper directory from `paper_info.json` and shared
/// read-only across all citing documents in the batch. Crawled records may
/// store `authors` and `approach_name` as either a single string or a list;
/// both normalize to a list at this boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct PaperInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub authors: Vec<String>,
    /// Informal names of the approach/method, used to catch alias mentions.
    #[serde(default, rename = "approach_name", deserialize_with = "one_or_many")]
    pub approach_names: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub publication: String,
}

impl PaperInfo {
    /// Load from `paper_info.json`; None when the file is missing or unreadable.
    pub fn load(path: &Path) -> Option<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(_) => return None,
        };
        match serde_json::from_str::<PaperInfo>(&data) {
            Ok(mut info) => {
                info.normalize();
                Some(info)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable paper_info.json");
                None
            }
        }
    }

    /// Title-only record used when no stored metadata exists.
    pub fn synthesized(title: impl Into<String>) -> Self {
        let mut info = PaperInfo {
            title: title.into(),
            authors: Vec::new(),
            approach_names: Vec::new(),
            year: None,
            publication: String::new(),
        };
        info.normalize();
        info
    }

    /// Drop empty entries; default the approach name to the text before the
    /// first colon of the title when none was given.
    fn normalize(&mut self) {
        self.authors.retain(|a| !a.trim().is_empty());
        self.approach_names.retain(|n| !n.trim().is_empty());
        if self.approach_names.is_empty() {
            if let Some((head, _)) = self.title.split_once(':') {
                let head = head.trim();
                if !head.is_empty() {
                    self.approach_names.push(head.to_string());
                }
            }
        }
    }

    /// Display citation string used in classification prompts.
    pub fn citation(&self) -> String {
        format!("{}. {}. {}.", self.authors.join(", "), self.title, self.publication)
    }
}

/// Accept a JSON string or array of strings; a single string becomes a
/// one-element list, null/absent an empty one.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(OneOrMany::One(s)) => Ok(vec![s]),
        Some(OneOrMany::Many(v)) => Ok(v),
    }
}
