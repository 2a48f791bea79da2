//! SerpApi Google Scholar client.
//!
//! Three engines are used:
//!   google_scholar        — paper lookup and cited-by pagination
//!   google_scholar_cite   — formatted citation strings (Chicago)
//!   google_scholar_author — an author's article listing
//!
//! Requests are one-shot: a failed page is surfaced to the caller, which
//! logs and moves on. No retry scheduling happens here.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use citelens_common::{CitelensError, CitingRecord, Result};
use citelens_common::workspace::safe_filename;

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

lazy_static! {
    /// CJK text in a publication summary skips Chicago reformatting.
    static ref CJK: Regex =
        Regex::new(r"[\u{4e00}-\u{9fff}\u{3040}-\u{30ff}\u{ac00}-\u{d7af}]")
            .expect("static CJK pattern");
}

/// A target paper resolved through Scholar search.
#[derive(Debug, Clone)]
pub struct PaperLookup {
    pub title: String,
    pub authors: String,
    pub publication: String,
    pub link: String,
    /// Scholar's cluster id for "cited by" queries; None when nothing cites
    /// the paper (or it was not found).
    pub cites_id: Option<String>,
}

/// One page of cited-by results.
#[derive(Debug, Clone, Default)]
pub struct CitedByPage {
    pub total_results: usize,
    /// (1-based position within the page, raw organic result)
    pub results: Vec<(usize, Value)>,
}

/// One article from an author listing, persisted under `author_info/`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthorArticle {
    pub title: String,
    pub authors: String,
    pub year: String,
    pub publication: String,
    pub link: String,
    pub cite_id: Option<String>,
    pub dirname: String,
    /// Citations inside the crawl's year window, filled during filtering.
    #[serde(default)]
    pub cite_num_within_time: usize,
}

pub struct ScholarClient {
    api_key: String,
    client: reqwest::Client,
}

impl ScholarClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), client: reqwest::Client::new() }
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<Value> {
        let resp = self
            .client
            .get(SERPAPI_URL)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;
        let status = resp.status();
        let body: Value = resp.json().await?;
        if let Some(message) = body["error"].as_str() {
            return Err(CitelensError::SearchApi(message.to_string()));
        }
        if !status.is_success() {
            return Err(CitelensError::SearchApi(format!("HTTP {status}")));
        }
        Ok(body)
    }

    /// Resolve a paper by title; None when Scholar returns no results.
    pub async fn lookup_paper(&self, title: &str) -> Result<Option<PaperLookup>> {
        let body = self
            .get(&[("engine", "google_scholar".to_string()), ("q", title.to_string())])
            .await?;
        let Some(first) = body["organic_results"].as_array().and_then(|a| a.first()) else {
            return Ok(None);
        };
        Ok(Some(PaperLookup {
            title: title.to_string(),
            authors: first["publication_info"]["authors"]
                .as_array()
                .map(|authors| {
                    authors
                        .iter()
                        .filter_map(|a| a["name"].as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default(),
            publication: first["publication_info"]["summary"].as_str().unwrap_or("").to_string(),
            link: first["link"].as_str().unwrap_or("").to_string(),
            cites_id: first["inline_links"]["cited_by"]["cites_id"].as_str().map(String::from),
        }))
    }

    /// Fetch one page of works citing `cites_id`.
    pub async fn cited_by_page(
        &self,
        cites_id: &str,
        start: usize,
        page_size: usize,
        year_range: (Option<u16>, Option<u16>),
    ) -> Result<CitedByPage> {
        let mut params = vec![
            ("engine", "google_scholar".to_string()),
            ("cites", cites_id.to_string()),
            ("num", page_size.to_string()),
            ("start", start.to_string()),
        ];
        if let Some(from) = year_range.0 {
            params.push(("as_ylo", from.to_string()));
        }
        if let Some(to) = year_range.1 {
            params.push(("as_yhi", to.to_string()));
        }
        let body = self.get(&params).await?;

        let total_results = body["search_information"]["total_results"]
            .as_u64()
            .or_else(|| body["search_information"]["total_results"].as_str()?.parse().ok())
            .unwrap_or(0) as usize;

        let results = body["organic_results"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .map(|r| (r["position"].as_u64().unwrap_or(0) as usize, r.clone()))
                    .collect()
            })
            .unwrap_or_default();

        debug!(cites_id, start, total_results, "Cited-by page fetched");
        Ok(CitedByPage { total_results, results })
    }

    /// Chicago-style citation string for a search result id.
    pub async fn chicago_citation(&self, result_id: &str) -> Result<Option<String>> {
        let body = self
            .get(&[("engine", "google_scholar_cite".to_string()), ("q", result_id.to_string())])
            .await?;
        let citations = body["citations"].as_array().cloned().unwrap_or_default();
        let chicago = citations
            .iter()
            .find(|c| c["title"].as_str() == Some("Chicago"))
            .or_else(|| citations.get(2))
            .and_then(|c| c["snippet"].as_str())
            .map(String::from);
        Ok(chicago)
    }

    /// One page (up to 100) of an author's articles.
    pub async fn author_articles(&self, author_id: &str, start: usize) -> Result<Vec<AuthorArticle>> {
        let body = self
            .get(&[
                ("engine", "google_scholar_author".to_string()),
                ("author_id", author_id.to_string()),
                ("num", "100".to_string()),
                ("start", start.to_string()),
            ])
            .await?;
        if body["author"].is_null() {
            return Err(CitelensError::SearchApi(format!("author {author_id} not found")));
        }
        let articles = body["articles"].as_array().cloned().unwrap_or_default();
        Ok(articles
            .iter()
            .filter(|a| {
                !a["title"].as_str().unwrap_or("").starts_with("Supplementary")
            })
            .map(|a| {
                let title = a["title"].as_str().unwrap_or("").to_string();
                AuthorArticle {
                    dirname: safe_filename(&title, 8),
                    // Scholar marks shared first authorship with '*'
                    authors: a["authors"].as_str().unwrap_or("").replace('*', ""),
                    year: a["year"].as_str().unwrap_or("").to_string(),
                    publication: a["publication"].as_str().unwrap_or("").to_string(),
                    link: a["link"].as_str().unwrap_or("").to_string(),
                    cite_id: cite_id_from_link(a["cited_by"]["link"].as_str().unwrap_or("")),
                    cite_num_within_time: 0,
                    title,
                }
            })
            .collect())
    }

    /// Citing-work count for `cites_id` within the year window.
    pub async fn cited_by_count(
        &self,
        cites_id: &str,
        year_range: (Option<u16>, Option<u16>),
    ) -> Result<usize> {
        let page = self.cited_by_page(cites_id, 0, 1, year_range).await?;
        Ok(page.total_results)
    }
}

/// Pull the cluster id out of a "cited by" link (`…?cites=123456…`).
pub fn cite_id_from_link(link: &str) -> Option<String> {
    let (_, tail) = link.split_once("cites=")?;
    let id: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Convert one organic cited-by result into a CitingRecord.
/// `index` is the 1-based global position in the listing.
pub fn record_from_result(result: &Value, index: usize, num_filename_words: usize) -> CitingRecord {
    let title = result["title"].as_str().unwrap_or("").to_string();
    let pdf = result["resources"]
        .as_array()
        .and_then(|r| r.first())
        .filter(|r| r["file_format"].as_str() == Some("PDF"))
        .and_then(|r| r["link"].as_str())
        .unwrap_or("")
        .to_string();
    CitingRecord {
        index: format!("{index:03}"),
        filename: safe_filename(&title, num_filename_words),
        abstract_text: result["snippet"].as_str().unwrap_or("").to_string(),
        info: result["publication_info"]["summary"].as_str().unwrap_or("").to_string(),
        link: result["link"].as_str().unwrap_or("").to_string(),
        pdf,
        title,
    }
}

/// Does the text contain CJK characters?
pub fn contains_cjk(text: &str) -> bool {
    CJK.is_match(text)
}

/// Build the display info string from a Chicago citation and the raw
/// publication summary.
///
/// The Chicago entry leads with `Last, First, and Others. "Title." Venue.`;
/// the leading author is re-ordered to `First Last` and the quoted title is
/// dropped, then the summary's trailing ` - site` fragment is appended.
pub fn format_info(chicago: &str, summary: &str) -> String {
    let first_quote = match chicago.find('"') {
        Some(i) => i,
        None => return summary.to_string(),
    };
    let mut name_str = chicago[..first_quote].to_string();
    let publication = match chicago[first_quote + 1..].find('"') {
        Some(i) => {
            let close = first_quote + 1 + i;
            chicago.get(close + 2..).unwrap_or("").to_string()
        }
        None => String::new(),
    };

    // "Last, First, rest…" → "First Last, rest…"
    if let Some(first_comma) = name_str.find(',') {
        if let Some(offset) = name_str[first_comma + 1..].find(',') {
            let second_comma = first_comma + 1 + offset;
            let leading = &name_str[..second_comma];
            let rest = name_str[second_comma..].to_string();
            let last_name = leading[..first_comma].trim();
            let first_name = leading[first_comma + 1..].trim();
            name_str = format!("{first_name} {last_name}{rest}");
        }
    }

    // The summary ends with " - <site>"; keep that fragment only
    let site = match summary.rfind(" - ") {
        Some(i) => &summary[i..],
        None => "",
    };

    let name_trimmed = name_str.trim_end().trim_end_matches('.');
    let publication_trimmed = publication.trim_end();
    format!("{name_trimmed} - {publication_trimmed}{site}")
}
