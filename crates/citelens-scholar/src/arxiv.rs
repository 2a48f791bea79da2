//! arXiv Atom API title search, used as the last-resort PDF source.

use serde::Deserialize;
use tracing::debug;

use citelens_common::{CitelensError, Result};

const ARXIV_API: &str = "http://export.arxiv.org/api/query";

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default, rename = "entry")]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: String,
    #[serde(default, rename = "link")]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(default, rename = "@title")]
    title: Option<String>,
    #[serde(default, rename = "@type")]
    mime: Option<String>,
}

/// A search hit: the entry's title and its PDF URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArxivHit {
    pub title: String,
    pub pdf_url: String,
}

/// Exact-phrase title search; returns the first entry carrying a PDF link.
pub async fn search_by_title(
    client: &reqwest::Client,
    title: &str,
    max_results: usize,
) -> Result<Option<ArxivHit>> {
    let resp = client
        .get(ARXIV_API)
        .query(&[
            ("search_query", format!("ti:\"{title}\"")),
            ("max_results", max_results.to_string()),
        ])
        .send()
        .await?;
    let xml = resp.text().await?;
    let feed = parse_feed(&xml)?;
    debug!(title, entries = feed.entries.len(), "arXiv search results");
    Ok(first_hit(feed))
}

fn parse_feed(xml: &str) -> Result<Feed> {
    quick_xml::de::from_str(xml).map_err(|e| CitelensError::Xml(e.to_string()))
}

fn first_hit(feed: Feed) -> Option<ArxivHit> {
    feed.entries.into_iter().find_map(|entry| {
        let pdf_url = entry
            .links
            .iter()
            .find(|l| {
                l.title.as_deref() == Some("pdf") || l.mime.as_deref() == Some("application/pdf")
            })
            .map(|l| l.href.clone())?;
        // Atom titles fold across lines
        let title = entry.title.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(ArxivHit { title, pdf_url })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/2302.12345v1</id>
    <title>CFA: Class-wise Calibrated Fair
 Adversarial Training</title>
    <link href="http://arxiv.org/abs/2302.12345v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2302.12345v1" rel="related" type="application/pdf"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed_extracts_pdf_link() {
        let feed = parse_feed(SAMPLE_FEED).unwrap();
        let hit = first_hit(feed).unwrap();
        assert_eq!(hit.pdf_url, "http://arxiv.org/pdf/2302.12345v1");
        assert_eq!(hit.title, "CFA: Class-wise Calibrated Fair Adversarial Training");
    }

    #[test]
    fn test_empty_feed_yields_none() {
        let feed = parse_feed(
            r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#,
        )
        .unwrap();
        assert!(first_hit(feed).is_none());
    }

    #[test]
    fn test_entry_without_pdf_link_skipped() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry><title>T</title>
            <link href="http://arxiv.org/abs/1" rel="alternate" type="text/html"/>
          </entry>
        </feed>"#;
        let feed = parse_feed(xml).unwrap();
        assert!(first_hit(feed).is_none());
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(parse_feed("this is not xml <<<").is_err());
    }
}
