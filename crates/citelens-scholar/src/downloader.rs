//! PDF retrieval for citing records.
//!
//! Strategies are tried in order until one lands a real PDF on disk:
//!   1. The explicit PDF resource link from the search result
//!   2. Publisher URL rewrites on the page link (arXiv, ACM, IEEE)
//!   3. A Springer landing-page scrape for the PDF anchor
//!   4. The page link itself (it is sometimes already a PDF)
//!   5. An arXiv exact-title search, accepted only on a fuzzy title match
//!
//! Every failure is non-fatal; the record just ends up without a PDF.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use citelens_common::fuzzy::almost_matching;
use citelens_common::{CitingRecord, Result};

use crate::arxiv;

/// Minimum title similarity for accepting an arXiv search hit.
const ARXIV_TITLE_THRESHOLD: f64 = 85.0;
/// Publishers vary; a desktop user agent avoids trivial bot rejections.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

lazy_static! {
    static ref IEEE_DOCUMENT: Regex = Regex::new(r"document/(\d+)").expect("static IEEE pattern");
}

pub struct PdfDownloader {
    client: reqwest::Client,
}

impl PdfDownloader {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_UA)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// Try every strategy for `record`; true when a PDF was saved.
    pub async fn fetch(&self, record: &CitingRecord, save_path: &Path) -> bool {
        if !record.pdf.is_empty() {
            if self.download_pdf(&record.pdf, save_path).await {
                info!(path = %save_path.display(), "PDF downloaded from provided resource link");
                return true;
            }
            debug!(url = %record.pdf, "Provided PDF link failed");
        }

        for rewrite in [arxiv_pdf_url, acm_pdf_url, ieee_pdf_url] {
            if let Some(url) = rewrite(&record.link) {
                if self.download_pdf(&url, save_path).await {
                    info!(path = %save_path.display(), url = %url, "PDF downloaded via publisher rewrite");
                    return true;
                }
            }
        }

        if let Some(url) = self.springer_pdf_url(&record.link).await {
            if self.download_pdf(&url, save_path).await {
                info!(path = %save_path.display(), "PDF downloaded from Springer");
                return true;
            }
        }

        if !record.link.is_empty() && record.link != record.pdf {
            if self.download_pdf(&record.link, save_path).await {
                info!(path = %save_path.display(), "Page link was a direct PDF");
                return true;
            }
        }

        if !record.title.is_empty() && self.fetch_from_arxiv_search(record, save_path).await {
            return true;
        }

        warn!(title = %record.title, "No PDF source worked");
        false
    }

    /// Download `url` to `save_path` iff the payload is a PDF.
    async fn download_pdf(&self, url: &str, save_path: &Path) -> bool {
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url, error = %e, "Download request failed");
                return false;
            }
        };
        if !resp.status().is_success() {
            debug!(url, status = %resp.status(), "Download rejected");
            return false;
        }
        let is_pdf_header = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/pdf"))
            .unwrap_or(false);
        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(e) => {
                debug!(url, error = %e, "Download body failed");
                return false;
            }
        };
        if !is_pdf_header && !body.starts_with(b"%PDF") {
            debug!(url, "Payload is not a PDF");
            return false;
        }
        match std::fs::write(save_path, &body) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %save_path.display(), error = %e, "Could not write PDF");
                false
            }
        }
    }

    /// Scrape a Springer landing page for its PDF anchor.
    async fn springer_pdf_url(&self, link: &str) -> Option<String> {
        if !link.contains("link.springer.com") {
            return None;
        }
        let page = self.client.get(link).send().await.ok()?;
        if !page.status().is_success() {
            return None;
        }
        let html = page.text().await.ok()?;
        let href = {
            let doc = Html::parse_document(&html);
            // Article layout first, then the chapter access box
            let selectors = ["div.c-pdf-container a[href]", "div.c-article-access-provider a[href]"];
            selectors.iter().find_map(|s| {
                let selector = Selector::parse(s).ok()?;
                doc.select(&selector)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(String::from)
            })
        }?;
        Some(if href.starts_with("http") {
            href
        } else {
            format!("https://link.springer.com{href}")
        })
    }

    async fn fetch_from_arxiv_search(&self, record: &CitingRecord, save_path: &Path) -> bool {
        let hit = match arxiv::search_by_title(&self.client, &record.title, 3).await {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                debug!(title = %record.title, "Nothing found in arXiv search");
                return false;
            }
            Err(e) => {
                debug!(title = %record.title, error = %e, "arXiv search failed");
                return false;
            }
        };
        if !almost_matching(&record.title, &hit.title, ARXIV_TITLE_THRESHOLD) {
            debug!(found = %hit.title, "arXiv hit rejected on title mismatch");
            return false;
        }
        if self.download_pdf(&hit.pdf_url, save_path).await {
            info!(path = %save_path.display(), "PDF downloaded from arXiv search");
            return true;
        }
        false
    }
}

// ── Publisher URL rewrites ───────────────────────────────────────────────────

/// arXiv abstract pages serve the PDF under /pdf/.
fn arxiv_pdf_url(link: &str) -> Option<String> {
    if link.contains("arxiv.org/abs") {
        Some(link.replace("arxiv.org/abs", "arxiv.org/pdf"))
    } else {
        None
    }
}

fn acm_pdf_url(link: &str) -> Option<String> {
    if link.contains("dl.acm.org/doi/abs") {
        Some(link.replace("dl.acm.org/doi/abs", "dl.acm.org/doi/pdf"))
    } else if link.contains("dl.acm.org/doi/pdf") {
        Some(link.to_string())
    } else {
        None
    }
}

fn ieee_pdf_url(link: &str) -> Option<String> {
    if !link.contains("ieeexplore.ieee.org/abstract/document/")
        && !link.contains("ieeexplore.ieee.org/document/")
    {
        return None;
    }
    let number = IEEE_DOCUMENT.captures(link)?.get(1)?.as_str().to_string();
    Some(format!("https://ieeexplore.ieee.org/stampPDF/getPDF.jsp?tp=&arnumber={number}"))
}
