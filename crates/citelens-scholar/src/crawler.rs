//! Cited-by crawling with incremental persistence.
//!
//! For each target paper a directory is created under the paper-list root
//! and `citation_info.json` is rewritten after every collected record, so an
//! interrupted crawl resumes from the persisted record count. Processing is
//! strictly sequential: one paper, one page, one record at a time.

use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

use citelens_common::workspace::{safe_filename, CITATION_INFO_FILE, PAPER_INFO_FILE};
use citelens_common::{CitingRecord, Result};

use crate::downloader::PdfDownloader;
use crate::serpapi::{
    contains_cjk, format_info, record_from_result, AuthorArticle, PaperLookup, ScholarClient,
};

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub start_year: Option<u16>,
    pub end_year: Option<u16>,
    /// Results per cited-by page; Scholar caps this at 20.
    pub page_size: usize,
    pub num_filename_words: usize,
    /// Download each record's PDF right after persisting it.
    pub fetch_pdfs: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_year: None,
            end_year: None,
            page_size: 20,
            num_filename_words: 8,
            fetch_pdfs: true,
        }
    }
}

pub struct CitationCrawler {
    client: ScholarClient,
    downloader: PdfDownloader,
    config: CrawlerConfig,
}

impl CitationCrawler {
    pub fn new(client: ScholarClient, downloader: PdfDownloader, config: CrawlerConfig) -> Self {
        Self { client, downloader, config }
    }

    /// Crawl the citations of every title, resuming at the last title whose
    /// directory already exists.
    pub async fn crawl_titles(&self, root: &Path, titles: &[String]) -> Result<()> {
        let resume_at = self.resume_position(root, titles);
        for title in &titles[resume_at..] {
            match self.client.lookup_paper(title).await? {
                Some(paper) => self.crawl_paper(root, &paper).await?,
                None => warn!(title = %title, "Paper not found on Scholar"),
            }
        }
        info!("All papers crawled");
        Ok(())
    }

    /// Crawl everything citing one resolved paper.
    pub async fn crawl_paper(&self, root: &Path, paper: &PaperLookup) -> Result<()> {
        let dir_name = safe_filename(&paper.title, self.config.num_filename_words);
        let dir = root.join(&dir_name);
        std::fs::create_dir_all(&dir)?;
        info!(paper = %dir_name, "Crawling citations");

        let Some(cites_id) = paper.cites_id.as_deref() else {
            info!(paper = %dir_name, "Paper has no citations");
            remove_empty_paper_dir(&dir);
            return Ok(());
        };

        self.write_paper_info(&dir, paper)?;

        let years = (self.config.start_year, self.config.end_year);
        let first_page = self.client.cited_by_page(cites_id, 0, self.config.page_size, years).await?;
        let total = first_page.total_results;
        if total == 0 {
            info!(paper = %dir_name, "No citations in the selected year range");
            remove_empty_paper_dir(&dir);
            return Ok(());
        }
        info!(paper = %dir_name, total, "Citations found");

        // Resume from the records persisted by a previous run
        let info_path = dir.join(CITATION_INFO_FILE);
        let mut records = load_existing_records(&info_path);
        let start_pos = records.len();

        let mut start = start_pos;
        while start < total {
            let page = if start == 0 {
                first_page.clone()
            } else {
                self.client.cited_by_page(cites_id, start, self.config.page_size, years).await?
            };
            if page.results.is_empty() {
                warn!(paper = %dir_name, start, "Page has no organic results; skipping");
                start += self.config.page_size;
                continue;
            }
            for (position, result) in &page.results {
                let index = start + position;
                if index > total {
                    break;
                }
                let mut record =
                    record_from_result(result, index, self.config.num_filename_words);
                record.info = self.resolve_info(result, &record.info).await;
                info!(index, title = %record.title, "Citing work collected");

                records.push(record);
                save_records(&info_path, &records)?;

                if self.config.fetch_pdfs {
                    if let Some(record) = records.last() {
                        let pdf_path = dir.join(format!("{}.pdf", record.filename));
                        if !pdf_path.exists() && !self.downloader.fetch(record, &pdf_path).await {
                            warn!(title = %record.title, "PDF retrieval failed");
                        }
                    }
                }
            }
            start += self.config.page_size;
        }

        info!(paper = %dir_name, records = records.len(), "Paper crawled");
        Ok(())
    }

    /// CJK summaries are kept verbatim; everything else is rebuilt from the
    /// Chicago-formatted citation when one is available.
    async fn resolve_info(&self, result: &serde_json::Value, summary: &str) -> String {
        if contains_cjk(summary) {
            return summary.to_string();
        }
        let Some(result_id) = result["result_id"].as_str() else {
            return summary.to_string();
        };
        match self.client.chicago_citation(result_id).await {
            Ok(Some(chicago)) => format_info(&chicago, summary),
            Ok(None) => summary.to_string(),
            Err(e) => {
                warn!(result_id, error = %e, "Citation formatting failed");
                summary.to_string()
            }
        }
    }

    fn write_paper_info(&self, dir: &Path, paper: &PaperLookup) -> Result<()> {
        let path = dir.join(PAPER_INFO_FILE);
        if path.exists() {
            return Ok(());
        }
        let data = json!({
            "title": paper.title,
            "authors": paper.authors,
            "publication": paper.publication,
            "link": paper.link,
            "year": serde_json::Value::Null,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }

    /// Author mode: list the author's articles, keep those with citations
    /// inside the year window, and persist the listing incrementally under
    /// `author_info/`. Returns the kept articles.
    pub async fn crawl_author(
        &self,
        author_info_dir: &Path,
        author_id: &str,
        author_name: &str,
    ) -> Result<Vec<AuthorArticle>> {
        std::fs::create_dir_all(author_info_dir)?;
        let path = author_info_dir.join(format!("{}.json", author_name.replace(' ', "_")));

        // Resume: previously kept articles are not re-checked
        let mut kept: Vec<AuthorArticle> = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        let existing: std::collections::HashSet<String> =
            kept.iter().map(|a| a.title.clone()).collect();

        let mut articles = Vec::new();
        let mut start = 0;
        loop {
            let page = self.client.author_articles(author_id, start).await?;
            let page_len = page.len();
            articles.extend(page);
            if page_len < 100 {
                break;
            }
            start += 100;
        }
        info!(author_id, articles = articles.len(), "Author articles listed");

        let years = (self.config.start_year, self.config.end_year);
        for article in articles {
            if existing.contains(&article.title) {
                continue;
            }
            let Some(cite_id) = article.cite_id.as_deref() else {
                continue;
            };
            let count = self.client.cited_by_count(cite_id, years).await?;
            if count == 0 {
                info!(title = %article.title, "Dropped: no citations in range");
                continue;
            }
            info!(title = %article.title, count, "Kept");
            kept.push(AuthorArticle { cite_num_within_time: count, ..article });
            std::fs::write(&path, serde_json::to_string_pretty(&kept)?)?;
        }
        info!(total = kept.len(), path = %path.display(), "Author info saved");
        Ok(kept)
    }

    /// Index of the last already-crawled title, so a rerun restarts there.
    fn resume_position(&self, root: &Path, titles: &[String]) -> usize {
        let mut position = 0;
        for (i, title) in titles.iter().enumerate() {
            let dir_name = safe_filename(title, self.config.num_filename_words);
            if root.join(dir_name).is_dir() {
                position = i;
            }
        }
        position
    }
}

fn load_existing_records(path: &Path) -> Vec<CitingRecord> {
    let Ok(data) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    match serde_json::from_str(&data) {
        Ok(records) => records,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable citation_info.json; recrawling");
            Vec::new()
        }
    }
}

fn save_records(path: &Path, records: &[CitingRecord]) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(records)?)?;
    Ok(())
}

fn remove_empty_paper_dir(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "Could not remove empty paper directory");
    } else {
        info!(dir = %dir.display(), "Empty paper directory removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_existing_records_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CITATION_INFO_FILE);
        let records = vec![CitingRecord {
            index: "001".to_string(),
            title: "T".to_string(),
            filename: "T".to_string(),
            ..Default::default()
        }];
        save_records(&path, &records).unwrap();
        let loaded = load_existing_records(&path);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "T");
    }

    #[test]
    fn test_load_existing_records_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CITATION_INFO_FILE);
        std::fs::write(&path, "[{ truncated").unwrap();
        assert!(load_existing_records(&path).is_empty());
    }

    #[test]
    fn test_load_existing_records_missing_file() {
        assert!(load_existing_records(Path::new("/nonexistent/citation_info.json")).is_empty());
    }
}
