//! citelens-scholar — Citing-work discovery and full-text acquisition.
//! - Google Scholar search via SerpApi (paper lookup, cited-by paging,
//!   citation formatting, author articles)
//! - Incremental, resumable cited-by crawling
//! - PDF retrieval (direct links, publisher URL rewrites, arXiv fallback)
//! - lopdf plain-text extraction

pub mod arxiv;
pub mod crawler;
pub mod downloader;
pub mod pdf;
pub mod serpapi;

pub use crawler::{CitationCrawler, CrawlerConfig};
pub use downloader::PdfDownloader;
pub use serpapi::{PaperLookup, ScholarClient};
