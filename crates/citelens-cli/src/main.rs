//! Citelens — citation crawling and citation-context sentiment analysis.
//! Entry point for the CLI binary.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use citelens_analysis::pipeline::{AnalysisOptions, AnalysisPipeline, FullTextProvider};
use citelens_analysis::{CitationClassifier, ClassifierConfig};
use citelens_llm::{AnthropicBackend, ChatBackend, OpenAiCompatibleBackend};
use citelens_scholar::{CitationCrawler, CrawlerConfig, PdfDownloader, ScholarClient};

#[derive(Parser)]
#[command(name = "citelens", version, about = "Crawl citing papers and classify how they talk about yours")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover citing works via Google Scholar and fetch their PDFs.
    Crawl {
        #[arg(long, value_enum, default_value_t = CrawlMode::Paper)]
        mode: CrawlMode,
    },
    /// Extract citation contexts from the crawled PDFs and classify them.
    Analyze,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CrawlMode {
    /// Crawl the configured paper titles.
    Paper,
    /// List the configured author's cited papers.
    Author,
}

/// lopdf-backed full-text acquisition for the analysis pipeline.
struct PdfProvider;

impl FullTextProvider for PdfProvider {
    fn full_text(&self, path: &Path) -> Option<String> {
        citelens_scholar::pdf::extract_text(path)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("citelens=info,info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::Config::load()?;

    match cli.command {
        Command::Crawl { mode } => run_crawl(&config, mode).await,
        Command::Analyze => run_analyze(&config).await,
    }
}

async fn run_crawl(config: &config::Config, mode: CrawlMode) -> anyhow::Result<()> {
    let Some(api_key) = config.serpapi_key() else {
        anyhow::bail!("No SerpApi key configured (set scholar.api_key or SERPAPI_API_KEY)");
    };

    let root = PathBuf::from(&config.workspace.paper_list_dir);
    std::fs::create_dir_all(&root)?;

    let client = ScholarClient::new(api_key);
    let downloader = PdfDownloader::new(config.scholar.timeout_secs)?;
    let crawler = CitationCrawler::new(
        client,
        downloader,
        CrawlerConfig {
            start_year: config.scholar.start_year,
            end_year: config.scholar.end_year,
            page_size: config.scholar.page_size,
            num_filename_words: config.scholar.num_words_in_filename,
            fetch_pdfs: config.scholar.fetch_pdfs,
        },
    );

    match mode {
        CrawlMode::Paper => {
            if config.scholar.paper_titles.is_empty() {
                anyhow::bail!("scholar.paper_titles is empty; add titles to citelens.toml");
            }
            crawler.crawl_titles(&root, &config.scholar.paper_titles).await?;
        }
        CrawlMode::Author => {
            let Some(author_id) = config.scholar.author_id.as_deref() else {
                anyhow::bail!("scholar.author_id is not set in citelens.toml");
            };
            let author_name = config.scholar.author_name.as_deref().unwrap_or(author_id);
            let author_info_dir = PathBuf::from(&config.workspace.author_info_dir);
            let kept = crawler.crawl_author(&author_info_dir, author_id, author_name).await?;
            info!(papers = kept.len(), "Author listing complete");
        }
    }
    Ok(())
}

async fn run_analyze(config: &config::Config) -> anyhow::Result<()> {
    let root = PathBuf::from(&config.workspace.paper_list_dir);

    let backend = build_backend(config);
    let classifier = CitationClassifier::new(
        backend,
        ClassifierConfig {
            pause_seconds: config.llm.pause_seconds,
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            ..ClassifierConfig::default()
        },
    );
    let options = AnalysisOptions {
        similarity_threshold: config.analysis.similarity_threshold,
        snippet_length: config.analysis.snippet_length,
    };

    let mut pipeline = AnalysisPipeline::new(PdfProvider, classifier, options);
    let summaries = pipeline.run(&root).await?;

    let analyzed: usize = summaries.iter().map(|s| s.documents_analyzed).sum();
    let failed: usize = summaries.iter().map(|s| s.snippets_failed).sum();
    info!(papers = summaries.len(), documents = analyzed, failed_snippets = failed, "Analysis finished");
    Ok(())
}

fn build_backend(config: &config::Config) -> Option<Arc<dyn ChatBackend>> {
    let key = config.llm_key();
    match config.llm.provider.as_str() {
        "anthropic" => key.map(|k| {
            Arc::new(AnthropicBackend::new(k, config.llm.model.clone())) as Arc<dyn ChatBackend>
        }),
        "openai_compatible" => key.map(|k| {
            Arc::new(OpenAiCompatibleBackend::new(
                config.llm.base_url.clone(),
                config.llm.model.clone(),
                Some(k),
            )) as Arc<dyn ChatBackend>
        }),
        other => {
            warn!(provider = other, "Unknown LLM provider; classification disabled");
            None
        }
    }
}
