// ABOUTME: CLI for the ftr extraction engine.
// ABOUTME: Resolves a site config for each URL, extracts the article, and prints JSON.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ftr::{parse_site_config, Processor, Repository, SiteConfig};

/// Extract article fields from web pages using site configs.
#[derive(Parser, Debug)]
#[command(name = "ftr-cli")]
#[command(about = "Extract clean article content using per-site config rules", long_about = None)]
struct Args {
    /// URLs to process. With --html, a single URL giving the page's address.
    #[arg(required_unless_present = "config")]
    urls: Vec<String>,

    /// Local site-config file to use instead of repository lookup.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Already-fetched HTML file to extract from (requires exactly one URL
    /// or --config).
    #[arg(long)]
    html: Option<PathBuf>,

    /// Repository (HTTP base URL or directory), repeatable; overrides the
    /// default public repositories.
    #[arg(long = "repo")]
    repositories: Vec<String>,

    /// Skip the config cache.
    #[arg(long)]
    no_cache: bool,

    /// Cap on continuation pages followed per article.
    #[arg(long, default_value_t = 10)]
    max_pages: usize,

    /// Output compact JSON instead of pretty.
    #[arg(long, default_value_t = false)]
    compact: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ftr-cli: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let mut builder = Processor::builder()
        .bypass_config_cache(args.no_cache)
        .max_pages(args.max_pages);
    if !args.repositories.is_empty() {
        builder = builder.repositories(
            args.repositories
                .iter()
                .map(|r| Repository::parse(r))
                .collect(),
        );
    }
    let processor = builder.build();

    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let mut config = SiteConfig::new();
            config.merge(&parse_site_config(&text)?);
            Some(config)
        }
        None => None,
    };

    if let Some(html_path) = &args.html {
        if args.urls.len() > 1 {
            bail!("--html takes at most one URL");
        }
        let content = fs::read_to_string(html_path)
            .with_context(|| format!("reading {}", html_path.display()))?;
        let result =
            processor.process_content(args.urls.first().map(String::as_str), &content, config.as_ref())?;
        print_json(&result, args.compact)?;
        return Ok(());
    }

    for url in &args.urls {
        let result = match &config {
            Some(config) => {
                let page = processor.fetch_page(url)?;
                processor.process_content(Some(url), &page, Some(config))?
            }
            None => processor.process_url(url)?,
        };
        print_json(&result, args.compact)?;
    }

    Ok(())
}

fn print_json(result: &ftr::Extraction, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(result)?
    } else {
        serde_json::to_string_pretty(result)?
    };
    println!("{rendered}");
    Ok(())
}
