// ABOUTME: Top-level processor wiring resolver, fetch, and pipeline together.
// ABOUTME: Drives pagination iteratively with a visited-URL set and a page cap.

//! Processing whole articles.
//!
//! A [`Processor`] owns the injected capabilities and the config resolver.
//! It resolves the right config for a URL, fetches the page, runs the
//! extraction pipeline, then follows discovered next-page links,
//! fetching and extracting each continuation page and concatenating its
//! body onto the first page's result.
//!
//! Pagination is an explicit loop. Sites with buggy or adversarial markup
//! can link pages in a cycle, so already-visited URLs are rejected and the
//! chain is capped at a configurable number of pages.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::extract::{Extraction, Extractor};
use crate::fetch::{Fetch, HttpFetcher};
use crate::hooks::{AutoExtract, Tidy};
use crate::resolver::{ConfigCache, ConfigResolver, Repository};

const DEFAULT_MAX_PAGES: usize = 10;

/// Builder for [`Processor`].
pub struct ProcessorBuilder {
    fetch: Option<Arc<dyn Fetch>>,
    repositories: Option<Vec<Repository>>,
    cache: Option<Box<dyn ConfigCache>>,
    ttl: Option<Duration>,
    bypass_cache: bool,
    tidy: Option<Box<dyn Tidy>>,
    auto: Option<Box<dyn AutoExtract>>,
    smart_tidy: bool,
    max_pages: usize,
}

impl ProcessorBuilder {
    pub fn new() -> Self {
        Self {
            fetch: None,
            repositories: None,
            cache: None,
            ttl: None,
            bypass_cache: false,
            tidy: None,
            auto: None,
            smart_tidy: true,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Use a custom fetch capability (shared by resolver and page fetches).
    pub fn fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn repositories(mut self, repositories: Vec<Repository>) -> Self {
        self.repositories = Some(repositories);
        self
    }

    pub fn config_cache(mut self, cache: Box<dyn ConfigCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable config memoization. Intended for tests.
    pub fn bypass_config_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    pub fn tidy(mut self, tidy: Box<dyn Tidy>) -> Self {
        self.tidy = Some(tidy);
        self
    }

    pub fn auto_extract(mut self, auto: Box<dyn AutoExtract>) -> Self {
        self.auto = Some(auto);
        self
    }

    /// Forbid the tidy pre-pass regardless of config.
    pub fn smart_tidy(mut self, smart_tidy: bool) -> Self {
        self.smart_tidy = smart_tidy;
        self
    }

    /// Cap on continuation pages followed per article.
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn build(self) -> Processor {
        let fetch: Arc<dyn Fetch> = self.fetch.unwrap_or_else(|| Arc::new(HttpFetcher::new()));
        let mut resolver = ConfigResolver::new(Arc::clone(&fetch));
        if let Some(repositories) = self.repositories {
            resolver = resolver.with_repositories(repositories);
        }
        if let Some(cache) = self.cache {
            resolver = resolver.with_cache(cache);
        }
        if let Some(ttl) = self.ttl {
            resolver = resolver.with_ttl(ttl);
        }
        resolver = resolver.bypass_cache(self.bypass_cache);

        Processor {
            fetch,
            resolver,
            tidy: self.tidy,
            auto: self.auto,
            smart_tidy: self.smart_tidy,
            max_pages: self.max_pages,
        }
    }
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves configs, fetches pages, extracts, and paginates.
pub struct Processor {
    fetch: Arc<dyn Fetch>,
    resolver: ConfigResolver,
    tidy: Option<Box<dyn Tidy>>,
    auto: Option<Box<dyn AutoExtract>>,
    smart_tidy: bool,
    max_pages: usize,
}

impl Processor {
    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::new()
    }

    /// Resolves and parses the site config for a URL or bare host.
    pub fn config_for(&self, url_or_host: &str, exact: bool) -> Result<SiteConfig> {
        let text = self.resolver.resolve(url_or_host, exact)?;
        SiteConfig::from_text(&text)
    }

    /// Fetches a live URL, resolves its config, extracts, and paginates.
    pub fn process_url(&self, url: &str) -> Result<Extraction> {
        let config = self.config_for(url, false)?;
        let page = self.fetch_page(url)?;
        self.run(&config, &page, Some(url))
    }

    /// Extracts from already-fetched content.
    ///
    /// The URL is used for config lookup (when no config is given) and for
    /// resolving relative pagination links; post-mortem extraction of
    /// removed content works by passing both content and config.
    pub fn process_content(
        &self,
        url: Option<&str>,
        content: &str,
        config: Option<&SiteConfig>,
    ) -> Result<Extraction> {
        let resolved;
        let config = match config {
            Some(config) => config,
            None => {
                let url = url.ok_or_else(|| {
                    Error::Usage(
                        "content without a config needs a url for config lookup".to_string(),
                    )
                })?;
                resolved = self.config_for(url, false)?;
                &resolved
            }
        };
        self.run(config, content, url)
    }

    /// Runs the pipeline on the first page, then follows next-page links.
    fn run(&self, config: &SiteConfig, content: &str, url: Option<&str>) -> Result<Extraction> {
        let extractor = self.extractor(config);

        let mut result = extractor.extract_with(content, self.smart_tidy)?;
        result.url = url.map(str::to_string);

        let mut visited: HashSet<String> = HashSet::new();
        if let Some(url) = url {
            visited.insert(url.to_string());
        }
        let mut base = url.map(str::to_string);
        let mut pages = 0usize;

        while let Some(link) = result.next_page_url.clone() {
            let Some(current_base) = base.as_deref() else {
                debug!("next-page link found but no base url to resolve against");
                break;
            };
            let next = resolve_next_page_url(current_base, &link)?;

            if pages >= self.max_pages {
                warn!(next, max = self.max_pages, "pagination cap reached");
                break;
            }
            if !visited.insert(next.clone()) {
                warn!(next, "pagination cycle detected, stopping");
                break;
            }

            debug!(next, "following next-page link");
            let page = self.fetch_page(&next)?;
            let sub = extractor.extract_with(&page, self.smart_tidy)?;

            if let Some(body) = &sub.body {
                result.append_body(body);
            }
            result.followed_links.push(next.clone());
            result.next_page_url = sub.next_page_url;

            base = Some(next);
            pages += 1;
        }

        Ok(result)
    }

    fn extractor<'a>(&'a self, config: &'a SiteConfig) -> Extractor<'a> {
        let mut extractor = Extractor::new(config);
        if let Some(tidy) = &self.tidy {
            extractor = extractor.with_tidy(tidy.as_ref());
        }
        if let Some(auto) = &self.auto {
            extractor = extractor.with_auto_extract(auto.as_ref());
        }
        extractor
    }

    /// Fetches a page body through the injected fetch capability, treating
    /// any non-OK status as an error.
    pub fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.fetch.get(url)?;
        if !response.is_ok() {
            return Err(Error::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }
}

/// Resolves a matched next-page link against the page it was found on.
///
/// Query-only links are appended to the page's full URL; root-relative
/// paths get the page's scheme and host; anything else that is not already
/// absolute goes through standard URL joining.
pub fn resolve_next_page_url(base: &str, link: &str) -> Result<String> {
    if link.starts_with("http://") || link.starts_with("https://") {
        return Ok(link.to_string());
    }
    if link.starts_with('?') {
        return Ok(format!("{base}{link}"));
    }
    if link.starts_with('/') {
        let parsed = Url::parse(base).map_err(|e| Error::invalid_url(base, e))?;
        return Ok(format!("{}{link}", parsed.origin().ascii_serialization()));
    }
    let parsed = Url::parse(base).map_err(|e| Error::invalid_url(base, e))?;
    let joined = parsed
        .join(link)
        .map_err(|e| Error::invalid_url(link, e))?;
    Ok(joined.to_string())
}
