// ABOUTME: Cascading site-config resolver searching prioritized repositories per URL.
// ABOUTME: Expands candidate domains, probes <domain>.txt artifacts, validates and caches hits.

//! Locating the right config for a URL.
//!
//! Repositories are searched in order; within each, candidate domains from
//! most to least specific; for each candidate, `<domain>.txt` then
//! `.<domain>.txt`. The first artifact found wins and short-circuits the
//! whole search. A remote artifact that turns out to be an HTML error page
//! disqualifies its entire repository, not just the candidate.

pub mod cache;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchedText};

pub use cache::{ConfigCache, MemoryCache, DEFAULT_CONFIG_TTL};

/// The two well-known public repositories of site-config files.
pub const DEFAULT_REPOSITORIES: &[&str] = &[
    "https://raw.githubusercontent.com/1flow/ftr-site-config/master/",
    "https://raw.githubusercontent.com/fivefilters/ftr-site-config/master/",
];

/// One source of config artifacts: an HTTP(S) base URL or a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repository {
    Http(String),
    Dir(PathBuf),
}

impl Repository {
    /// Parses one entry of the whitespace-separated repository list.
    pub fn parse(entry: &str) -> Repository {
        let entry = entry.trim();
        if entry.starts_with("http://") || entry.starts_with("https://") {
            let mut base = entry.to_string();
            if !base.ends_with('/') {
                base.push('/');
            }
            Repository::Http(base)
        } else {
            Repository::Dir(PathBuf::from(entry))
        }
    }

    /// Parses a whitespace-separated repository list, skipping blanks.
    pub fn parse_list(spec: &str) -> Vec<Repository> {
        spec.split_whitespace().map(Repository::parse).collect()
    }

    fn describe(&self) -> String {
        match self {
            Repository::Http(base) => base.clone(),
            Repository::Dir(path) => path.display().to_string(),
        }
    }
}

/// The built-in repository list.
pub fn default_repositories() -> Vec<Repository> {
    DEFAULT_REPOSITORIES
        .iter()
        .map(|s| Repository::parse(s))
        .collect()
}

/// Normalizes a URL or bare host to a lookup host: scheme and path dropped,
/// a leading `www.` label stripped, lower-cased.
pub fn normalize_host(url_or_host: &str) -> Result<String> {
    let trimmed = url_or_host.trim();
    let host = if trimmed.contains("://") {
        let url =
            Url::parse(trimmed).map_err(|e| Error::invalid_url(trimmed, e))?;
        url.host_str()
            .ok_or_else(|| Error::invalid_url(trimmed, "no host"))?
            .to_string()
    } else {
        trimmed
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .to_string()
    };

    if host.is_empty() {
        return Err(Error::invalid_url(url_or_host, "empty host"));
    }

    let host = host.to_lowercase();
    Ok(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Expands a (www-stripped) host into candidate domains, most specific
/// first, stopping at two labels: `a.b.c.com` yields `a.b.c.com`,
/// `b.c.com`, `c.com`. With `exact` only the full host is returned.
pub fn candidate_domains(host: &str, exact: bool) -> Vec<String> {
    if exact {
        return vec![host.to_string()];
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return vec![host.to_string()];
    }

    (0..=labels.len() - 2)
        .map(|i| labels[i..].join("."))
        .collect()
}

/// Resolver over an ordered repository list with an injected cache.
pub struct ConfigResolver {
    repositories: Vec<Repository>,
    fetch: Arc<dyn Fetch>,
    cache: Box<dyn ConfigCache>,
    ttl: Duration,
    bypass_cache: bool,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("repositories", &self.repositories)
            .field("ttl", &self.ttl)
            .field("bypass_cache", &self.bypass_cache)
            .finish()
    }
}

impl ConfigResolver {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self {
            repositories: default_repositories(),
            fetch,
            cache: Box::new(MemoryCache::new()),
            ttl: DEFAULT_CONFIG_TTL,
            bypass_cache: false,
        }
    }

    pub fn with_repositories(mut self, repositories: Vec<Repository>) -> Self {
        self.repositories = repositories;
        self
    }

    pub fn with_cache(mut self, cache: Box<dyn ConfigCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Disables memoization entirely. Intended for tests.
    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    /// Finds the most specific config text for a URL or bare host.
    ///
    /// Idempotent and memoized by (normalized host, exact flag). Transport
    /// failures propagate; exhaustion of every repository and candidate
    /// raises [`Error::ConfigNotFound`] naming everything attempted.
    pub fn resolve(&self, url_or_host: &str, exact: bool) -> Result<String> {
        let host = normalize_host(url_or_host)?;
        let key = format!("{host}|{exact}");

        if !self.bypass_cache {
            if let Some(hit) = self.cache.get(&key) {
                debug!(host, "site config cache hit");
                return Ok(hit);
            }
        }

        let domains = candidate_domains(&host, exact);
        debug!(?domains, "gathering site config candidates");

        'repositories: for repo in &self.repositories {
            for domain in &domains {
                for name in [format!("{domain}.txt"), format!(".{domain}.txt")] {
                    let found = match repo {
                        Repository::Http(base) => {
                            let url = format!("{base}{name}");
                            let response = self.fetch.get(&url)?;
                            if !response.is_ok() {
                                continue;
                            }
                            if !looks_like_plain_text(&response) {
                                // An HTML page here means the repository is
                                // not serving raw artifacts; skip it wholesale.
                                warn!(url, "repository does not return raw plain text");
                                continue 'repositories;
                            }
                            info!(domain, url, "using site config");
                            response.body
                        }
                        Repository::Dir(dir) => {
                            let path = dir.join(&name);
                            if !path.is_file() {
                                continue;
                            }
                            info!(domain, path = %path.display(), "using site config");
                            std::fs::read_to_string(&path)
                                .map_err(|e| Error::fetch(path.display().to_string(), e))?
                        }
                    };

                    if !self.bypass_cache {
                        self.cache.put(&key, &found, self.ttl);
                    }
                    return Ok(found);
                }
            }
        }

        Err(Error::ConfigNotFound {
            domains: domains.join(", "),
            repositories: self
                .repositories
                .iter()
                .map(Repository::describe)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// Sanity check that a 200 response is a raw config file rather than an
/// HTML error or landing page.
fn looks_like_plain_text(response: &FetchedText) -> bool {
    if let Some(ct) = &response.content_type {
        if !ct.to_lowercase().contains("text/plain") {
            return false;
        }
    }
    let body = &response.body;
    if body.contains("<!DOCTYPE html>") {
        return false;
    }
    !(body.contains("<html") && body.contains("</html>"))
}
