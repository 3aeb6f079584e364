// ABOUTME: Error types for site-config resolution and article extraction.
// ABOUTME: Provides the Error enum covering config, parser, and transport failures.

use thiserror::Error;

/// Errors surfaced to callers of the extraction engine.
///
/// Recoverable conditions (ambiguous pattern matches, per-node pruning
/// failures, tidy corruption) are handled inside the pipeline and never
/// appear here.
#[derive(Debug, Error)]
pub enum Error {
    /// No site config could be located for any candidate domain in any
    /// configured repository.
    #[error("no site config found for domains [{domains}] in repositories [{repositories}]")]
    ConfigNotFound {
        domains: String,
        repositories: String,
    },

    /// A site config declared an unequal number of find_string and
    /// replace_string directives.
    #[error("find_string and replace_string do not correspond ({find} != {replace})")]
    InvalidConfig { find: usize, replace: usize },

    /// The config names a tree-parsing engine this build does not support.
    #[error("unsupported parser engine: {0}")]
    UnsupportedParser(String),

    /// A URL (input or discovered next-page link) could not be parsed.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A network or filesystem fetch failed outright.
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// A page fetch completed with a non-OK status.
    #[error("unexpected HTTP status {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The caller supplied an unusable combination of arguments.
    #[error("{0}")]
    Usage(String),
}

impl Error {
    /// Creates a Fetch error from any displayable source.
    pub fn fetch(url: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Fetch {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates an InvalidUrl error.
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Error::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if this is a ConfigNotFound error.
    pub fn is_config_not_found(&self) -> bool {
        matches!(self, Error::ConfigNotFound { .. })
    }

    /// Returns true if this is an InvalidConfig error.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Error::InvalidConfig { .. })
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
