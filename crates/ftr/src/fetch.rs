// ABOUTME: Blocking HTTP fetch capability used by the config resolver and pagination.
// ABOUTME: Defines the Fetch trait plus the default reqwest-backed implementation.

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

const DEFAULT_USER_AGENT: &str = concat!("ftr/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A fetched text document. Non-OK statuses are returned, not errors:
/// the resolver probes candidate URLs and treats 404s as misses.
#[derive(Debug, Clone)]
pub struct FetchedText {
    pub status: u16,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedText {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Blocking fetch capability. Each extraction blocks on its fetches;
/// timeouts and cancellation live entirely in the implementation.
pub trait Fetch: Send + Sync {
    fn get(&self, url: &str) -> Result<FetchedText>;
}

/// Default [`Fetch`] implementation over a shared blocking reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<FetchedText> {
        debug!(url, "fetching");

        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::USER_AGENT,
                self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT),
            )
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .send()
            .map_err(|e| Error::fetch(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().map_err(|e| Error::fetch(url, e))?;

        debug!(url, status, bytes = body.len(), "fetched");

        Ok(FetchedText {
            status,
            final_url,
            content_type,
            body,
        })
    }
}
