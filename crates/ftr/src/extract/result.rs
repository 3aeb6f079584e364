// ABOUTME: Extraction result struct holding the fields pulled from one document.
// ABOUTME: Created fresh per page; pagination merges child results into the first page's.

use serde::Serialize;

use crate::config::OrderedSet;

/// Everything extracted from one document (or, after pagination, one
/// article spanning several documents).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    /// URL the document came from, when known.
    pub url: Option<String>,
    pub title: Option<String>,
    /// Multiple authors are expected; all matches of all rules accumulate.
    pub authors: OrderedSet,
    /// Captured verbatim; no date parsing or normalization happens here.
    pub date: Option<String>,
    pub language: Option<String>,
    /// Serialized body markup.
    pub body: Option<String>,
    /// Next-page link as matched, before resolution to an absolute URL.
    pub next_page_url: Option<String>,
    /// Absolute URLs of continuation pages fetched during pagination,
    /// in page order.
    pub followed_links: Vec<String>,
    /// Fields whose explicit rules existed but matched nothing.
    pub failures: Vec<String>,
    /// True if any of title/body/authors/date/language came out non-empty.
    pub success: bool,
    /// True if the tidy pre-pass actually ran on this document.
    pub tidied: bool,
}

impl Extraction {
    /// Records a field whose configured rule produced nothing.
    pub(crate) fn record_failure(&mut self, field: &str) {
        if !self.failures.iter().any(|f| f == field) {
            self.failures.push(field.to_string());
        }
    }

    /// Concatenates a continuation page's body onto this one, in page order.
    pub(crate) fn append_body(&mut self, more: &str) {
        match &mut self.body {
            Some(body) => {
                body.push('\n');
                body.push_str(more);
            }
            None => self.body = Some(more.to_string()),
        }
    }

    pub fn has_body(&self) -> bool {
        self.body.as_deref().map_or(false, |b| !b.trim().is_empty())
    }

    pub fn has_title(&self) -> bool {
        self.title.as_deref().map_or(false, |t| !t.is_empty())
    }
}
