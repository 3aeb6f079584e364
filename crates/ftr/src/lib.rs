// ABOUTME: Main library entry point for the ftr article extraction engine.
// ABOUTME: Re-exports the public API: SiteConfig, ConfigResolver, Extractor, Processor, Error.

//! ftr - declarative article extraction driven by per-website rule sets.
//!
//! Given a URL, the engine locates the most specific "site config" across
//! prioritized repositories, then applies its rules to the page: ordered
//! pattern expressions for title, author, date and body, strip directives
//! for boilerplate, literal pre-parse replacements, and next-page links for
//! paginated articles.
//!
//! # Example
//!
//! ```no_run
//! use ftr::Processor;
//!
//! fn main() -> Result<(), ftr::Error> {
//!     let processor = Processor::builder().build();
//!     let article = processor.process_url("https://example.com/article")?;
//!     println!("{:?}: {} authors", article.title, article.authors.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod hooks;
pub mod pattern;
pub mod process;
pub mod resolver;

pub use crate::config::{parse_site_config, OrderedSet, SiteConfig, TriState};
pub use crate::error::{Error, Result};
pub use crate::extract::{Extraction, Extractor};
pub use crate::fetch::{Fetch, FetchedText, HttpFetcher};
pub use crate::hooks::{AutoExtract, Tidy, TidyOptions};
pub use crate::pattern::Pattern;
pub use crate::process::{resolve_next_page_url, Processor, ProcessorBuilder};
pub use crate::resolver::{
    candidate_domains, ConfigCache, ConfigResolver, MemoryCache, Repository,
};
