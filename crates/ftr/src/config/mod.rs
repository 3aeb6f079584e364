// ABOUTME: SiteConfig data model: per-site extraction rule sets with merge semantics.
// ABOUTME: Includes the OrderedSet and TriState building blocks used by the directive parser.

//! In-memory representation of one site's extraction rules.
//!
//! A [`SiteConfig`] is built by parsing one or more config texts and merging
//! them, self-first: when two sources set the same scalar, the one already
//! present wins. Multi-valued directives are unioned preserving insertion
//! order. Once handed to the extraction pipeline a config is read-only and
//! may be reused across any number of documents.

pub mod parse;

use std::collections::HashSet;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

pub use parse::parse_site_config;

use crate::error::Result;

/// Name of the native tree-parsing engine. Legacy configs naming `libxml`
/// are normalized to this during merge.
pub const NATIVE_PARSER: &str = "html5ever";

/// Insertion-ordered string set: keeps first-seen order, squashes duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedSet {
    items: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning false if it was already present.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.seen.contains(&value) {
            return false;
        }
        self.seen.insert(value.clone());
        self.items.push(value);
        true
    }

    /// Unions another set into this one, keeping self's order first.
    pub fn extend_from(&mut self, other: &OrderedSet) {
        for value in other.iter() {
            self.insert(value.clone());
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.seen.contains(value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a OrderedSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<String> for OrderedSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut set = OrderedSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl Serialize for OrderedSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for item in &self.items {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

/// Three-valued flag distinguishing "never set" from an explicit choice,
/// so merge can tell whether a later source may contribute its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriState {
    #[default]
    Unset,
    Yes,
    No,
}

impl TriState {
    /// Parses a directive value. Anything except a case-insensitive
    /// `no` / `false` / `0` is truthy.
    pub fn from_directive(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "no" | "false" | "0" => TriState::No,
            _ => TriState::Yes,
        }
    }

    pub fn is_set(self) -> bool {
        self != TriState::Unset
    }

    /// Resolves to a bool, substituting `default` when unset.
    pub fn resolve(self, default: bool) -> bool {
        match self {
            TriState::Unset => default,
            TriState::Yes => true,
            TriState::No => false,
        }
    }

    fn from_bool(value: bool) -> Self {
        if value {
            TriState::Yes
        } else {
            TriState::No
        }
    }
}

/// Declarative rule set for extracting article fields from one website.
///
/// Pattern expressions are stored verbatim; compilation to matchers happens
/// lazily in the pipeline so an unsupported expression costs nothing unless
/// its stage runs.
#[derive(Debug, Clone, Default)]
pub struct SiteConfig {
    /// First single match becomes the title (and is detached from the tree).
    pub title: OrderedSet,
    /// First expression yielding a non-empty result becomes the body.
    pub body: OrderedSet,
    /// All matches of all expressions accumulate into the author set.
    pub author: OrderedSet,
    /// First single match becomes the date, captured as raw text.
    pub date: OrderedSet,
    /// Elements matching these expressions are removed before body extraction.
    pub strip: OrderedSet,
    /// Elements whose class or id contains one of these substrings are removed.
    pub strip_id_or_class: OrderedSet,
    /// Images whose src contains one of these substrings are removed.
    pub strip_image_src: OrderedSet,
    /// Link to a page holding the whole article (parsed, kept for callers).
    pub single_page_link: OrderedSet,
    /// Link to the next page of a paginated article.
    pub next_page_link: OrderedSet,
    /// Same as single_page_link but applied to feed item descriptions.
    pub single_page_link_in_feed: OrderedSet,
    /// Extra HTTP headers to send when fetching pages (kept for callers).
    pub http_header: OrderedSet,

    pub test_url: OrderedSet,
    pub test_contains: OrderedSet,
    pub test_title: OrderedSet,
    pub test_date: OrderedSet,
    pub test_author: OrderedSet,
    pub test_language: OrderedSet,

    pub tidy: TriState,
    pub prune: TriState,
    pub autodetect_on_failure: TriState,

    /// Tree-parsing engine name; `None` means the native default.
    pub parser: Option<String>,

    /// Literal substrings to search for before parsing. Parallel to
    /// `replace_string`: positional, duplicates significant.
    pub find_string: Vec<String>,
    /// Replacements for `find_string`, index for index.
    pub replace_string: Vec<String>,

    replace_patterns: Vec<(String, String)>,
}

/// Compiled-in defaults, applied at merge time for scalars no source set.
const DEFAULT_TIDY: bool = true;
const DEFAULT_PRUNE: bool = true;
const DEFAULT_AUTODETECT: bool = true;

impl SiteConfig {
    /// Creates an empty config with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a config text and layers it over compiled-in defaults.
    ///
    /// Fails with [`crate::Error::InvalidConfig`] on a find/replace count
    /// mismatch; malformed lines are logged and skipped, never fatal.
    pub fn from_text(text: &str) -> Result<Self> {
        let parsed = parse_site_config(text)?;
        let mut config = SiteConfig::new();
        config.merge(&parsed);
        Ok(config)
    }

    /// Layers `other` under this config: self wins wherever both are set.
    ///
    /// Callers stack a specific config over a generic fallback by merging
    /// the specific one first. Scalars left unset by every source receive
    /// the compiled-in defaults here.
    pub fn merge(&mut self, other: &SiteConfig) {
        self.title.extend_from(&other.title);
        self.body.extend_from(&other.body);
        self.author.extend_from(&other.author);
        self.date.extend_from(&other.date);
        self.strip.extend_from(&other.strip);
        self.strip_id_or_class.extend_from(&other.strip_id_or_class);
        self.strip_image_src.extend_from(&other.strip_image_src);
        self.single_page_link.extend_from(&other.single_page_link);
        self.next_page_link.extend_from(&other.next_page_link);
        self.single_page_link_in_feed
            .extend_from(&other.single_page_link_in_feed);
        self.http_header.extend_from(&other.http_header);
        self.test_url.extend_from(&other.test_url);
        self.test_contains.extend_from(&other.test_contains);
        self.test_title.extend_from(&other.test_title);
        self.test_date.extend_from(&other.test_date);
        self.test_author.extend_from(&other.test_author);
        self.test_language.extend_from(&other.test_language);

        if !self.tidy.is_set() {
            self.tidy = if other.tidy.is_set() {
                other.tidy
            } else {
                TriState::from_bool(DEFAULT_TIDY)
            };
        }
        if !self.prune.is_set() {
            self.prune = if other.prune.is_set() {
                other.prune
            } else {
                TriState::from_bool(DEFAULT_PRUNE)
            };
        }
        if !self.autodetect_on_failure.is_set() {
            self.autodetect_on_failure = if other.autodetect_on_failure.is_set() {
                other.autodetect_on_failure
            } else {
                TriState::from_bool(DEFAULT_AUTODETECT)
            };
        }

        if self.parser.as_deref().map_or(true, str::is_empty) {
            self.parser = other
                .parser
                .clone()
                .or_else(|| Some(NATIVE_PARSER.to_string()));
        }
        // Legacy configs name the old engine; normalize to ours.
        if self.parser.as_deref() == Some("libxml") {
            self.parser = Some(NATIVE_PARSER.to_string());
        }

        self.find_string.extend(other.find_string.iter().cloned());
        self.replace_string
            .extend(other.replace_string.iter().cloned());
        self.rebuild_replace_patterns();
    }

    /// Recomputes the derived (find, replace) pair list. Called after any
    /// change to the parallel lists.
    pub(crate) fn rebuild_replace_patterns(&mut self) {
        self.replace_patterns = self
            .find_string
            .iter()
            .cloned()
            .zip(self.replace_string.iter().cloned())
            .collect();
    }

    /// Ordered (find, replace) pairs for the replace stage.
    pub fn replace_patterns(&self) -> &[(String, String)] {
        &self.replace_patterns
    }

    /// Effective parser engine name after defaulting and normalization.
    pub fn parser_name(&self) -> &str {
        match self.parser.as_deref() {
            Some("libxml") | None => NATIVE_PARSER,
            Some(name) => name,
        }
    }

    pub fn tidy_enabled(&self) -> bool {
        self.tidy.resolve(DEFAULT_TIDY)
    }

    pub fn prune_enabled(&self) -> bool {
        self.prune.resolve(DEFAULT_PRUNE)
    }

    pub fn autodetect_enabled(&self) -> bool {
        self.autodetect_on_failure.resolve(DEFAULT_AUTODETECT)
    }

    /// True if the config carries any test_* directives.
    pub fn has_tests(&self) -> bool {
        !self.test_url.is_empty()
            || !self.test_contains.is_empty()
            || !self.test_title.is_empty()
            || !self.test_date.is_empty()
            || !self.test_author.is_empty()
            || !self.test_language.is_empty()
    }
}
