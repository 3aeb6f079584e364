// ABOUTME: Per-document extraction pipeline applying one SiteConfig to one HTML document.
// ABOUTME: Ordered stages with local recovery for ambiguous matches and a bounded no-tidy retry.

//! The extraction pipeline.
//!
//! Stages run in a fixed order: literal replacements, optional tidy,
//! parse, next-page link, title, author, language, date, strip, body,
//! autodetect fallback. Each stage skips itself when its precondition
//! fails; an expression matching more than one node where exactly one is
//! expected is logged and skipped rather than aborting its stage.
//!
//! If nothing was extracted and the document had been tidied, the whole
//! pipeline runs once more on the pre-tidy text with tidying disabled.
//! Tidy fixes more sites than it breaks, but it does break some.

pub mod result;

use dom_query::{Document, Matcher, NodeId, NodeRef};
use tracing::{debug, info, warn};

use crate::config::{SiteConfig, NATIVE_PARSER};
use crate::error::{Error, Result};
use crate::hooks::{AutoExtract, Tidy, TidyOptions};
use crate::pattern::{css_matcher, Capture, Pattern};

pub use result::Extraction;

/// Fixed fallback expressions for the document language.
const LANGUAGE_PATTERNS: &[&str] = &[
    "//html[@lang]/@lang",
    "//meta[@name=\"DC.language\"]/@content",
];

/// Ignore-class markers honored for third-party compatibility: publishers
/// tag boilerplate with these to opt it out of extraction.
const IGNORE_MARKER_CSS: &str = "[class~='entry-unrelated'],[class~='instapaper_ignore']";

/// Inline-hidden elements are never article content.
const HIDDEN_STYLE_CSS: &str = "[style*='display:none']";

/// Applies one read-only [`SiteConfig`] to HTML documents.
///
/// The tidy and auto-extraction capabilities are optional; their stages are
/// skipped when absent. An extractor borrows its config and may be used for
/// any number of documents.
pub struct Extractor<'a> {
    config: &'a SiteConfig,
    tidy: Option<&'a dyn Tidy>,
    tidy_options: TidyOptions,
    auto: Option<&'a dyn AutoExtract>,
}

impl<'a> Extractor<'a> {
    pub fn new(config: &'a SiteConfig) -> Self {
        Self {
            config,
            tidy: None,
            tidy_options: TidyOptions::default(),
            auto: None,
        }
    }

    pub fn with_tidy(mut self, tidy: &'a dyn Tidy) -> Self {
        self.tidy = Some(tidy);
        self
    }

    pub fn with_auto_extract(mut self, auto: &'a dyn AutoExtract) -> Self {
        self.auto = Some(auto);
        self
    }

    /// Extracts with smart tidy allowed (the normal entry point).
    pub fn extract(&self, html: &str) -> Result<Extraction> {
        self.extract_with(html, true)
    }

    /// Extracts, controlling whether the tidy/no-tidy retry is permitted.
    ///
    /// At most one retry happens: the second pass runs with tidying
    /// disabled, so it cannot trigger a third.
    pub fn extract_with(&self, html: &str, smart_tidy: bool) -> Result<Extraction> {
        let first = self.run_once(html, smart_tidy)?;
        if first.success || !first.tidied || !smart_tidy {
            return Ok(first);
        }

        debug!("extraction failed on tidied markup, retrying without tidy");
        self.run_once(html, false)
    }

    fn run_once(&self, raw: &str, allow_tidy: bool) -> Result<Extraction> {
        let mut ex = Extraction::default();

        // Stage 1: literal find/replace over the raw markup, in declared
        // order. Replacement is positional and sequential.
        let mut html = raw.to_string();
        for (find, replace) in self.config.replace_patterns() {
            html = html.replace(find.as_str(), replace.as_str());
        }

        // Stage 2: tidy, when the config wants it and a capability exists.
        if allow_tidy && self.config.tidy_enabled() {
            if let Some(tidy) = self.tidy {
                match tidy.tidy(&html, &self.tidy_options) {
                    Ok(normalized) => {
                        html = normalized;
                        ex.tidied = true;
                        debug!("tidied document");
                    }
                    Err(err) => warn!(%err, "tidy failed, continuing with original markup"),
                }
            }
        }

        // Stage 3: parse with the configured engine.
        let engine = self.config.parser_name();
        if engine != NATIVE_PARSER {
            return Err(Error::UnsupportedParser(engine.to_string()));
        }
        let doc = Document::from(html.as_str());

        self.extract_next_page_link(&doc, &mut ex);
        self.extract_title(&doc, &mut ex);
        self.extract_authors(&doc, &mut ex);
        self.extract_language(&doc, &mut ex);
        self.extract_date(&doc, &mut ex);
        self.strip_unwanted(&doc);
        self.extract_body(&doc, &mut ex);

        // Stage 11 works on the tidied, pre-strip markup: the strip stage
        // mutated the tree, not this string.
        self.auto_extract_if_failed(&html, &mut ex);

        ex.success = ex.has_title()
            || ex.has_body()
            || !ex.authors.is_empty()
            || ex.date.is_some()
            || ex.language.is_some();

        Ok(ex)
    }

    /// Stage 4: first expression yielding exactly one match wins; multiple
    /// matches are ambiguous and skip to the next expression.
    fn extract_next_page_link(&self, doc: &Document, ex: &mut Extraction) {
        for expr in &self.config.next_page_link {
            let Some((pattern, nodes)) = select_nodes(doc, expr) else {
                continue;
            };
            match nodes.len() {
                0 => {}
                1 => {
                    let node = &nodes[0];
                    // Prefer an href-like attribute; fall back to text.
                    let value = match pattern.capture() {
                        Capture::Attr(_) => pattern.value_of(node),
                        Capture::Text => node
                            .attr("href")
                            .map(|v| v.trim().to_string())
                            .or_else(|| pattern.value_of(node)),
                    };
                    if let Some(value) = value.filter(|v| !v.is_empty()) {
                        debug!(expr, link = value, "found next-page link");
                        ex.next_page_url = Some(value);
                        return;
                    }
                }
                n => warn!(expr, matches = n, "ambiguous next-page link, skipping expression"),
            }
        }
    }

    /// Stage 5: title from the first single match, which is then detached
    /// from the tree so it cannot leak into the body.
    fn extract_title(&self, doc: &Document, ex: &mut Extraction) {
        for expr in &self.config.title {
            let Some((pattern, nodes)) = select_nodes(doc, expr) else {
                continue;
            };
            match nodes.len() {
                0 => {}
                1 => {
                    let node = &nodes[0];
                    if let Some(title) = pattern.value_of(node) {
                        info!(title, "extracted title");
                        ex.title = Some(title);
                        node.remove_from_parent();
                        return;
                    }
                }
                n => warn!(expr, matches = n, "ambiguous title, skipping expression"),
            }
        }
    }

    /// Stage 6: every match of every expression contributes an author.
    fn extract_authors(&self, doc: &Document, ex: &mut Extraction) {
        for expr in &self.config.author {
            let Some((pattern, nodes)) = select_nodes(doc, expr) else {
                continue;
            };
            for node in &nodes {
                if let Some(author) = pattern.value_of(node).filter(|a| !a.is_empty()) {
                    debug!(author, "found author");
                    ex.authors.insert(author);
                }
            }
        }
    }

    /// Stage 7: fixed fallback list, first non-empty value wins.
    fn extract_language(&self, doc: &Document, ex: &mut Extraction) {
        for expr in LANGUAGE_PATTERNS {
            let Some((pattern, nodes)) = select_nodes(doc, expr) else {
                continue;
            };
            for node in &nodes {
                if let Some(language) = pattern.value_of(node).filter(|l| !l.is_empty()) {
                    debug!(language, "found document language");
                    ex.language = Some(language);
                    return;
                }
            }
        }
    }

    /// Stage 8: date from the first single match, kept as raw text.
    fn extract_date(&self, doc: &Document, ex: &mut Extraction) {
        for expr in &self.config.date {
            let Some((pattern, nodes)) = select_nodes(doc, expr) else {
                continue;
            };
            match nodes.len() {
                0 => {}
                1 => {
                    if let Some(date) = pattern.value_of(&nodes[0]) {
                        debug!(date, "found date");
                        ex.date = Some(date);
                        return;
                    }
                }
                n => warn!(expr, matches = n, "ambiguous date, skipping expression"),
            }
        }
    }

    /// Stage 9: permanent removals, visible to every later stage.
    fn strip_unwanted(&self, doc: &Document) {
        for expr in &self.config.strip {
            if let Some((_, nodes)) = select_nodes(doc, expr) {
                remove_nodes(&nodes);
            }
        }

        for needle in &self.config.strip_id_or_class {
            let needle = needle.replace(['"', '\''], "");
            remove_matching(doc, &format!("[class*='{needle}'],[id*='{needle}']"));
        }

        for needle in &self.config.strip_image_src {
            let needle = needle.replace(['"', '\''], "");
            remove_matching(doc, &format!("img[src*='{needle}']"));
        }

        remove_matching(doc, IGNORE_MARKER_CSS);
        remove_matching(doc, HIDDEN_STYLE_CSS);
    }

    /// Stage 10: body from the first expression producing a non-empty
    /// result. A single match uses that node's subtree; several matches
    /// are assembled into a synthetic container, skipping nodes nested in
    /// an already-kept one.
    fn extract_body(&self, doc: &Document, ex: &mut Extraction) {
        let prune = self.config.prune_enabled();

        for expr in &self.config.body {
            let Some((_, nodes)) = select_nodes(doc, expr) else {
                continue;
            };
            if nodes.is_empty() {
                continue;
            }

            if nodes.len() == 1 {
                let markup = nodes[0].html().to_string();
                let markup = match self.prune_fragment(prune, &markup) {
                    PruneOutcome::Kept(pruned) => pruned,
                    PruneOutcome::Unpruned => markup,
                    // A sole candidate is better kept raw than dropped.
                    PruneOutcome::Failed => markup,
                };
                if !markup.trim().is_empty() {
                    ex.body = Some(markup);
                    return;
                }
                continue;
            }

            let mut kept_ids: Vec<NodeId> = Vec::new();
            let mut parts: Vec<String> = Vec::new();
            for node in &nodes {
                if node.parent().is_none() {
                    continue;
                }
                if is_descendant_of_any(node, &kept_ids) {
                    continue;
                }
                let markup = node.html().to_string();
                let markup = match self.prune_fragment(prune, &markup) {
                    PruneOutcome::Kept(pruned) => pruned,
                    PruneOutcome::Unpruned => markup,
                    PruneOutcome::Failed => continue,
                };
                parts.push(markup);
                kept_ids.push(node.id);
            }

            if !parts.is_empty() {
                ex.body = Some(format!("<div>{}</div>", parts.join("\n")));
                return;
            }
        }
    }

    fn prune_fragment(&self, prune: bool, markup: &str) -> PruneOutcome {
        if !prune {
            return PruneOutcome::Unpruned;
        }
        let Some(auto) = self.auto else {
            return PruneOutcome::Unpruned;
        };
        match auto.prune(markup) {
            Ok(pruned) => PruneOutcome::Kept(pruned),
            Err(err) => {
                warn!(%err, "pruning body candidate failed");
                PruneOutcome::Failed
            }
        }
    }

    /// Stage 11: failure bookkeeping plus best-effort recovery of title and
    /// body through the generic heuristic. Only runs when the config allows
    /// autodetection.
    fn auto_extract_if_failed(&self, html: &str, ex: &mut Extraction) {
        if !self.config.autodetect_enabled() {
            return;
        }

        if !ex.has_title() && !self.config.title.is_empty() {
            ex.record_failure("title");
        }
        if !ex.has_body() && !self.config.body.is_empty() {
            ex.record_failure("body");
        }
        if ex.authors.is_empty() && !self.config.author.is_empty() {
            ex.record_failure("author");
        }
        if ex.date.is_none() && !self.config.date.is_empty() {
            ex.record_failure("date");
        }
        if ex.language.is_none() {
            ex.record_failure("language");
        }

        let Some(auto) = self.auto else { return };

        if !ex.has_title() {
            if let Some(title) = auto
                .title(html)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
            {
                info!(title, "recovered title via autodetection");
                ex.title = Some(title);
            }
        }
        if !ex.has_body() {
            if let Some(body) = auto
                .summary(html)
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
            {
                info!("recovered body via autodetection");
                ex.body = Some(body);
            }
        }
    }
}

enum PruneOutcome {
    Kept(String),
    Unpruned,
    Failed,
}

/// Compiles an expression and collects its matches. `None` means the
/// expression itself is unusable (already logged by the pattern module).
fn select_nodes<'d>(doc: &'d Document, expr: &str) -> Option<(Pattern, Vec<NodeRef<'d>>)> {
    let pattern = Pattern::compile(expr)?;
    let matcher: Matcher = pattern.matcher()?;
    let sel = doc.select_matcher(&matcher);
    let nodes = sel.nodes().to_vec();
    Some((pattern, nodes))
}

fn remove_matching(doc: &Document, css: &str) {
    if let Some(matcher) = css_matcher(css) {
        let sel = doc.select_matcher(&matcher);
        remove_nodes(sel.nodes());
    }
}

fn remove_nodes(nodes: &[NodeRef]) {
    if !nodes.is_empty() {
        debug!(count = nodes.len(), "removing unwanted nodes");
    }
    for node in nodes {
        node.remove_from_parent();
    }
}

fn is_descendant_of_any(node: &NodeRef, ancestors: &[NodeId]) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if ancestors.contains(&parent.id) {
            return true;
        }
        current = parent.parent();
    }
    false
}
