// ABOUTME: Compiles site-config pattern expressions into cached CSS matchers.
// ABOUTME: Supports the XPath-flavored subset used by the config corpus plus raw CSS pass-through.

//! Pattern expressions and their compilation.
//!
//! The third-party config corpus writes patterns in an XPath-flavored path
//! syntax (`//div[@id='content']//p`, `//a[@rel='next']/@href`). The native
//! tree engine queries with CSS selectors, so this module translates the
//! subset of that syntax the corpus actually uses into a CSS selector plus
//! an optional trailing attribute capture. Expressions that are not
//! path-shaped are assumed to already be CSS and pass through untouched.
//!
//! Compiled matchers are cached process-wide: selector parsing is expensive
//! relative to matching, and configs are reused across many documents.

use std::collections::HashMap;
use std::sync::RwLock;

use dom_query::{Matcher, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// What a matched node contributes as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Trimmed text content of the node.
    Text,
    /// Value of the named attribute.
    Attr(String),
}

/// A compiled pattern: a CSS selector string plus a capture mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    css: String,
    capture: Capture,
}

static MATCHER_CACHE: Lazy<RwLock<HashMap<String, Option<Matcher>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a raw CSS selector, caching the result (including
/// failures). Used directly by the strip stage for selectors it synthesizes.
pub(crate) fn css_matcher(css: &str) -> Option<Matcher> {
    get_or_compile(css)
}

/// Gets or compiles a CSS selector, caching the result (including failures).
fn get_or_compile(css: &str) -> Option<Matcher> {
    {
        let cache = MATCHER_CACHE.read().unwrap();
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = Matcher::new(css).ok();
    let mut cache = MATCHER_CACHE.write().unwrap();
    if let Some(cached) = cache.get(css) {
        return cached.clone();
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled
}

impl Pattern {
    /// Compiles a config pattern expression.
    ///
    /// Returns `None` for expressions outside the supported subset or whose
    /// CSS translation fails to parse; the failure is logged so a bad config
    /// line degrades to "no match" rather than aborting extraction.
    pub fn compile(expr: &str) -> Option<Pattern> {
        let expr = expr.trim();
        if expr.is_empty() {
            return None;
        }

        let (css, capture) = if expr.starts_with('/') {
            match xpath_to_css(expr) {
                Some(translated) => translated,
                None => {
                    warn!(expr, "unsupported pattern expression, skipping");
                    return None;
                }
            }
        } else {
            (expr.to_string(), Capture::Text)
        };

        if get_or_compile(&css).is_none() {
            warn!(expr, css, "pattern does not compile to a selector, skipping");
            return None;
        }

        Some(Pattern { css, capture })
    }

    /// The cached matcher for this pattern.
    ///
    /// Present by construction: `compile` verified the selector parses.
    pub fn matcher(&self) -> Option<Matcher> {
        get_or_compile(&self.css)
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Extracts this pattern's value from a matched node: the captured
    /// attribute, or trimmed text. Empty values are `None` either way, so
    /// a blank attribute does not masquerade as a successful capture.
    pub fn value_of(&self, node: &NodeRef) -> Option<String> {
        let value = match &self.capture {
            Capture::Attr(name) => node.attr(name).map(|v| v.trim().to_string()),
            Capture::Text => Some(node.text().trim().to_string()),
        };
        value.filter(|v| !v.is_empty())
    }
}

static PRED_ATTR_EQ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^@([\w-]+)\s*=\s*['"](.*)['"]$"#).unwrap());
static PRED_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@([\w-]+)$").unwrap());
static PRED_CONTAINS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^contains\(\s*@([\w-]+)\s*,\s*['"](.*)['"]\s*\)$"#).unwrap());
static PRED_CLASS_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^contains\(\s*concat\(\s*' '\s*,\s*normalize-space\(@class\)\s*,\s*' '\s*\)\s*,\s*' ([^']+) '\s*\)$"#,
    )
    .unwrap()
});

/// Translates one path expression into (css, capture).
///
/// Supported steps: `//name`, `/name`, `*`, a trailing `/@attr` or
/// `/text()`, and the predicates `[@a]`, `[@a='v']`, `[contains(@a,'v')]`
/// and the normalize-space class-word idiom. Anything else returns `None`.
fn xpath_to_css(expr: &str) -> Option<(String, Capture)> {
    let mut css = String::new();
    let mut capture = Capture::Text;
    let mut rest = expr;
    let mut first = true;

    while !rest.is_empty() {
        let descendant = if let Some(r) = rest.strip_prefix("//") {
            rest = r;
            true
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
            false
        } else {
            return None;
        };

        let step_end = find_step_end(rest);
        let step = &rest[..step_end];
        rest = &rest[step_end..];

        if step.is_empty() {
            return None;
        }

        if let Some(attr) = step.strip_prefix('@') {
            // Attribute capture must be the last step.
            if !rest.is_empty() || first {
                return None;
            }
            capture = Capture::Attr(attr.to_string());
            break;
        }
        if step == "text()" {
            if !rest.is_empty() || first {
                return None;
            }
            break;
        }

        if !first {
            css.push_str(if descendant { " " } else { " > " });
        }
        css.push_str(&step_to_css(step)?);
        first = false;
    }

    if css.is_empty() {
        return None;
    }
    Some((css, capture))
}

/// Finds the end of the current step: the next `/` outside brackets.
fn find_step_end(rest: &str) -> usize {
    let mut depth = 0usize;
    for (i, c) in rest.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => return i,
            _ => {}
        }
    }
    rest.len()
}

/// Translates one step (`name[pred][pred]`) into a CSS compound selector.
fn step_to_css(step: &str) -> Option<String> {
    let (name, mut preds) = match step.find('[') {
        Some(i) => (&step[..i], &step[i..]),
        None => (step, ""),
    };

    if name.is_empty() || name.contains(':') {
        return None;
    }
    let mut css = if name == "*" && !preds.is_empty() {
        String::new()
    } else {
        name.to_string()
    };

    while !preds.is_empty() {
        if !preds.starts_with('[') {
            return None;
        }
        let end = find_bracket_end(preds)?;
        let pred = preds[1..end].trim();
        preds = &preds[end + 1..];

        if let Some(caps) = PRED_CLASS_WORD.captures(pred) {
            css.push_str(&format!("[class~='{}']", &caps[1]));
        } else if let Some(caps) = PRED_CONTAINS.captures(pred) {
            css.push_str(&format!("[{}*='{}']", &caps[1], &caps[2]));
        } else if let Some(caps) = PRED_ATTR_EQ.captures(pred) {
            css.push_str(&format!("[{}='{}']", &caps[1], &caps[2]));
        } else if let Some(caps) = PRED_ATTR.captures(pred) {
            css.push_str(&format!("[{}]", &caps[1]));
        } else {
            // Positional predicates and boolean combinations are out of scope.
            return None;
        }
    }

    Some(css)
}

/// Finds the index of the `]` closing the bracket that opens at index 0.
fn find_bracket_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 && c == ']' {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn css_of(expr: &str) -> String {
        Pattern::compile(expr).expect(expr).css().to_string()
    }

    #[test]
    fn translates_descendant_element() {
        assert_eq!(css_of("//h1"), "h1");
        assert_eq!(css_of("//div//p"), "div p");
        assert_eq!(css_of("//div/p"), "div > p");
    }

    #[test]
    fn translates_attribute_predicates() {
        assert_eq!(css_of("//h1[@id=\"t\"]"), "h1[id='t']");
        assert_eq!(css_of("//div[@id='b']"), "div[id='b']");
        assert_eq!(css_of("//html[@lang]"), "html[lang]");
        assert_eq!(
            css_of("//div[contains(@class, 'story')]"),
            "div[class*='story']"
        );
    }

    #[test]
    fn translates_class_word_idiom() {
        assert_eq!(
            css_of("//*[contains(concat(' ',normalize-space(@class),' '),' byline ')]"),
            "[class~='byline']"
        );
    }

    #[test]
    fn captures_trailing_attribute() {
        let pattern = Pattern::compile("//a[@rel='next']/@href").unwrap();
        assert_eq!(pattern.css(), "a[rel='next']");
        assert_eq!(pattern.capture(), &Capture::Attr("href".to_string()));
    }

    #[test]
    fn trailing_text_step_captures_text() {
        let pattern = Pattern::compile("//span[@class='byline']/text()").unwrap();
        assert_eq!(pattern.css(), "span[class='byline']");
        assert_eq!(pattern.capture(), &Capture::Text);
    }

    #[test]
    fn css_passes_through() {
        let pattern = Pattern::compile("div.article > h1").unwrap();
        assert_eq!(pattern.css(), "div.article > h1");
        assert_eq!(pattern.capture(), &Capture::Text);
    }

    #[test]
    fn unsupported_expressions_are_rejected() {
        assert!(Pattern::compile("//div[1]").is_none());
        assert!(Pattern::compile("//div[@a and @b]").is_none());
        assert!(Pattern::compile("//@href").is_none());
        assert!(Pattern::compile("").is_none());
        assert!(Pattern::compile("//ns:tag").is_none());
    }

    #[test]
    fn unbalanced_predicate_brackets_are_rejected() {
        assert!(Pattern::compile("//div[)]").is_none());
        assert!(Pattern::compile("//div[@a='v'])]").is_none());
        assert!(Pattern::compile("//div[").is_none());
    }

    #[test]
    fn invalid_css_translation_is_rejected() {
        assert!(Pattern::compile("[[[invalid").is_none());
    }

    #[test]
    fn value_of_extracts_text_and_attrs() {
        let doc = dom_query::Document::from(
            r#"<html><body><a rel="next" href="/page/2">  More  </a></body></html>"#,
        );

        let text_pat = Pattern::compile("//a[@rel='next']").unwrap();
        let matcher = text_pat.matcher().unwrap();
        let sel = doc.select_matcher(&matcher);
        let node = &sel.nodes()[0];
        assert_eq!(text_pat.value_of(node), Some("More".to_string()));

        let attr_pat = Pattern::compile("//a[@rel='next']/@href").unwrap();
        assert_eq!(attr_pat.value_of(node), Some("/page/2".to_string()));
    }

    #[test]
    fn empty_attribute_value_is_no_capture() {
        let doc = dom_query::Document::from(
            r#"<html><body><a rel="next" href="">More</a></body></html>"#,
        );

        let attr_pat = Pattern::compile("//a[@rel='next']/@href").unwrap();
        let matcher = attr_pat.matcher().unwrap();
        let sel = doc.select_matcher(&matcher);
        assert_eq!(attr_pat.value_of(&sel.nodes()[0]), None);
    }
}
