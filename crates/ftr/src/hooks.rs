// ABOUTME: Capability traits for the external tidy and readability-style engines.
// ABOUTME: The pipeline holds these as optional trait objects and skips their stages when absent.

use std::fmt;

/// Fixed option bag handed to a [`Tidy`] implementation.
///
/// Mirrors the settings the extraction pipeline has always relied on:
/// XHTML output, logical emphasis, modern block/inline tags declared, text
/// enclosed in block elements, comments hidden.
#[derive(Debug, Clone)]
pub struct TidyOptions {
    pub clean: bool,
    pub output_xhtml: bool,
    pub logical_emphasis: bool,
    pub show_body_only: bool,
    pub wrap: u32,
    pub drop_empty_paras: bool,
    pub drop_proprietary_attributes: bool,
    pub enclose_text: bool,
    pub enclose_block_text: bool,
    pub merge_divs: bool,
    pub merge_spans: bool,
    pub hide_comments: bool,
    pub char_encoding: String,
    pub new_blocklevel_tags: String,
    pub new_inline_tags: String,
}

impl Default for TidyOptions {
    fn default() -> Self {
        Self {
            clean: true,
            output_xhtml: true,
            logical_emphasis: true,
            show_body_only: false,
            wrap: 0,
            drop_empty_paras: true,
            drop_proprietary_attributes: false,
            enclose_text: true,
            enclose_block_text: true,
            merge_divs: true,
            merge_spans: true,
            hide_comments: true,
            char_encoding: "utf8".to_string(),
            new_blocklevel_tags: "article, aside, footer, header, hgroup, menu, nav, section, \
                                  details, datagrid"
                .to_string(),
            new_inline_tags: "mark, time, meter, progress, data".to_string(),
        }
    }
}

/// Markup-normalizing pre-pass repairing malformed HTML before parsing.
///
/// Some sites ship markup broken enough to confuse structural parsing; a
/// tidy pass fixes most of them but occasionally makes things worse, which
/// is why configs can disable it and the pipeline retries without it.
pub trait Tidy {
    fn tidy(&self, html: &str, options: &TidyOptions) -> anyhow::Result<String>;
}

impl fmt::Debug for dyn Tidy + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn Tidy")
    }
}

/// Generic readability-style extraction, used two ways: per-node pruning of
/// body candidates (the `prune` flag) and whole-document fallback when the
/// explicit rules produced nothing (`autodetect_on_failure`).
pub trait AutoExtract {
    /// Best-effort title for a whole document.
    fn title(&self, html: &str) -> Option<String>;

    /// Best-effort body summary for a whole document.
    fn summary(&self, html: &str) -> Option<String>;

    /// Reduces one body-candidate fragment to its content-bearing core.
    fn prune(&self, fragment: &str) -> anyhow::Result<String>;
}

impl fmt::Debug for dyn AutoExtract + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn AutoExtract")
    }
}
