// ABOUTME: Line-oriented directive parser turning site-config text into a SiteConfig.
// ABOUTME: Malformed or unknown lines are logged and skipped; only a find/replace count mismatch is fatal.

//! Parser for the `key: value` site-config text format.
//!
//! The format is shared with a large third-party corpus of config files, so
//! leniency matters: blank lines and `#` comments are ignored, unknown keys
//! and malformed lines are logged and skipped. The parsed config is "raw",
//! with no defaults applied; that happens when it is merged into another
//! config (see [`SiteConfig::merge`](super::SiteConfig::merge)).

use tracing::warn;

use super::{OrderedSet, SiteConfig, TriState};
use crate::error::{Error, Result};

/// Multi-valued directives appending to an ordered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetField {
    Title,
    Body,
    Author,
    Date,
    Strip,
    StripIdOrClass,
    StripImageSrc,
    SinglePageLink,
    NextPageLink,
    SinglePageLinkInFeed,
    HttpHeader,
    TestUrl,
    TestContains,
    TestTitle,
    TestDate,
    TestAuthor,
    TestLanguage,
}

impl SetField {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "title" => SetField::Title,
            "body" => SetField::Body,
            "author" => SetField::Author,
            "date" => SetField::Date,
            "strip" => SetField::Strip,
            "strip_id_or_class" => SetField::StripIdOrClass,
            "strip_image_src" => SetField::StripImageSrc,
            "single_page_link" => SetField::SinglePageLink,
            "next_page_link" => SetField::NextPageLink,
            "single_page_link_in_feed" => SetField::SinglePageLinkInFeed,
            "http_header" => SetField::HttpHeader,
            "test_url" => SetField::TestUrl,
            "test_contains" => SetField::TestContains,
            "test_title" => SetField::TestTitle,
            "test_date" => SetField::TestDate,
            "test_author" => SetField::TestAuthor,
            "test_language" => SetField::TestLanguage,
            _ => return None,
        })
    }

    fn target<'c>(self, config: &'c mut SiteConfig) -> &'c mut OrderedSet {
        match self {
            SetField::Title => &mut config.title,
            SetField::Body => &mut config.body,
            SetField::Author => &mut config.author,
            SetField::Date => &mut config.date,
            SetField::Strip => &mut config.strip,
            SetField::StripIdOrClass => &mut config.strip_id_or_class,
            SetField::StripImageSrc => &mut config.strip_image_src,
            SetField::SinglePageLink => &mut config.single_page_link,
            SetField::NextPageLink => &mut config.next_page_link,
            SetField::SinglePageLinkInFeed => &mut config.single_page_link_in_feed,
            SetField::HttpHeader => &mut config.http_header,
            SetField::TestUrl => &mut config.test_url,
            SetField::TestContains => &mut config.test_contains,
            SetField::TestTitle => &mut config.test_title,
            SetField::TestDate => &mut config.test_date,
            SetField::TestAuthor => &mut config.test_author,
            SetField::TestLanguage => &mut config.test_language,
        }
    }
}

/// Parses raw site-config text into a [`SiteConfig`].
///
/// Returns [`Error::InvalidConfig`] if the text declares unequal numbers of
/// `find_string` and `replace_string` directives; every other problem is
/// non-fatal and reported via the log.
pub fn parse_site_config(text: &str) -> Result<SiteConfig> {
    let mut config = SiteConfig::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once(':') else {
            warn!(line_number, line, "unrecognized syntax, skipping line");
            continue;
        };

        // Keys are case-insensitive; the raw form is kept around because the
        // replace_string(...) one-liner carries a literal inside the key.
        let raw_key = raw_key.trim();
        let key = raw_key.to_lowercase();
        let value = raw_value.trim();

        if key.is_empty() {
            warn!(line_number, line, "empty directive key, skipping line");
            continue;
        }

        if let Some(field) = SetField::from_key(&key) {
            if value.is_empty() {
                warn!(line_number, line, "empty directive value, skipping line");
                continue;
            }
            field.target(&mut config).insert(value);
        } else if key == "find_string" {
            if value.is_empty() {
                warn!(line_number, line, "empty find_string, skipping line");
                continue;
            }
            config.find_string.push(value.to_string());
        } else if key == "replace_string" {
            // An empty replacement is meaningful: it deletes the found string.
            config.replace_string.push(value.to_string());
        } else if key == "tidy" || key == "prune" || key == "autodetect_on_failure" {
            if value.is_empty() {
                warn!(line_number, line, "empty directive value, skipping line");
                continue;
            }
            let flag = TriState::from_directive(value);
            match key.as_str() {
                "tidy" => config.tidy = flag,
                "prune" => config.prune = flag,
                _ => config.autodetect_on_failure = flag,
            }
        } else if key == "parser" {
            if value.is_empty() {
                warn!(line_number, line, "empty parser value, skipping line");
                continue;
            }
            if config.parser.as_deref().map_or(true, str::is_empty) {
                config.parser = Some(value.to_string());
            }
        } else if key.starts_with("replace_string(") && key.ends_with(')') {
            // One-liner sugar: replace_string(<FIND>): <REPLACE>. The find
            // literal is taken from the un-lowercased key.
            let find = &raw_key["replace_string(".len()..raw_key.len() - 1];
            config.find_string.push(find.to_string());
            config.replace_string.push(value.to_string());
        } else {
            warn!(line_number, key, value, "unsupported directive, skipping");
        }
    }

    let find = config.find_string.len();
    let replace = config.replace_string.len();
    if find != replace {
        return Err(Error::InvalidConfig { find, replace });
    }

    config.rebuild_replace_patterns();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_set_directives_in_order_with_dedup() {
        let config = parse_site_config(
            "title: //h1\n\
             # a comment\n\
             title: //h2\n\
             title: //h1\n\
             body: //div[@id='content']\n",
        )
        .unwrap();

        assert_eq!(
            config.title.as_slice(),
            &["//h1".to_string(), "//h2".to_string()]
        );
        assert_eq!(config.body.len(), 1);
    }

    #[test]
    fn skips_malformed_and_unknown_lines() {
        let config = parse_site_config(
            "no colon here\n\
             : value with empty key\n\
             title:\n\
             bogus_directive: something\n\
             title: //h1\n",
        )
        .unwrap();

        assert_eq!(config.title.as_slice(), &["//h1".to_string()]);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let config = parse_site_config("Title: //h1\nTIDY: no\n").unwrap();
        assert_eq!(config.title.as_slice(), &["//h1".to_string()]);
        assert_eq!(config.tidy, TriState::No);
    }

    #[test]
    fn one_liner_replace_preserves_case_and_order() {
        let config =
            parse_site_config("replace_string(foo): bar\nreplace_string(Baz): qux\n").unwrap();

        assert_eq!(
            config.find_string,
            vec!["foo".to_string(), "Baz".to_string()]
        );
        assert_eq!(
            config.replace_string,
            vec!["bar".to_string(), "qux".to_string()]
        );
        assert_eq!(config.replace_patterns().len(), 2);
    }

    #[test]
    fn find_replace_lists_keep_duplicates() {
        let config = parse_site_config(
            "find_string: x\n\
             replace_string: y\n\
             find_string: x\n\
             replace_string: z\n",
        )
        .unwrap();

        assert_eq!(config.find_string, vec!["x".to_string(), "x".to_string()]);
        assert_eq!(
            config.replace_patterns(),
            &[
                ("x".to_string(), "y".to_string()),
                ("x".to_string(), "z".to_string())
            ]
        );
    }

    #[test]
    fn empty_replace_string_value_is_allowed() {
        let config = parse_site_config("find_string: junk\nreplace_string:\n").unwrap();
        assert_eq!(
            config.replace_patterns(),
            &[("junk".to_string(), String::new())]
        );
    }

    #[test]
    fn find_replace_count_mismatch_is_fatal() {
        let err = parse_site_config(
            "find_string: a\n\
             find_string: b\n\
             replace_string: only-one\n",
        )
        .unwrap_err();

        assert!(err.is_invalid_config());
        assert_eq!(
            err.to_string(),
            "find_string and replace_string do not correspond (2 != 1)"
        );
    }

    #[test]
    fn parser_first_value_wins() {
        let config = parse_site_config("parser: html5ever\nparser: other\n").unwrap();
        assert_eq!(config.parser.as_deref(), Some("html5ever"));
    }

    #[test]
    fn tristate_directives_parse() {
        let config = parse_site_config("tidy: no\nprune: 0\nautodetect_on_failure: yes\n").unwrap();
        assert_eq!(config.tidy, TriState::No);
        assert_eq!(config.prune, TriState::No);
        assert_eq!(config.autodetect_on_failure, TriState::Yes);
    }

    #[test]
    fn http_header_and_test_directives_are_collected() {
        let config = parse_site_config(
            "http_header: user-agent: Mozilla/5.2\n\
             test_url: http://example.com/article\n\
             test_contains: some text\n",
        )
        .unwrap();

        // http_header values may themselves contain colons; only the first
        // colon splits key from value.
        assert_eq!(
            config.http_header.as_slice(),
            &["user-agent: Mozilla/5.2".to_string()]
        );
        assert!(config.has_tests());
    }
}
