// ABOUTME: End-to-end tests for extraction, hooks, the no-tidy retry, and pagination.
// ABOUTME: Uses stub tidy/auto-extract capabilities and a map-backed fetcher.

use std::collections::HashMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use ftr::{
    AutoExtract, Extractor, Fetch, FetchedText, Processor, Repository, SiteConfig, Tidy,
    TidyOptions,
};

/// Tidy stub that passes markup through untouched.
struct NoopTidy;

impl Tidy for NoopTidy {
    fn tidy(&self, html: &str, _options: &TidyOptions) -> anyhow::Result<String> {
        Ok(html.to_string())
    }
}

/// Tidy stub that destroys the document, as a buggy tidy engine can.
struct CorruptingTidy;

impl Tidy for CorruptingTidy {
    fn tidy(&self, _html: &str, _options: &TidyOptions) -> anyhow::Result<String> {
        Ok("<html><body></body></html>".to_string())
    }
}

/// Readability stub with canned answers.
struct StubAuto;

impl AutoExtract for StubAuto {
    fn title(&self, _html: &str) -> Option<String> {
        Some("Detected Title".to_string())
    }

    fn summary(&self, _html: &str) -> Option<String> {
        Some("<p>detected body</p>".to_string())
    }

    fn prune(&self, fragment: &str) -> anyhow::Result<String> {
        Ok(format!("<article>{fragment}</article>"))
    }
}

/// Fetch stub serving canned bodies by exact URL; anything else is a 404.
#[derive(Default)]
struct MapFetcher {
    pages: HashMap<String, String>,
}

impl MapFetcher {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }
}

impl Fetch for MapFetcher {
    fn get(&self, url: &str) -> ftr::Result<FetchedText> {
        let content_type = if url.ends_with(".txt") {
            "text/plain"
        } else {
            "text/html"
        };
        match self.pages.get(url) {
            Some(body) => Ok(FetchedText {
                status: 200,
                final_url: url.to_string(),
                content_type: Some(content_type.to_string()),
                body: body.clone(),
            }),
            None => Ok(FetchedText {
                status: 404,
                final_url: url.to_string(),
                content_type: None,
                body: String::new(),
            }),
        }
    }
}

fn config(text: &str) -> SiteConfig {
    SiteConfig::from_text(text).unwrap()
}

#[test]
fn tidy_runs_when_configured_and_available() {
    let config = config("title: //h1\nautodetect_on_failure: no\n");
    let tidy = NoopTidy;
    let ex = Extractor::new(&config)
        .with_tidy(&tidy)
        .extract("<html><body><h1>Hello</h1></body></html>")
        .unwrap();

    assert!(ex.tidied);
    assert_eq!(ex.title.as_deref(), Some("Hello"));
}

#[test]
fn tidy_disabled_by_config() {
    let config = config("title: //h1\ntidy: no\nautodetect_on_failure: no\n");
    let tidy = NoopTidy;
    let ex = Extractor::new(&config)
        .with_tidy(&tidy)
        .extract("<html><body><h1>Hello</h1></body></html>")
        .unwrap();

    assert!(!ex.tidied);
}

#[test]
fn retry_without_tidy_recovers_from_corruption() {
    let config = config("title: //h1\nautodetect_on_failure: no\n");
    let tidy = CorruptingTidy;
    let extractor = Extractor::new(&config).with_tidy(&tidy);

    let ex = extractor
        .extract("<html><body><h1>Survived</h1></body></html>")
        .unwrap();

    // First pass ran on the corrupted markup and failed; the retry ran on
    // the original text with tidying disabled.
    assert!(ex.success);
    assert!(!ex.tidied);
    assert_eq!(ex.title.as_deref(), Some("Survived"));
}

#[test]
fn smart_tidy_disallowed_means_no_retry_and_no_tidy() {
    let config = config("title: //h1\nautodetect_on_failure: no\n");
    let tidy = CorruptingTidy;
    let ex = Extractor::new(&config)
        .with_tidy(&tidy)
        .extract_with("<html><body><h1>Hello</h1></body></html>", false)
        .unwrap();

    assert!(!ex.tidied);
    assert_eq!(ex.title.as_deref(), Some("Hello"));
}

#[test]
fn autodetect_fallback_records_failure_and_recovers_body() {
    let config = config("body: //div[@id='missing']\ntitle: //h1\n");
    let auto = StubAuto;
    let ex = Extractor::new(&config)
        .with_auto_extract(&auto)
        .extract("<html><body><h1>Real Title</h1><p>text</p></body></html>")
        .unwrap();

    // The explicit body rule existed and matched nothing.
    assert!(ex.failures.iter().any(|f| f == "body"));
    assert_eq!(ex.body.as_deref(), Some("<p>detected body</p>"));
    // The explicit title rule worked, so autodetection left it alone.
    assert_eq!(ex.title.as_deref(), Some("Real Title"));
    assert!(!ex.failures.iter().any(|f| f == "title"));
}

#[test]
fn autodetect_disabled_leaves_fields_empty() {
    let config = config("body: //div[@id='missing']\nautodetect_on_failure: no\n");
    let auto = StubAuto;
    let ex = Extractor::new(&config)
        .with_auto_extract(&auto)
        .extract("<html><body><p>text</p></body></html>")
        .unwrap();

    assert!(ex.body.is_none());
    assert!(ex.failures.is_empty());
}

#[test]
fn prune_passes_body_candidate_through_hook() {
    let config = config("body: //div[@id='b']\nprune: yes\nautodetect_on_failure: no\n");
    let auto = StubAuto;
    let ex = Extractor::new(&config)
        .with_auto_extract(&auto)
        .extract("<html><body><div id=\"b\"><p>content</p></div></body></html>")
        .unwrap();

    let body = ex.body.unwrap();
    assert!(body.starts_with("<article>"));
    assert!(body.contains("content"));
}

#[test]
fn process_url_resolves_config_fetches_and_paginates() {
    let fetcher = MapFetcher::default()
        .with(
            "https://configs.test/example.com.txt",
            "title: //h1\nbody: //div[@id='b']\nnext_page_link: //a[@rel='next']/@href\nautodetect_on_failure: no\nprune: no\n",
        )
        .with(
            "http://example.com/article",
            "<html><body><h1>Title</h1><div id=\"b\">page one</div>\
             <a rel=\"next\" href=\"?page=2\">next</a></body></html>",
        )
        .with(
            "http://example.com/article?page=2",
            "<html><body><div id=\"b\">page two</div></body></html>",
        );

    let processor = Processor::builder()
        .fetch(Arc::new(fetcher))
        .repositories(vec![Repository::parse("https://configs.test/")])
        .build();

    let result = processor.process_url("http://example.com/article").unwrap();

    assert_eq!(result.title.as_deref(), Some("Title"));
    let body = result.body.unwrap();
    assert!(body.contains("page one"));
    assert!(body.contains("page two"));
    let one = body.find("page one").unwrap();
    let two = body.find("page two").unwrap();
    assert!(one < two, "pages must concatenate in order");
    assert_eq!(
        result.followed_links,
        vec!["http://example.com/article?page=2".to_string()]
    );
    assert!(result.next_page_url.is_none());
}

#[test]
fn pagination_stops_on_cycle() {
    let fetcher = MapFetcher::default()
        .with(
            "https://configs.test/example.com.txt",
            "body: //div[@id='b']\nnext_page_link: //a[@rel='next']/@href\nautodetect_on_failure: no\nprune: no\n",
        )
        .with(
            "http://example.com/article",
            "<html><body><div id=\"b\">one</div>\
             <a rel=\"next\" href=\"?page=2\">next</a></body></html>",
        )
        .with(
            "http://example.com/article?page=2",
            // Links straight back to the first page.
            "<html><body><div id=\"b\">two</div>\
             <a rel=\"next\" href=\"http://example.com/article\">next</a></body></html>",
        );

    let processor = Processor::builder()
        .fetch(Arc::new(fetcher))
        .repositories(vec![Repository::parse("https://configs.test/")])
        .build();

    let result = processor.process_url("http://example.com/article").unwrap();

    assert_eq!(result.followed_links.len(), 1);
    let body = result.body.unwrap();
    assert_eq!(body.matches("one").count(), 1);
}

#[test]
fn pagination_respects_max_pages() {
    let fetcher = MapFetcher::default()
        .with(
            "https://configs.test/example.com.txt",
            "body: //div[@id='b']\nnext_page_link: //a[@rel='next']/@href\nautodetect_on_failure: no\nprune: no\n",
        )
        .with(
            "http://example.com/article",
            "<html><body><div id=\"b\">one</div>\
             <a rel=\"next\" href=\"?page=2\">next</a></body></html>",
        )
        .with(
            "http://example.com/article?page=2",
            "<html><body><div id=\"b\">two</div>\
             <a rel=\"next\" href=\"?page=3\">next</a></body></html>",
        )
        .with(
            "http://example.com/article?page=3",
            "<html><body><div id=\"b\">three</div></body></html>",
        );

    let processor = Processor::builder()
        .fetch(Arc::new(fetcher))
        .repositories(vec![Repository::parse("https://configs.test/")])
        .max_pages(1)
        .build();

    let result = processor.process_url("http://example.com/article").unwrap();

    assert_eq!(result.followed_links.len(), 1);
    let body = result.body.unwrap();
    assert!(body.contains("two"));
    assert!(!body.contains("three"));
    // The unfollowed link is left on the result for the caller.
    assert_eq!(result.next_page_url.as_deref(), Some("?page=3"));
}

#[test]
fn process_content_requires_url_or_config() {
    let processor = Processor::builder()
        .fetch(Arc::new(MapFetcher::default()))
        .build();

    let err = processor
        .process_content(None, "<html><body></body></html>", None)
        .unwrap_err();

    assert!(matches!(err, ftr::Error::Usage(_)));
}

#[test]
fn process_content_with_supplied_config_skips_resolution() {
    let processor = Processor::builder()
        .fetch(Arc::new(MapFetcher::default()))
        .build();

    let config = config("title: //h1\nautodetect_on_failure: no\n");
    let result = processor
        .process_content(
            None,
            "<html><body><h1>Standalone</h1></body></html>",
            Some(&config),
        )
        .unwrap();

    assert_eq!(result.title.as_deref(), Some("Standalone"));
    assert!(result.success);
}

#[test]
fn missing_config_surfaces_config_not_found() {
    let processor = Processor::builder()
        .fetch(Arc::new(MapFetcher::default()))
        .repositories(vec![Repository::parse("https://configs.test/")])
        .build();

    let err = processor
        .process_url("http://unknown.example/article")
        .unwrap_err();

    assert!(err.is_config_not_found());
}

#[test]
fn fetch_page_uses_the_injected_fetcher() {
    let fetcher = MapFetcher::default().with("http://example.com/page", "<html></html>");
    let processor = Processor::builder().fetch(Arc::new(fetcher)).build();

    assert_eq!(
        processor.fetch_page("http://example.com/page").unwrap(),
        "<html></html>"
    );
    assert!(matches!(
        processor.fetch_page("http://example.com/missing").unwrap_err(),
        ftr::Error::Status { status: 404, .. }
    ));
}

#[test]
fn non_ok_page_fetch_is_a_status_error() {
    let fetcher = MapFetcher::default().with(
        "https://configs.test/example.com.txt",
        "title: //h1\nautodetect_on_failure: no\n",
    );
    let processor = Processor::builder()
        .fetch(Arc::new(fetcher))
        .repositories(vec![Repository::parse("https://configs.test/")])
        .build();

    let err = processor
        .process_url("http://example.com/gone")
        .unwrap_err();

    assert!(matches!(err, ftr::Error::Status { status: 404, .. }));
}
