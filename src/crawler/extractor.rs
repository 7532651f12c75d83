//! Link extraction stage
//!
//! Pulls outgoing links from fetched pages and offers them to the frontier.

use crate::crawler::fetcher::FetchResult;
use crate::crawler::frontier::Frontier;
use crate::crawler::gauges::StageKind;
use crate::crawler::stage::{consume, StageReport};
use crate::storage::Gateway;
use scraper::{Html, Selector};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Finds links on a page and feeds the admissible ones back into the frontier
pub struct LinkExtractor {
    frontier: Arc<Frontier>,
}

impl LinkExtractor {
    pub fn new(frontier: Arc<Frontier>) -> Self {
        Self { frontier }
    }

    /// Extracts links from a fetch result and offers them to the frontier
    ///
    /// # Link Extraction Rules
    ///
    /// - Every element inside `<body>` carrying an `href` attribute is a link
    /// - Relative references resolve against the final (post-redirect) URL
    /// - Links pass the domain filter and the visited check via
    ///   [`Frontier::offer_url`]
    ///
    /// Returns the URLs that were actually enqueued. Error statuses, missing
    /// bodies and malformed HTML yield fewer (or zero) links, never an error.
    pub fn extract(&self, result: &FetchResult) -> Vec<String> {
        if !result.is_processable() {
            return Vec::new();
        }
        let Some(body) = result.body.as_deref() else {
            return Vec::new();
        };

        let origin = result.origin();
        let filter = self.frontier.filter();

        collect_hrefs(body)
            .into_iter()
            .filter_map(|href| filter.resolve(&href, origin.as_ref()))
            .filter_map(|url| {
                let text = url.to_string();
                self.frontier
                    .offer_url(url, origin.as_ref())
                    .then_some(text)
            })
            .collect()
    }
}

/// Collects raw `href` values of elements inside `<body>`
fn collect_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("body [href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

/// Runs the link extraction stage until stopped
///
/// On stop the queue is drained, then the visited-URL ledger is written to
/// the gateway exactly once.
pub async fn run_link_stage(
    extractor: LinkExtractor,
    rx: mpsc::UnboundedReceiver<Arc<FetchResult>>,
    stop: watch::Receiver<bool>,
    gateway: Arc<dyn Gateway>,
) -> StageReport {
    let gauges = Arc::clone(extractor.frontier.gauges());

    let processed = consume(StageKind::LinkExtractor, rx, stop, gauges, |result| {
        let links = extractor.extract(result);
        tracing::debug!("{} new links from {}", links.len(), result.final_url);
    })
    .await;

    let visited = extractor.frontier.visited_urls();
    let flushed = match gateway.insert_visited_batch(&visited) {
        Ok(written) => {
            tracing::info!("Saved {} visited URLs", written);
            written
        }
        Err(e) => {
            tracing::error!("Failed to save visited URLs: {}", e);
            0
        }
    };

    StageReport {
        stage: StageKind::LinkExtractor,
        processed,
        flushed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::storage::{MemoryGateway, Sink};
    use crate::url::DomainFilter;

    fn setup() -> (Arc<Frontier>, LinkExtractor) {
        let filter = Arc::new(DomainFilter::new(&FilterConfig::default()));
        let frontier = Arc::new(Frontier::new(filter));
        let extractor = LinkExtractor::new(Arc::clone(&frontier));
        (frontier, extractor)
    }

    fn page(url: &str, status: u16, body: &str) -> FetchResult {
        FetchResult {
            url: url.to_string(),
            final_url: url.to_string(),
            status: Some(status),
            headers: vec![],
            body: Some(body.to_string()),
            error: None,
            attempts: 1,
        }
    }

    #[test]
    fn test_extracts_relative_link() {
        let (frontier, extractor) = setup();
        let html = r#"<html><body><a href="/b.html">b</a><p>adicionar ao carrinho</p></body></html>"#;

        let links = extractor.extract(&page("http://a.pt/", 200, html));

        assert_eq!(links, vec!["http://a.pt/b.html".to_string()]);
        assert_eq!(frontier.size(), 1);
    }

    #[test]
    fn test_filters_and_deduplicates() {
        let (_, extractor) = setup();
        let html = r#"
            <body>
                <a href="http://shop.example.pt/cart.html">in family</a>
                <a href="http://shop.example.pt/cart.html#reviews">same page</a>
                <a href="http://example.com/cart.html">foreign</a>
                <a href="mailto:info@a.pt">mail</a>
                <a href="javascript:void(0)">js</a>
                <a href="/logo.png">image</a>
                <area href="/map.html">
                <a>no href</a>
            </body>
        "#;

        let links = extractor.extract(&page("http://a.pt/", 200, html));

        assert_eq!(
            links,
            vec![
                "http://shop.example.pt/cart.html".to_string(),
                "http://a.pt/map.html".to_string(),
            ]
        );
    }

    #[test]
    fn test_head_links_ignored() {
        let (_, extractor) = setup();
        let html = r#"<html><head><link rel="canonical" href="/canonical.html"></head><body></body></html>"#;

        assert!(extractor.extract(&page("http://a.pt/", 200, html)).is_empty());
    }

    #[test]
    fn test_relative_links_resolve_against_final_url() {
        let (_, extractor) = setup();
        let mut result = page("http://a.pt/", 200, r#"<body><a href="next.html">n</a></body>"#);
        result.final_url = "http://a.pt/catalog/index.html".to_string();

        assert_eq!(
            extractor.extract(&result),
            vec!["http://a.pt/catalog/next.html".to_string()]
        );
    }

    #[test]
    fn test_error_status_yields_nothing() {
        let (frontier, extractor) = setup();
        let html = r#"<body><a href="/b.html">b</a></body>"#;

        assert!(extractor.extract(&page("http://a.pt/", 404, html)).is_empty());
        assert_eq!(frontier.size(), 0);
    }

    #[test]
    fn test_malformed_html_is_tolerated() {
        let (_, extractor) = setup();
        let html = r#"<body><div><a href="/ok.html">ok<a href="/also.html"</div"#;

        let links = extractor.extract(&page("http://a.pt/", 200, html));
        assert!(links.contains(&"http://a.pt/ok.html".to_string()));
    }

    #[tokio::test]
    async fn test_stage_flushes_visited_ledger_once() {
        let (frontier, extractor) = setup();
        let gateway = Arc::new(MemoryGateway::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        frontier.seed(&["http://a.pt/"]);
        frontier.take().await.unwrap();
        frontier.complete();

        frontier.gauges().queued(StageKind::LinkExtractor);
        tx.send(Arc::new(page(
            "http://a.pt/",
            200,
            r#"<body><a href="/b.html">b</a></body>"#,
        )))
        .unwrap();

        let stage = tokio::spawn(run_link_stage(
            extractor,
            rx,
            stop_rx,
            gateway.clone() as Arc<dyn Gateway>,
        ));
        stop_tx.send_replace(true);
        let report = stage.await.unwrap();

        assert_eq!(report.stage, StageKind::LinkExtractor);
        assert_eq!(report.processed, 1);
        assert_eq!(report.flushed, 1);
        assert_eq!(gateway.visited(), vec!["http://a.pt/".to_string()]);
        assert_eq!(gateway.count(Sink::Visited).unwrap(), 1);
        assert_eq!(frontier.size(), 1);
    }
}
