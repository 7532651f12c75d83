//! Structural classification stage
//!
//! Each page is reduced to the tag skeleton of its main region. Pages whose
//! skeleton was already seen in this crawl are dropped; the rest are checked
//! against the shopping-cart keywords and emitted as [`PageRecord`]s.

use crate::config::ClassifierConfig;
use crate::crawler::fetcher::FetchResult;
use crate::crawler::gauges::{PipelineGauges, StageKind};
use crate::crawler::stage::{consume, StageReport};
use crate::storage::{Gateway, PageRecord};
use scraper::{ElementRef, Html, Node, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};

/// Elements whose text is never rendered
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Fingerprints seen during this crawl
#[derive(Debug, Default)]
pub struct FingerprintCache {
    seen: Mutex<HashSet<String>>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `fingerprint`, returning true if it was not present
    pub fn insert_if_new(&self, fingerprint: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Structural deduplicator and keyword heuristic
pub struct Classifier {
    cache: Arc<FingerprintCache>,
    keywords: HashSet<String>,
    store_raw_html: bool,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig, cache: Arc<FingerprintCache>) -> Self {
        Self {
            cache,
            keywords: config
                .keywords
                .iter()
                .map(|k| normalize_text(k))
                .collect(),
            store_raw_html: config.store_raw_html,
        }
    }

    /// Classifies a fetched page
    ///
    /// Returns a record only the first time a structure is seen; error
    /// statuses and blank bodies yield `None`.
    pub fn classify(&self, result: &FetchResult) -> Option<PageRecord> {
        if !result.is_processable() {
            return None;
        }
        let body = result.body.as_deref().filter(|b| !b.trim().is_empty())?;

        let document = Html::parse_document(body);
        let structure = skeleton(main_region(&document)?);
        let fingerprint = fingerprint(&structure);

        if !self.cache.insert_if_new(&fingerprint) {
            tracing::debug!("Known structure {} at {}", &fingerprint[..12], result.url);
            return None;
        }

        Some(PageRecord {
            is_positive: self.matches_keywords(&document),
            fingerprint,
            structure,
            url: result.url.clone(),
            raw_html: self.store_raw_html.then(|| body.to_string()),
        })
    }

    /// True if any visible text node of the document is exactly a keyword
    fn matches_keywords(&self, document: &Html) -> bool {
        visible_text(document).any(|text| self.keywords.contains(&text))
    }
}

/// The `<main>` element if the page has one, else `<body>`
fn main_region(document: &Html) -> Option<ElementRef<'_>> {
    ["main", "body"].iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        document.select(&selector).next()
    })
}

/// Renders the element tree under `root` as nested `<tag>…</tag>` pairs
///
/// Text, comments and attributes are ignored, so two pages built from the
/// same template produce the same skeleton.
pub fn skeleton(root: ElementRef<'_>) -> String {
    enum Step<'a> {
        Open(ElementRef<'a>),
        Close(&'a str),
    }

    let mut out = String::new();
    let mut stack = vec![Step::Open(root)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(element) => {
                let name = element.value().name();
                out.push('<');
                out.push_str(name);
                out.push('>');
                stack.push(Step::Close(name));

                let children: Vec<_> = element.children().filter_map(ElementRef::wrap).collect();
                stack.extend(children.into_iter().rev().map(Step::Open));
            }
            Step::Close(name) => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }

    out
}

/// SHA-256 hex digest of a skeleton
pub fn fingerprint(structure: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(structure.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalized visible text nodes of a document
fn visible_text(document: &Html) -> impl Iterator<Item = String> + '_ {
    document
        .root_element()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map_or(false, |el| HIDDEN_ELEMENTS.contains(&el.name()))
            })
        })
        .map(|(_, text)| normalize_text(text))
        .filter(|text| !text.is_empty())
}

/// Trims, collapses runs of whitespace and lowercases
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Runs the classification stage until stopped
///
/// Records are buffered and written every `flush_batch_size` records; the
/// remainder is written once when the stage drains.
pub async fn run_classify_stage(
    classifier: Classifier,
    flush_batch_size: usize,
    rx: mpsc::UnboundedReceiver<Arc<FetchResult>>,
    stop: watch::Receiver<bool>,
    gauges: Arc<PipelineGauges>,
    gateway: Arc<dyn Gateway>,
) -> StageReport {
    let batch_size = flush_batch_size.max(1);
    let mut buffer: Vec<PageRecord> = Vec::with_capacity(batch_size);
    let mut flushed = 0;

    let processed = consume(StageKind::Classifier, rx, stop, gauges, |result| {
        if let Some(record) = classifier.classify(result) {
            tracing::debug!(
                "New structure at {} (positive: {})",
                record.url,
                record.is_positive
            );
            buffer.push(record);
            if buffer.len() >= batch_size {
                flushed += flush_pages(gateway.as_ref(), &mut buffer);
            }
        }
    })
    .await;

    flushed += flush_pages(gateway.as_ref(), &mut buffer);
    tracing::info!("Saved {} new page structures", flushed);

    StageReport {
        stage: StageKind::Classifier,
        processed,
        flushed,
    }
}

fn flush_pages(gateway: &dyn Gateway, buffer: &mut Vec<PageRecord>) -> usize {
    if buffer.is_empty() {
        return 0;
    }

    let written = match gateway.insert_pages(buffer) {
        Ok(written) => written,
        Err(e) => {
            tracing::warn!(
                "Batch of {} pages failed ({}), saving one by one",
                buffer.len(),
                e
            );
            flush_pages_individually(gateway, buffer)
        }
    };
    buffer.clear();
    written
}

/// Writes each record on its own; only the records that fail are dropped
fn flush_pages_individually(gateway: &dyn Gateway, records: &[PageRecord]) -> usize {
    records
        .iter()
        .filter(|record| match gateway.insert_page(record) {
            Ok(written) => written,
            Err(e) => {
                tracing::error!("Failed to save page {}: {}", record.url, e);
                false
            }
        })
        .count()
}
