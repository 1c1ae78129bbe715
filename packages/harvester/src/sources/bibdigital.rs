//! BibDigital source of the Real Jardín Botánico, Madrid.
//!
//! Every configured document yields exactly one item, scraped from the
//! document's record page.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::citation::{Citation, UNKNOWN_YEAR};
use crate::config::HarvesterConfig;
use crate::error::{HarvesterError, Result};
use crate::harvester::{Pull, Strategy};
use crate::html::{element_text, href, resolve_link};
use crate::http::{Fetch, HttpClient};
use crate::item::Item;
use crate::metadata::Metadata;

/// Registry identifier.
pub const SOURCE_ID: &str = "bibdigital";

/// Identifier used by older configuration files.
pub const LEGACY_SOURCE_ID: &str = "bib-digital-madrid";

/// Output folder.
pub const FOLDER_NAME: &str = "bib-digital-madrid";

/// Data source label; BHL marks mirrored BibDigital items with it.
pub const DATA_SOURCE: &str = "Real Jardín Botánico";

/// Site serving the record pages.
pub const DEFAULT_BASE_URL: &str = "https://bibdigital.rjb.csic.es";

const AUTHOR_KEY: &str = "Author";
const DATE_KEY: &str = "Date";
const TITLE_KEY: &str = "Title comp";
const FULL_PDF_LABEL: &str = "Full PDF";

#[allow(clippy::expect_used)]
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));

#[allow(clippy::expect_used)]
static KEY_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".key").expect("valid selector"));

#[allow(clippy::expect_used)]
static VALUE_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".value").expect("valid selector"));

#[allow(clippy::expect_used)]
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("valid selector"));

#[allow(clippy::expect_used)]
static ATTACHED_FILE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".attachedfiles li").expect("valid selector"));

#[allow(clippy::expect_used)]
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

#[allow(clippy::expect_used)]
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{4}").expect("valid regex"));

/// Strategy scraping BibDigital record pages.
pub struct BibDigitalStrategy<F: Fetch = HttpClient> {
    fetcher: F,
    base_url: Url,
    queue: VecDeque<String>,
}

impl<F: Fetch> BibDigitalStrategy<F> {
    /// Create a strategy without any documents to harvest.
    pub fn new(fetcher: F, base_url: Url) -> Self {
        Self {
            fetcher,
            base_url,
            queue: VecDeque::new(),
        }
    }

    /// Queue a document, given as URL or bare record id.
    pub fn add_item(&mut self, reference: impl Into<String>) {
        self.queue.push_back(reference.into());
    }

    /// Fetch and parse the record page of one document.
    pub fn fetch_metadata(&self, reference: &str) -> Result<Metadata> {
        let (id, record_url) = record_url(&self.base_url, reference)?;
        tracing::debug!(item_id = id, url = %record_url, "Fetching record page");

        let page = self.fetcher.fetch_page(&record_url)?;
        let site = site_root(&record_url);
        parse_record_page(&page, &site, id).map(|metadata| metadata.with_item_url(record_url))
    }
}

impl<F: Fetch> Strategy for BibDigitalStrategy<F> {
    fn folder_name(&self) -> &str {
        FOLDER_NAME
    }

    fn next_item(&mut self, item: &mut Item) -> Pull {
        while let Some(reference) = self.queue.pop_front() {
            tracing::info!(item = %reference, "Processing item");

            let filled = self
                .fetch_metadata(&reference)
                .and_then(|metadata| metadata.fill_item(item, DATA_SOURCE));
            match filled {
                Ok(()) => return Pull::Produced,
                Err(e) => {
                    tracing::warn!(item = %reference, error = %e, "Skipping item");
                    *item = Item::new();
                }
            }
        }

        Pull::Exhausted
    }
}

/// Registry constructor.
pub fn create(config: &HarvesterConfig) -> Result<Box<dyn Strategy>> {
    let base = config.setting_str("base-url").unwrap_or(DEFAULT_BASE_URL);
    let base_url = Url::parse(base).map_err(|e| HarvesterError::malformed_url(base, e))?;

    let mut strategy = BibDigitalStrategy::new(HttpClient::new(config.timeout)?, base_url);
    for reference in config.setting_tokens("items")? {
        strategy.add_item(reference);
    }
    Ok(Box::new(strategy))
}

/// Record id and record page URL of a document reference.
///
/// URLs contribute their last path segment as id and their site as host
/// of the record page; bare ids use `base_url`.
fn record_url(base_url: &Url, reference: &str) -> Result<(u64, Url)> {
    let reference = reference.trim();
    let (site, id_segment) = match Url::parse(reference) {
        Ok(url) => {
            let segment = url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .unwrap_or_default()
                .to_string();
            (site_root(&url), segment)
        }
        Err(_) => (site_root(base_url), reference.to_string()),
    };

    let id: u64 = id_segment
        .parse()
        .map_err(|_| HarvesterError::ItemNotFound(format!("BibDigital record '{reference}'")))?;
    let path = format!("/en/records/item/{id}-redirection");
    let url = site
        .join(&path)
        .map_err(|e| HarvesterError::malformed_url(path, e))?;
    Ok((id, url))
}

fn site_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

/// Extract the metadata of a record page.
///
/// # Errors
/// [`HarvesterError::ArtifactNotAvailable`] when the page offers no full
/// PDF.
pub fn parse_record_page(html: &str, site: &Url, id: u64) -> Result<Metadata> {
    let document = Html::parse_document(html);

    let mut citation = Citation::new();
    citation.title = document
        .select(&HEADING)
        .map(element_text)
        .find(|title| !title.is_empty())
        .or_else(|| row_value(&document, TITLE_KEY))
        .unwrap_or_default();
    if let Some(author) = row_value(&document, AUTHOR_KEY) {
        citation.add_author(&author);
    }
    citation.year = row_value(&document, DATE_KEY)
        .and_then(|date| YEAR_RE.find(&date).and_then(|m| m.as_str().parse().ok()))
        .unwrap_or(UNKNOWN_YEAR);

    let pdf_url = full_pdf_url(&document, site)?;
    Ok(Metadata::new(id, pdf_url, citation))
}

/// Value cell of the first table row whose key cell reads `key`.
fn row_value(document: &Html, key: &str) -> Option<String> {
    let row = document.select(&ROW).find(|row| {
        row.select(&KEY_CELL)
            .next()
            .is_some_and(|cell| element_text(cell) == key)
    })?;
    row.select(&VALUE_CELL).next().map(element_text)
}

fn full_pdf_url(document: &Html, site: &Url) -> Result<Url> {
    let entry = document
        .select(&ATTACHED_FILE)
        .find(|entry| element_text(*entry).contains(FULL_PDF_LABEL))
        .ok_or_else(|| HarvesterError::ArtifactNotAvailable("full PDF".to_string()))?;

    let link = pdf_link(entry)
        .ok_or_else(|| HarvesterError::ArtifactNotAvailable("full PDF link".to_string()))?;
    resolve_link(site, link)
}

fn pdf_link(entry: ElementRef<'_>) -> Option<&str> {
    href(entry).or_else(|| entry.select(&LINK).find_map(href))
}
