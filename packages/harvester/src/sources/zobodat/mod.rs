//! Zobodat source (<https://www.zobodat.at>).
//!
//! The literature catalog is a tree of series, volume and article lists.
//! On the first pull the whole tree below the seed pages is crawled and
//! every article with a PDF is collected; later pulls replay the
//! collected records.
//!
//! A page is an article list when none of its entries leads to a page
//! with entries of its own.

pub mod citation;

use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::HarvesterConfig;
use crate::error::{HarvesterError, Result};
use crate::harvester::{pause, Pull, Strategy};
use crate::html::{href, resolve_link};
use crate::http::{Fetch, HttpClient};
use crate::item::Item;
use crate::metadata::Metadata;

/// Registry identifier.
pub const SOURCE_ID: &str = "zobodat";

/// Output folder and data source label.
pub const FOLDER_NAME: &str = "Zobodat";

/// Site root.
pub const DEFAULT_BASE_URL: &str = "https://www.zobodat.at";

/// Link levels followed below a seed page.
///
/// The catalog itself is three levels deep (series, volume, article).
const MAX_CRAWL_DEPTH: usize = 16;

/// Catalog page crawled when no seed is configured.
const SERIES_OVERVIEW_PATH: &str = "/publikation_series.php";

#[allow(clippy::expect_used)]
static RESULT_ENTRY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("ul.search-results-list li.result").expect("valid selector")
});

#[allow(clippy::expect_used)]
static ENTRY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".content a.red").expect("valid selector"));

#[allow(clippy::expect_used)]
static PUBLICATION_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.publication-link").expect("valid selector"));

#[allow(clippy::expect_used)]
static CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.content").expect("valid selector"));

#[allow(clippy::expect_used)]
static DIV: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").expect("valid selector"));

#[allow(clippy::expect_used)]
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid selector"));

#[allow(clippy::expect_used)]
static ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?id=([0-9]+)").expect("valid regex"));

/// One entry of a catalog or article list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Page the entry title links to.
    pub link: Option<Url>,

    /// Direct PDF link; only articles have one.
    pub pdf_url: Option<Url>,

    /// Article page holding the full citation.
    pub citation_url: Option<Url>,
}

/// Parse the entries listed on a catalog page.
///
/// Links that cannot be resolved are dropped from their entry.
#[must_use]
pub fn parse_catalog_page(html: &str, site: &Url) -> Vec<CatalogEntry> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT_ENTRY)
        .map(|entry| CatalogEntry {
            link: first_link(entry, &ENTRY_LINK, site),
            pdf_url: first_link(entry, &PUBLICATION_LINK, site),
            citation_url: citation_link(entry, site),
        })
        .collect()
}

fn first_link(entry: ElementRef<'_>, selector: &Selector, site: &Url) -> Option<Url> {
    let target = entry.select(selector).next().and_then(href)?;
    resolve(site, target)
}

/// Link in the last `div` of the entry's content block.
fn citation_link(entry: ElementRef<'_>, site: &Url) -> Option<Url> {
    let content = entry.select(&CONTENT).next()?;
    let last_div = content.select(&DIV).last()?;
    let target = last_div.select(&ANCHOR).next().and_then(href)?;
    resolve(site, target)
}

fn resolve(site: &Url, target: &str) -> Option<Url> {
    match resolve_link(site, target) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring link");
            None
        }
    }
}

/// Zobodat article id from a URL such as `publikation_articles.php?id=165038`.
#[must_use]
pub fn item_id_from_url(url: &Url) -> Option<u64> {
    ITEM_ID_RE
        .captures(url.as_str())
        .and_then(|captures| captures[1].parse().ok())
}

/// Strategy crawling the Zobodat literature catalog.
pub struct ZobodatStrategy<F: Fetch = HttpClient> {
    fetcher: F,
    site: Url,
    seeds: Vec<Url>,
    request_delay: Duration,
    collected: Option<VecDeque<Metadata>>,
}

impl<F: Fetch> ZobodatStrategy<F> {
    /// Create a strategy.
    ///
    /// Without seeds the series overview of `site` is crawled.
    pub fn new(fetcher: F, site: Url, seeds: Vec<Url>, request_delay: Duration) -> Self {
        Self {
            fetcher,
            site,
            seeds,
            request_delay,
            collected: None,
        }
    }

    /// Crawl every seed and return the collected article records.
    pub fn collect_metadata(&self) -> Vec<Metadata> {
        let seeds = if self.seeds.is_empty() {
            match self.site.join(SERIES_OVERVIEW_PATH) {
                Ok(overview) => vec![overview],
                Err(e) => {
                    tracing::warn!(error = %e, "Could not build series overview URL");
                    Vec::new()
                }
            }
        } else {
            self.seeds.clone()
        };

        let mut visited = HashSet::new();
        let mut collected = Vec::new();
        for seed in &seeds {
            self.crawl(seed, 0, &mut visited, &mut collected);
        }
        collected
    }

    /// Crawl `url` and everything below it.
    ///
    /// Every page is fetched at most once per crawl. Pages seen before and
    /// pages deeper than [`MAX_CRAWL_DEPTH`] are not fetched.
    ///
    /// # Returns
    /// The number of entries listed on `url`; unreachable, repeated and
    /// too deep pages count as zero.
    fn crawl(
        &self,
        url: &Url,
        depth: usize,
        visited: &mut HashSet<Url>,
        collected: &mut Vec<Metadata>,
    ) -> usize {
        if !visited.insert(url.clone()) {
            tracing::debug!(url = %url, "Already crawled");
            return 0;
        }
        if depth > MAX_CRAWL_DEPTH {
            tracing::warn!(url = %url, depth, "Catalog nested too deeply, not following");
            return 0;
        }

        pause(self.request_delay);
        tracing::info!(url = %url, "Processing URL");

        let page = match self.fetcher.fetch_page(url) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Could not fetch page");
                return 0;
            }
        };

        let entries = parse_catalog_page(&page, &self.site);

        let mut referenced = 0;
        for link in entries.iter().filter_map(|entry| entry.link.as_ref()) {
            referenced += self.crawl(link, depth + 1, visited, collected);
        }

        if referenced == 0 && !entries.is_empty() {
            tracing::debug!(url = %url, "Is article list");
            collected.extend(self.extract_articles(&entries));
        }

        entries.len()
    }

    fn extract_articles(&self, entries: &[CatalogEntry]) -> Vec<Metadata> {
        tracing::info!(count = entries.len(), "Found entries on article list");

        entries
            .iter()
            .filter_map(|entry| {
                let pdf_url = entry.pdf_url.clone()?;
                match self.article_metadata(entry, pdf_url) {
                    Ok(metadata) => Some(metadata),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping article");
                        None
                    }
                }
            })
            .collect()
    }

    fn article_metadata(&self, entry: &CatalogEntry, pdf_url: Url) -> Result<Metadata> {
        let citation_url = entry
            .citation_url
            .clone()
            .ok_or_else(|| HarvesterError::ArtifactNotAvailable(format!("citation for {pdf_url}")))?;
        let id = item_id_from_url(&citation_url)
            .ok_or_else(|| HarvesterError::ItemNotFound(format!("id in {citation_url}")))?;

        pause(self.request_delay);
        let citation = match self.fetcher.fetch_page(&citation_url) {
            Ok(page) => citation::parse_citation_page(&page).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(url = %citation_url, error = %e, "Could not fetch citation page");
                Default::default()
            }
        };

        Ok(Metadata::new(id, pdf_url, citation).with_item_url(citation_url))
    }
}

impl<F: Fetch> Strategy for ZobodatStrategy<F> {
    fn folder_name(&self) -> &str {
        FOLDER_NAME
    }

    fn next_item(&mut self, item: &mut Item) -> Pull {
        if self.collected.is_none() {
            tracing::info!("Start crawling metadata");
            let collected = self.collect_metadata();
            tracing::info!(count = collected.len(), "Crawling of metadata complete");
            self.collected = Some(collected.into());
        }

        let Some(queue) = self.collected.as_mut() else {
            return Pull::Exhausted;
        };
        while let Some(metadata) = queue.pop_front() {
            match metadata.fill_item(item, FOLDER_NAME) {
                Ok(()) => return Pull::Produced,
                Err(e) => {
                    tracing::warn!(item_id = metadata.id, error = %e, "Skipping item");
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
    let site = Url::parse(base).map_err(|e| HarvesterError::malformed_url(base, e))?;

    let seeds = config
        .setting_tokens("items")?
        .iter()
        .map(|seed| resolve_link(&site, seed))
        .collect::<Result<Vec<_>>>()?;

    Ok(Box::new(ZobodatStrategy::new(
        HttpClient::new(config.timeout)?,
        site,
        seeds,
        config.request_delay,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const SITE: &str = "https://www.zobodat.at";

    /// Serves pages from memory and records every request.
    #[derive(Default)]
    struct StaticPages {
        pages: HashMap<String, String>,
        requested: RefCell<Vec<String>>,
    }

    impl StaticPages {
        fn with(mut self, path: &str, html: String) -> Self {
            self.pages.insert(format!("{SITE}{path}"), html);
            self
        }
    }

    impl Fetch for StaticPages {
        fn fetch_page(&self, url: &Url) -> Result<String> {
            self.requested.borrow_mut().push(url.to_string());
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| HarvesterError::ItemNotFound(url.to_string()))
        }
    }

    fn catalog(links: &[&str]) -> String {
        let entries: String = links
            .iter()
            .map(|link| {
                format!(r#"<li class="result"><div class="content"><a class="red" href="{link}">Entry</a></div></li>"#)
            })
            .collect();
        format!(r#"<html><body><ul class="search-results-list">{entries}</ul></body></html>"#)
    }

    fn article_list(ids: &[u64]) -> String {
        let entries: String = ids
            .iter()
            .map(|id| {
                format!(
                    r#"<li class="result">
  <a class="publication-link" href="/pdf/article_{id}.pdf">PDF</a>
  <div class="content">
    <a class="red" href="publikation_articles.php?id={id}">Article {id}</a>
    <div>Author</div>
    <div><a href="publikation_articles.php?id={id}">Citation</a></div>
  </div>
</li>"#
                )
            })
            .collect();
        format!(r#"<html><body><ul class="search-results-list">{entries}</ul></body></html>"#)
    }

    fn citation_page(text: &str) -> String {
        format!(r#"<html><body><div id="publikation_articles"><div class="text">{text}</div></div></body></html>"#)
    }

    fn strategy(pages: StaticPages, seeds: &[&str]) -> ZobodatStrategy<StaticPages> {
        let site = Url::parse(SITE).unwrap();
        let seeds = seeds
            .iter()
            .map(|seed| resolve_link(&site, seed).unwrap())
            .collect();
        ZobodatStrategy::new(pages, site, seeds, Duration::ZERO)
    }

    #[test]
    fn test_parse_catalog_page() {
        let site = Url::parse(SITE).unwrap();
        let entries = parse_catalog_page(&article_list(&[165038]), &site);

        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0],
            CatalogEntry {
                link: Some(Url::parse("https://www.zobodat.at/publikation_articles.php?id=165038").unwrap()),
                pdf_url: Some(Url::parse("https://www.zobodat.at/pdf/article_165038.pdf").unwrap()),
                citation_url: Some(Url::parse("https://www.zobodat.at/publikation_articles.php?id=165038").unwrap()),
            }
        );
    }

    #[test]
    fn test_item_id_from_url() {
        let url = Url::parse("https://www.zobodat.at/publikation_articles.php?id=165038").unwrap();
        assert_eq!(item_id_from_url(&url), Some(165038));

        let url = Url::parse("https://www.zobodat.at/pdf/a.pdf").unwrap();
        assert_eq!(item_id_from_url(&url), None);
    }

    #[test]
    fn test_page_with_empty_children_is_article_list() {
        let pages = StaticPages::default()
            .with("/publikation_volumes.php?id=1", article_list(&[11, 12, 13]))
            .with("/publikation_articles.php?id=11", citation_page("A, B. (1901): T – J – 1: 1 - 2."))
            .with("/publikation_articles.php?id=12", citation_page("C, D. (1902): U – J – 1: 3 - 4."))
            .with("/publikation_articles.php?id=13", citation_page("E, F. (1903): V – J – 1: 5 - 6."));

        let metadata = strategy(pages, &["/publikation_volumes.php?id=1"]).collect_metadata();

        let ids: Vec<u64> = metadata.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![11, 12, 13]);
        assert_eq!(metadata[1].citation.year, 1902);
        assert_eq!(metadata[2].citation.first_page, "5");
    }

    #[test]
    fn test_catalog_page_is_not_mined() {
        let pages = StaticPages::default()
            .with("/publikation_series.php", catalog(&["/publikation_volumes.php?id=1", "/publikation_volumes.php?id=2"]))
            .with("/publikation_volumes.php?id=1", article_list(&[11]))
            .with("/publikation_volumes.php?id=2", article_list(&[21, 22]))
            .with("/publikation_articles.php?id=11", citation_page("A (1901): T – J – 1: 1 - 2."))
            .with("/publikation_articles.php?id=21", citation_page("B (1902): T – J – 2: 1 - 2."))
            .with("/publikation_articles.php?id=22", citation_page("C (1903): T – J – 2: 3 - 4."));

        let metadata = strategy(pages, &[]).collect_metadata();

        let ids: Vec<u64> = metadata.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![11, 21, 22]);
    }

    #[test]
    fn test_self_linking_page_is_crawled_once() {
        let pages = StaticPages::default().with(
            "/publikation_series.php?id=1",
            catalog(&["/publikation_series.php?id=1"]),
        );

        let strategy = strategy(pages, &["/publikation_series.php?id=1"]);
        assert!(strategy.collect_metadata().is_empty());
        assert_eq!(strategy.fetcher.requested.borrow().len(), 1);
    }

    #[test]
    fn test_link_back_to_parent_keeps_article_list() {
        let volume = article_list(&[11]).replace(
            "</ul>",
            r#"<li class="result"><div class="content"><a class="red" href="/publikation_series.php?id=1">Series</a></div></li></ul>"#,
        );
        let pages = StaticPages::default()
            .with("/publikation_series.php?id=1", catalog(&["/publikation_volumes.php?id=1"]))
            .with("/publikation_volumes.php?id=1", volume)
            .with("/publikation_articles.php?id=11", citation_page("A (1901): T – J – 1: 1 - 2."));

        let strategy = strategy(pages, &["/publikation_series.php?id=1"]);
        let ids: Vec<u64> = strategy.collect_metadata().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![11]);

        let requested = strategy.fetcher.requested.borrow();
        let series_fetches = requested
            .iter()
            .filter(|url| url.ends_with("/publikation_series.php?id=1"))
            .count();
        assert_eq!(series_fetches, 1);
    }

    #[test]
    fn test_deep_chain_stops_at_depth_limit() {
        let mut pages = StaticPages::default();
        for level in 0..40 {
            let next = format!("/publikation_series.php?id={}", level + 1);
            pages = pages.with(&format!("/publikation_series.php?id={level}"), catalog(&[next.as_str()]));
        }

        let strategy = strategy(pages, &["/publikation_series.php?id=0"]);
        assert!(strategy.collect_metadata().is_empty());
        assert_eq!(strategy.fetcher.requested.borrow().len(), MAX_CRAWL_DEPTH + 1);
    }

    #[test]
    fn test_unreachable_seed_yields_nothing() {
        let mut strategy = strategy(StaticPages::default(), &["/publikation_series.php?id=404"]);

        let mut item = Item::new();
        assert!(matches!(strategy.next_item(&mut item), Pull::Exhausted));
        assert!(matches!(strategy.next_item(&mut item), Pull::Exhausted));
        assert_eq!(strategy.fetcher.requested.borrow().len(), 1);
    }

    #[test]
    fn test_next_item_replays_collected_records() {
        let pages = StaticPages::default()
            .with("/publikation_volumes.php?id=1", article_list(&[11, 12]))
            .with("/publikation_articles.php?id=11", citation_page("A (1901): T – J – 1: 1 - 2."));

        let mut strategy = strategy(pages, &["/publikation_volumes.php?id=1"]);

        let mut first = Item::new();
        assert!(matches!(strategy.next_item(&mut first), Pull::Produced));
        assert_eq!(first.id(), Some(11));
        assert_eq!(first.data_source(), FOLDER_NAME);
        assert_eq!(
            first.metadata()["Item"]["citation"]["publicationYear"],
            1901
        );

        let requests_after_crawl = strategy.fetcher.requested.borrow().len();

        // The citation page of 12 is missing; the record is kept without citation
        let mut second = Item::new();
        assert!(matches!(strategy.next_item(&mut second), Pull::Produced));
        assert_eq!(second.id(), Some(12));
        assert_eq!(second.metadata()["Item"]["citation"]["publicationYear"], -1);

        let mut third = Item::new();
        assert!(matches!(strategy.next_item(&mut third), Pull::Exhausted));
        assert_eq!(strategy.fetcher.requested.borrow().len(), requests_after_crawl);
    }
}
