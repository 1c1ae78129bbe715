//! Citation extraction from Zobodat article pages.
//!
//! A citation fragment reads like
//!
//! ```text
//! Krüss, H. (1884): Eine neue Form des Bunsen-Photometers – Abhandlungen
//! aus dem Gebiete der Naturwissenschaften Hamburg – 8: 1 - 8.
//! ```
//!
//! Linked parts (authors, series, volume) are read first. The plain text
//! then fills whatever is still missing. When a pattern matches several
//! times, the last match wins.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::citation::Citation;
use crate::html::{collapse_whitespace, element_text};

const AUTHOR_LINK_MARKER: &str = "personen.php";
const JOURNAL_LINK_MARKER: &str = "publikation_series.php";
const VOLUME_LINK_MARKER: &str = "publikation_volumes.php";

#[allow(clippy::expect_used)]
static CITATION_FRAGMENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#publikation_articles .text").expect("valid selector"));

#[allow(clippy::expect_used)]
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid selector"));

/// Authors before a parenthesized year at the start of the text.
#[allow(clippy::expect_used)]
static AUTHOR_AND_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?) ?\(([0-9]{4})\)").expect("valid regex"));

/// Text between an en dash and a colon, with no further en dash in between.
#[allow(clippy::expect_used)]
static ISSUE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"– ([^–]*?): ").expect("valid regex"));

/// Page range closing the citation; roman numerals allowed.
#[allow(clippy::expect_used)]
static PAGES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r": ([0-9A-Za-z]+?) - ([0-9A-Za-z]+?)\.$").expect("valid regex")
});

#[allow(clippy::expect_used)]
static TITLE_AND_JOURNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([0-9]{4}\): (.*?) – (.*) – ").expect("valid regex"));

/// An author list segment made only of initials, such as `H.` or `J.-P.`.
#[allow(clippy::expect_used)]
static INITIALS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\p{Lu}\p{Ll}?\.[\s-]*)+$").expect("valid regex")
});

/// Parse the citation fragment of an article page.
///
/// # Returns
/// `None` when the page has no citation fragment.
#[must_use]
pub fn parse_citation_page(html: &str) -> Option<Citation> {
    let document = Html::parse_document(html);
    document.select(&CITATION_FRAGMENT).next().map(parse_citation)
}

/// Extract a citation from a citation fragment.
#[must_use]
pub fn parse_citation(fragment: ElementRef<'_>) -> Citation {
    let mut citation = Citation::new();
    read_links(fragment, &mut citation);
    backfill_from_text(&element_text(fragment), &mut citation);
    citation
}

/// Extract a citation from plain citation text.
///
/// # Examples
/// ```
/// use literature_harvester::sources::zobodat::citation::parse_citation_text;
///
/// let citation = parse_citation_text("Brehm, A. (1869): Vogelleben – Gefiederte Welt – 2: 12 - 19.");
/// assert_eq!(citation.year, 1869);
/// assert_eq!(citation.issue_number, "2");
/// ```
#[must_use]
pub fn parse_citation_text(text: &str) -> Citation {
    let mut citation = Citation::new();
    backfill_from_text(&collapse_whitespace(text), &mut citation);
    citation
}

/// Structured pass over the links of the fragment.
fn read_links(fragment: ElementRef<'_>, citation: &mut Citation) {
    for link in fragment.select(&LINK) {
        let target = link.value().attr("href").unwrap_or_default();
        let text = element_text(link);

        if target.contains(AUTHOR_LINK_MARKER) {
            citation.add_author(&text);
        } else if target.contains(JOURNAL_LINK_MARKER) {
            if citation.journal_name.is_empty() {
                citation.journal_name = text;
            }
        } else if target.contains(VOLUME_LINK_MARKER) && citation.issue_number.is_empty() {
            citation.issue_number = text;
        }
    }
}

/// Fill fields that are still unset from the plain citation text.
fn backfill_from_text(text: &str, citation: &mut Citation) {
    let text = text.trim();

    if citation.authors().is_empty() || !citation.has_year() {
        if let Some(captures) = AUTHOR_AND_YEAR_RE.captures_iter(text).last() {
            if citation.authors().is_empty() {
                citation.add_authors(split_authors(&captures[1]).iter().map(String::as_str));
            }
            if !citation.has_year() {
                if let Ok(year) = captures[2].parse() {
                    citation.year = year;
                }
            }
        }
    }

    if citation.issue_number.is_empty() {
        if let Some(captures) = ISSUE_NUMBER_RE.captures_iter(text).last() {
            citation.issue_number = captures[1].trim().to_string();
        }
    }

    if !citation.has_pages() {
        if let Some(captures) = PAGES_RE.captures_iter(text).last() {
            citation.set_pages(&captures[1], &captures[2]);
        }
    }

    if citation.title.is_empty() || citation.journal_name.is_empty() {
        if let Some(captures) = TITLE_AND_JOURNAL_RE.captures_iter(text).last() {
            if citation.title.is_empty() {
                citation.title = captures[1].trim().to_string();
            }
            if citation.journal_name.is_empty() {
                citation.journal_name = captures[2].trim().to_string();
            }
        }
    }
}

/// Split an author list on commas, keeping initials with their surname.
fn split_authors(authors: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for segment in authors.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match names.last_mut() {
            Some(previous) if INITIALS_RE.is_match(segment) => {
                previous.push_str(", ");
                previous.push_str(segment);
            }
            _ => names.push(segment.to_string()),
        }
    }
    names
}
