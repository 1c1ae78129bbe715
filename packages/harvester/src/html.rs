//! Small helpers for the HTML scraping sources.

use scraper::ElementRef;
use url::Url;

use crate::error::{HarvesterError, Result};

/// Visible text of an element with runs of whitespace collapsed.
///
/// # Examples
/// ```
/// use literature_harvester::html::element_text;
/// use scraper::{Html, Selector};
///
/// let html = Html::parse_fragment("<p>  Flora \n <b>iberica</b> </p>");
/// let p = html.select(&Selector::parse("p").unwrap()).next().unwrap();
/// assert_eq!(element_text(p), "Flora iberica");
/// ```
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Collapse every run of whitespace into one space and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a link found on a page of `base`.
///
/// Absolute links are returned as they are. Relative links are taken
/// relative to the site root of `base`, with a leading `/` added when
/// missing.
///
/// # Errors
/// [`HarvesterError::MalformedUrl`] for empty or unparseable links.
pub fn resolve_link(base: &Url, href: &str) -> Result<Url> {
    let href = href.trim();
    if href.is_empty() {
        return Err(HarvesterError::malformed_url(href, url::ParseError::EmptyHost));
    }

    match Url::parse(href) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let rooted = if href.starts_with('/') {
                href.to_string()
            } else {
                format!("/{href}")
            };
            base.join(&rooted)
                .map_err(|e| HarvesterError::malformed_url(href, e))
        }
        Err(e) => Err(HarvesterError::malformed_url(href, e)),
    }
}

/// Value of the `href` attribute of an element, if it has a non-empty one.
#[must_use]
pub fn href(element: ElementRef<'_>) -> Option<&str> {
    element
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|href| !href.is_empty())
}
