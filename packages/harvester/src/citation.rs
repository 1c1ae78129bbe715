//! Bibliographic reference of a literature work.

use serde::Serialize;

/// Year value of a citation whose publication year is unknown.
pub const UNKNOWN_YEAR: i32 = -1;

/// Bibliographic fields of one work.
///
/// Pages are strings because they may be roman numerals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    authors: Vec<String>,
    pub title: String,
    #[serde(rename = "publicationYear")]
    pub year: i32,
    pub first_page: String,
    pub last_page: String,
    pub journal_name: String,
    pub issue_number: String,
}

impl Default for Citation {
    fn default() -> Self {
        Self {
            authors: Vec::new(),
            title: String::new(),
            year: UNKNOWN_YEAR,
            first_page: String::new(),
            last_page: String::new(),
            journal_name: String::new(),
            issue_number: String::new(),
        }
    }
}

impl Citation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Authors in insertion order, without duplicates.
    #[must_use]
    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    /// Add an author.
    ///
    /// The name is trimmed first; empty names and exact duplicates are
    /// ignored.
    ///
    /// # Returns
    /// Whether the author was added.
    pub fn add_author(&mut self, author: &str) -> bool {
        let author = author.trim();
        if author.is_empty() || self.authors.iter().any(|a| a == author) {
            return false;
        }
        self.authors.push(author.to_string());
        true
    }

    pub fn add_authors<'a>(&mut self, authors: impl IntoIterator<Item = &'a str>) {
        for author in authors {
            self.add_author(author);
        }
    }

    pub fn set_pages(&mut self, first_page: impl Into<String>, last_page: impl Into<String>) {
        self.first_page = first_page.into();
        self.last_page = last_page.into();
    }

    #[must_use]
    pub fn has_year(&self) -> bool {
        self.year != UNKNOWN_YEAR
    }

    #[must_use]
    pub fn has_pages(&self) -> bool {
        !self.first_page.is_empty() || !self.last_page.is_empty()
    }
}
