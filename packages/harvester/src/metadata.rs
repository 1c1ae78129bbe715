//! Intermediate record produced by the scraping sources.

use serde::Serialize;
use url::Url;

use crate::citation::Citation;
use crate::error::Result;
use crate::item::{FileKind, Item};

/// Metadata key under which a source stores its own record of an item.
pub const ITEM_METADATA_KEY: &str = "Item";

/// What a scraping source knows about one work before it becomes an [`Item`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    #[serde(skip)]
    pub id: u64,

    #[serde(skip)]
    pub pdf_url: Url,

    /// Page describing the work, if the source has one.
    #[serde(rename = "url")]
    pub item_url: Option<Url>,

    pub citation: Citation,
}

impl Metadata {
    #[must_use]
    pub fn new(id: u64, pdf_url: Url, citation: Citation) -> Self {
        Self {
            id,
            pdf_url,
            item_url: None,
            citation,
        }
    }

    #[must_use]
    pub fn with_item_url(mut self, item_url: Url) -> Self {
        self.item_url = Some(item_url);
        self
    }

    /// Copy this record into `item`.
    ///
    /// Sets id, data source and URL, queues the PDF and stores the record
    /// itself under [`ITEM_METADATA_KEY`].
    pub fn fill_item(&self, item: &mut Item, data_source: &str) -> Result<()> {
        item.set_id(self.id);
        item.set_data_source(data_source);
        if let Some(item_url) = &self.item_url {
            item.set_url(item_url.as_str())?;
        }
        item.add_artifact(self.pdf_url.as_str(), FileKind::Pdf)?;
        item.add_metadata(ITEM_METADATA_KEY, serde_json::to_value(self)?);
        Ok(())
    }
}
