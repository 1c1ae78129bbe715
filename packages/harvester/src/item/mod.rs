//! Normalized literature record and its persistence.
//!
//! An [`Item`] is created empty by the driver, filled by exactly one
//! strategy call, written to disk and then dropped. All output file names
//! of an item come from its own [`FileNameAllocator`].

mod kind;
mod naming;
mod persist;
mod xml;

use serde_json::{Map, Value};
use url::Url;

use crate::error::{HarvesterError, Result};

pub use kind::FileKind;
pub use naming::FileNameAllocator;
pub use persist::{WriteReport, METADATA_FOLDER, TEXT_FOLDER};
pub use xml::json_to_xml;

/// Root element of XML metadata files.
pub const METADATA_ROOT: &str = "Metadata";

const ITEM_ID_KEY: &str = "itemID";
const URL_KEY: &str = "Url";
const SOURCE_KEY: &str = "Source";
const TEXT_URLS_KEY: &str = "TextUrls";
const TEXT_URL_KEY: &str = "TextUrl";
const FILETYPE_KEY: &str = "Filetype";

/// A downloadable file belonging to an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub url: Url,
    pub kind: FileKind,
}

/// One literature work plus its artifacts and metadata.
#[derive(Debug, Clone, Default)]
pub struct Item {
    id: Option<u64>,
    data_source: String,
    url: Option<Url>,
    artifacts: Vec<Artifact>,
    metadata: Map<String, Value>,
    file_names: FileNameAllocator,
}

impl Item {
    /// Create an empty item.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Set the id all output file names are derived from.
    pub fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    #[must_use]
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    pub fn set_data_source(&mut self, data_source: impl Into<String>) {
        self.data_source = data_source.into();
    }

    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Set the canonical URL of the work.
    ///
    /// # Errors
    /// [`HarvesterError::MalformedUrl`] when `url` does not parse; the
    /// previous URL is kept.
    pub fn set_url(&mut self, url: &str) -> Result<()> {
        let parsed = Url::parse(url.trim()).map_err(|e| HarvesterError::malformed_url(url, e))?;
        self.url = Some(parsed);
        Ok(())
    }

    /// Artifacts in the order they were added.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Queue a file for download.
    ///
    /// # Returns
    /// `false` when the URL is already queued.
    ///
    /// # Errors
    /// [`HarvesterError::MalformedUrl`] when `url` does not parse.
    pub fn add_artifact(&mut self, url: &str, kind: FileKind) -> Result<bool> {
        let parsed = Url::parse(url.trim()).map_err(|e| HarvesterError::malformed_url(url, e))?;
        Ok(self.push_artifact(Artifact { url: parsed, kind }))
    }

    fn push_artifact(&mut self, artifact: Artifact) -> bool {
        if self.artifacts.iter().any(|a| a.url == artifact.url) {
            return false;
        }
        self.artifacts.push(artifact);
        true
    }

    /// Free-form metadata collected by the strategy.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Append `value` to the list stored under `key`.
    ///
    /// A missing list is created. A non-list value under `key` becomes the
    /// first element of the new list.
    pub fn push_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let entry = self
            .metadata
            .entry(key.into())
            .or_insert_with(|| Value::Array(Vec::new()));

        if !entry.is_array() {
            let previous = entry.take();
            *entry = Value::Array(vec![previous]);
        }
        if let Value::Array(list) = entry {
            list.push(value.into());
        }
    }

    /// Take over everything another item collected.
    ///
    /// URL, data source, artifacts and metadata of `other` are merged into
    /// this item. This item keeps its id when it has one.
    pub fn absorb(&mut self, other: Item) {
        if self.id.is_none() {
            self.id = other.id;
        }
        if other.url.is_some() {
            self.url = other.url;
        }
        if !other.data_source.is_empty() {
            self.data_source = other.data_source;
        }
        for artifact in other.artifacts {
            self.push_artifact(artifact);
        }
        self.metadata.extend(other.metadata);
    }

    /// Metadata as written to disk, including the item's own fields.
    #[must_use]
    pub fn metadata_document(&self) -> Value {
        let mut document = self.metadata.clone();

        document.insert(
            ITEM_ID_KEY.to_string(),
            self.id.map_or(Value::Null, Value::from),
        );
        document.insert(
            URL_KEY.to_string(),
            self.url.as_ref().map_or(Value::Null, |u| Value::from(u.as_str())),
        );
        document.insert(SOURCE_KEY.to_string(), Value::from(self.data_source.as_str()));

        let text_urls: Vec<Value> = self
            .artifacts
            .iter()
            .map(|artifact| {
                let mut entry = Map::new();
                entry.insert(URL_KEY.to_string(), Value::from(artifact.url.as_str()));
                entry.insert(FILETYPE_KEY.to_string(), Value::from(artifact.kind.as_str()));
                Value::Object(entry)
            })
            .collect();
        let mut text_url_list = Map::new();
        text_url_list.insert(TEXT_URL_KEY.to_string(), Value::Array(text_urls));
        document.insert(TEXT_URLS_KEY.to_string(), Value::Object(text_url_list));

        Value::Object(document)
    }

    /// Serialize [`Item::metadata_document`] in `format`.
    ///
    /// # Errors
    /// [`HarvesterError::UnsupportedMetadataFormat`] for anything but XML
    /// and JSON.
    pub fn render_metadata(&self, format: FileKind) -> Result<String> {
        match format {
            FileKind::Xml => json_to_xml(METADATA_ROOT, &self.metadata_document()),
            FileKind::Json => Ok(serde_json::to_string_pretty(&self.metadata_document())?),
            other => Err(HarvesterError::UnsupportedMetadataFormat(other.to_string())),
        }
    }
}
