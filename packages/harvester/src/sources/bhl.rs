//! Biodiversity Heritage Library (BHL) source.
//!
//! Items are fetched one by one from the BHL API v3. Item ids come from the
//! configuration directly or are resolved from title and collection ids
//! when the strategy is built.
//!
//! API documentation: <https://www.biodiversitylibrary.org/docs/api3.html>

use std::collections::{BTreeMap, VecDeque};

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::bibdigital::{self, BibDigitalStrategy};
use crate::config::HarvesterConfig;
use crate::error::{HarvesterError, Result};
use crate::harvester::{Pull, Strategy};
use crate::http::HttpClient;
use crate::item::{FileKind, Item};
use crate::metadata::ITEM_METADATA_KEY;

/// Registry identifier.
pub const SOURCE_ID: &str = "bhl";

/// Output folder and data source label.
pub const FOLDER_NAME: &str = "BHL";

/// Base URL of the BHL API.
pub const DEFAULT_API_URL: &str = "https://www.biodiversitylibrary.org/api3";

const STATUS_OK: &str = "ok";
const STATUS_UNAUTHORIZED: &str = "unauthorized";

const OP_GET_ITEM_METADATA: &str = "GetItemMetadata";
const OP_GET_TITLE_METADATA: &str = "GetTitleMetadata";
const OP_GET_COLLECTIONS: &str = "GetCollections";
const OP_PUBLICATION_SEARCH: &str = "PublicationSearchAdvanced";

const ITEM_ID: &str = "ItemID";
const ITEM_URL: &str = "ItemUrl";
const ITEM_PDF_URL: &str = "ItemPDFUrl";
const ITEM_TEXT_URL: &str = "ItemTextUrl";
const ITEMS: &str = "Items";
const SOURCE: &str = "Source";
const EXTERNAL_URL: &str = "ExternalUrl";

/// Response envelope shared by all API operations.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<String>,
    #[serde(rename = "Result", default)]
    result: Value,
}

/// A BHL collection as listed by `GetCollections`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    #[serde(rename = "CollectionID")]
    pub id: u64,
    #[serde(rename = "CollectionName", default)]
    pub name: String,
    #[serde(rename = "CollectionDescription", default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "ItemID")]
    item_id: Option<u64>,
    #[serde(rename = "Title", default)]
    title: String,
}

/// Thin client for the BHL API.
#[derive(Debug, Clone)]
pub struct BhlClient {
    http: HttpClient,
    api_url: String,
    api_key: String,
}

impl BhlClient {
    #[must_use]
    pub fn new(http: HttpClient, api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Client for the API key and `api-url` setting of a BHL entry.
    pub fn from_config(config: &HarvesterConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| HarvesterError::Config(format!("{} requires an api-key", config.name)))?;
        let api_url = config.setting_str("api-url").unwrap_or(DEFAULT_API_URL);
        Ok(Self::new(HttpClient::new(config.timeout)?, api_url, api_key))
    }

    /// Call an API operation and return its `Result` value.
    fn call(&self, operation: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut query = vec![
            ("apikey", self.api_key.clone()),
            ("format", "json".to_string()),
            ("op", operation.to_string()),
        ];
        query.extend(params.iter().cloned());

        tracing::debug!(operation, "Calling BHL API");
        let (status, body) = self.http.get_with_query(&self.api_url, &query)?;
        read_envelope(operation, status, &body)
    }

    /// Full metadata of one item, including pages and parts but no OCR.
    ///
    /// # Errors
    /// [`HarvesterError::ItemNotFound`] when BHL returns no result, and
    /// [`HarvesterError::Authentication`] when the API key is rejected.
    pub fn get_item_metadata(&self, item_id: u64) -> Result<Value> {
        let result = self.call(
            OP_GET_ITEM_METADATA,
            &[
                ("id", item_id.to_string()),
                ("pages", "t".to_string()),
                ("ocr", "f".to_string()),
                ("parts", "t".to_string()),
            ],
        )?;
        first_result(result, item_id)
    }

    /// Ids of all items belonging to a title (a series or monograph).
    ///
    /// A title without items yields an empty list.
    pub fn get_items_from_title(&self, title_id: u64) -> Result<Vec<u64>> {
        tracing::info!(title_id, "Resolving items of title");
        let result = self.call(
            OP_GET_TITLE_METADATA,
            &[("id", title_id.to_string()), ("items", "t".to_string())],
        )?;
        let items = item_ids_of_title(result, title_id)?;
        tracing::info!(title_id, count = items.len(), "Found items for title");
        Ok(items)
    }

    /// Every collection known to BHL, keyed by collection id.
    pub fn get_all_collections(&self) -> Result<BTreeMap<u64, Collection>> {
        let result = self.call(OP_GET_COLLECTIONS, &[])?;
        let collections: Vec<Collection> = serde_json::from_value(result)?;
        Ok(collections.into_iter().map(|c| (c.id, c)).collect())
    }

    /// Items of a collection, optionally restricted to a language.
    ///
    /// Result pages are requested until one comes back empty.
    ///
    /// # Returns
    /// Item titles keyed by item id
    pub fn get_items_for_collection(
        &self,
        collection_id: u64,
        language: Option<&str>,
    ) -> Result<BTreeMap<u64, String>> {
        let mut items = BTreeMap::new();

        for page in 1.. {
            let mut params = vec![
                ("collection", collection_id.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(language) = language {
                params.push(("language", language.to_string()));
            }

            let hits: Vec<SearchHit> = match self.call(OP_PUBLICATION_SEARCH, &params)? {
                Value::Null => Vec::new(),
                result => serde_json::from_value(result)?,
            };
            if hits.is_empty() {
                break;
            }

            for hit in hits {
                if let Some(item_id) = hit.item_id {
                    items.insert(item_id, hit.title);
                }
            }
        }

        tracing::info!(collection_id, count = items.len(), "Found items for collection");
        Ok(items)
    }
}

/// Check the response envelope and return its result.
fn read_envelope(operation: &str, status: StatusCode, body: &str) -> Result<Value> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(HarvesterError::Authentication(
            "the BHL API key was rejected".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(HarvesterError::ApiStatus {
            operation: operation.to_string(),
            status: status.to_string(),
        });
    }

    let envelope: Envelope = serde_json::from_str(body)?;
    if envelope.status.eq_ignore_ascii_case(STATUS_UNAUTHORIZED) {
        return Err(HarvesterError::Authentication(
            envelope
                .error_message
                .unwrap_or_else(|| "the BHL API key was rejected".to_string()),
        ));
    }
    if !envelope.status.eq_ignore_ascii_case(STATUS_OK) {
        return Err(HarvesterError::ApiStatus {
            operation: operation.to_string(),
            status: envelope.status,
        });
    }

    Ok(envelope.result)
}

/// First entry of a result array.
fn first_result(result: Value, id: u64) -> Result<Value> {
    match result {
        Value::Array(entries) => entries
            .into_iter()
            .next()
            .ok_or_else(|| HarvesterError::ItemNotFound(id.to_string())),
        _ => Err(HarvesterError::ItemNotFound(id.to_string())),
    }
}

fn item_ids_of_title(result: Value, title_id: u64) -> Result<Vec<u64>> {
    let title = first_result(result, title_id)?;
    let ids = title
        .get(ITEMS)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(ITEM_ID).and_then(Value::as_u64))
                .collect()
        })
        .unwrap_or_default();
    Ok(ids)
}

/// Strategy pulling items from the BHL API.
pub struct BhlStrategy {
    client: BhlClient,
    http: HttpClient,
    bibdigital_base_url: Url,
    queue: VecDeque<u64>,
    started: bool,
}

impl BhlStrategy {
    /// Build the strategy and resolve configured titles and collections.
    ///
    /// # Errors
    /// Fails when the API key is missing or rejected, or when an id in the
    /// configuration is not numeric. Titles and collections that cannot
    /// be resolved are logged and skipped.
    pub fn from_config(config: &HarvesterConfig) -> Result<Self> {
        let client = BhlClient::from_config(config)?;
        let bibdigital_base = config
            .setting_str("bibdigital-base-url")
            .unwrap_or(bibdigital::DEFAULT_BASE_URL);
        let bibdigital_base_url = Url::parse(bibdigital_base)
            .map_err(|e| HarvesterError::malformed_url(bibdigital_base, e))?;

        let http = client.http.clone();

        let mut queue: VecDeque<u64> = parse_ids(&config.setting_tokens("items")?)?.into();

        for title_id in parse_ids(&config.setting_tokens("titles")?)? {
            match client.get_items_from_title(title_id) {
                Ok(items) => queue.extend(items),
                Err(e) if e.is_fatal() => return Err(e),
                Err(HarvesterError::ItemNotFound(_)) => {
                    tracing::error!(title_id, "The given title could not be found");
                }
                Err(e) => tracing::error!(title_id, error = %e, "Could not resolve title"),
            }
        }

        let language = config.setting_str("language");
        for collection_id in parse_ids(&config.setting_tokens("collections")?)? {
            match client.get_items_for_collection(collection_id, language) {
                Ok(items) => queue.extend(items.into_keys()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::error!(collection_id, error = %e, "Could not resolve collection"),
            }
        }

        Ok(Self {
            client,
            http,
            bibdigital_base_url,
            queue,
            started: false,
        })
    }

    /// Item ids still waiting to be processed.
    #[must_use]
    pub fn pending_items(&self) -> Vec<u64> {
        self.queue.iter().copied().collect()
    }

    fn fill_item(&self, item: &mut Item, requested_id: u64, metadata: Value) {
        if let Some(external) = self.fetch_external(&metadata) {
            item.set_id(requested_id);
            item.absorb(external);
            return;
        }

        let item_id = metadata
            .get(ITEM_ID)
            .and_then(Value::as_u64)
            .unwrap_or(requested_id);
        tracing::debug!(item_id, "Adding BHL metadata");

        item.set_id(item_id);
        item.set_data_source(FOLDER_NAME);
        if let Some(url) = string_field(&metadata, ITEM_URL) {
            if let Err(e) = item.set_url(url) {
                tracing::warn!(item_id, error = %e, "Ignoring item URL");
            }
        }
        for (key, kind) in [(ITEM_PDF_URL, FileKind::Pdf), (ITEM_TEXT_URL, FileKind::Txt)] {
            if let Some(url) = string_field(&metadata, key) {
                if let Err(e) = item.add_artifact(url, kind) {
                    tracing::warn!(item_id, error = %e, "Ignoring artifact");
                }
            }
        }
        item.add_metadata(ITEM_METADATA_KEY, metadata);
    }

    /// Harvest the item from its original repository if BHL only mirrors it.
    ///
    /// Returns `None` when the item is not external or the delegation
    /// failed, so the caller falls back to the BHL record.
    fn fetch_external(&self, metadata: &Value) -> Option<Item> {
        let source = string_field(metadata, SOURCE)?;
        if !source.contains(bibdigital::DATA_SOURCE) {
            return None;
        }

        tracing::info!(source, "Item is hosted externally");
        let Some(external_url) = string_field(metadata, EXTERNAL_URL) else {
            tracing::warn!("External item has no URL, using BHL metadata");
            return None;
        };

        let mut harvester =
            BibDigitalStrategy::new(self.http.clone(), self.bibdigital_base_url.clone());
        harvester.add_item(external_url);

        let mut external = Item::new();
        match harvester.next_item(&mut external) {
            Pull::Produced => Some(external),
            _ => {
                tracing::warn!(url = external_url, "Could not harvest external item, using BHL metadata");
                None
            }
        }
    }
}

impl Strategy for BhlStrategy {
    fn folder_name(&self) -> &str {
        FOLDER_NAME
    }

    fn next_item(&mut self, item: &mut Item) -> Pull {
        if !self.started {
            tracing::info!(items = self.queue.len(), "Starting BHL download");
            self.started = true;
        }

        while let Some(item_id) = self.queue.pop_front() {
            tracing::info!(item_id, "Processing item");

            match self.client.get_item_metadata(item_id) {
                Ok(metadata) => {
                    self.fill_item(item, item_id, metadata);
                    return Pull::Produced;
                }
                Err(e) if e.is_fatal() => return Pull::Fatal(e),
                Err(HarvesterError::ItemNotFound(_)) => {
                    tracing::error!(item_id, "The requested item does not exist");
                }
                Err(e) => tracing::error!(item_id, error = %e, "Could not fetch item metadata"),
            }
        }

        tracing::info!("Processing items complete");
        Pull::Exhausted
    }
}

/// Registry constructor.
pub fn create(config: &HarvesterConfig) -> Result<Box<dyn Strategy>> {
    Ok(Box::new(BhlStrategy::from_config(config)?))
}

fn parse_ids(tokens: &[String]) -> Result<Vec<u64>> {
    tokens
        .iter()
        .map(|token| {
            token
                .parse()
                .map_err(|_| HarvesterError::Config(format!("'{token}' is not a valid BHL id")))
        })
        .collect()
}

fn string_field<'a>(metadata: &'a Value, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
