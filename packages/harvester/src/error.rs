//! Error types for the harvester.
//!
//! One error enum covers the whole pipeline. Whether a failure stops a source
//! or only skips a single item is decided by [`HarvesterError::is_fatal`].

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// The remote source rejected our credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The requested item does not exist at the source.
    #[error("Item {0} could not be found")]
    ItemNotFound(String),

    /// A document page does not offer the artifact we are looking for.
    #[error("Artifact not available: {0}")]
    ArtifactNotAvailable(String),

    /// Downloading an artifact failed or produced no data.
    #[error("Download from {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Metadata can only be written as XML or JSON.
    #[error("Unsupported metadata format '{0}'. Expected XML or JSON")]
    UnsupportedMetadataFormat(String),

    /// A URL taken from a source could not be parsed.
    #[error("Malformed URL '{url}': {source}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// An output directory could not be created.
    #[error("Could not create directory {}: {source}", .path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File paths are derived from the item id, which was never set.
    #[error("Item ID must be set before file paths can be derived")]
    MissingItemId,

    /// The API answered with a status other than "ok".
    #[error("API request '{operation}' returned status '{status}'")]
    ApiStatus { operation: String, status: String },

    /// No strategy is registered under the configured source identifier.
    #[error("Unknown source '{0}'. Registered sources: bhl, bibdigital, zobodat")]
    UnknownSource(String),

    /// Invalid or incomplete configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration could not be parsed.
    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// XML serialization failed.
    #[error("XML serialization failed: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl HarvesterError {
    /// Whether this error ends the run of the owning source.
    ///
    /// Everything else is recoverable: it is logged and the affected item
    /// or artifact is skipped.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_) | Self::DirectoryCreation { .. }
        )
    }

    /// Build a [`HarvesterError::MalformedUrl`] from the offending input.
    pub fn malformed_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::MalformedUrl {
            url: url.into(),
            source,
        }
    }
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;
