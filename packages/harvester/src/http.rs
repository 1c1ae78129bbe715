//! HTTP client wrapper used by all sources.
//!
//! Requests are made one at a time and are never retried; a failed request
//! fails the item it belongs to.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use url::Url;

use crate::error::{HarvesterError, Result};

/// User agent string identifying this harvester.
const USER_AGENT: &str = concat!("literature-harvester/", env!("CARGO_PKG_VERSION"));

/// Something that can retrieve an HTML page.
///
/// The scraping sources only need page text, which lets tests drive them
/// from in-memory pages.
pub trait Fetch {
    /// Fetch the body of `url` as text.
    fn fetch_page(&self, url: &Url) -> Result<String>;
}

/// Something that can store the body of a URL in a file.
pub trait Download {
    /// Download `url` into `destination`.
    ///
    /// # Returns
    /// The number of bytes written. Implementations must fail with
    /// [`HarvesterError::DownloadFailed`] instead of returning zero.
    fn download(&self, url: &Url, destination: &Path) -> Result<u64>;
}

/// Blocking HTTP client shared by a source and its item persistence.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a configured HTTP client.
    ///
    /// # Arguments
    /// * `timeout` - Timeout applied to every request
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Issue a GET request with query parameters.
    ///
    /// Unlike [`Fetch::fetch_page`] this does not treat non-success statuses
    /// as errors; callers that attach meaning to a status (such as 401)
    /// inspect it themselves.
    ///
    /// # Returns
    /// The response status and body text
    pub fn get_with_query(&self, url: &str, query: &[(&str, String)]) -> Result<(StatusCode, String)> {
        let url = Url::parse_with_params(url, query)
            .map_err(|e| HarvesterError::malformed_url(url, e))?;
        let response = self.client.get(url.as_str()).send()?;
        let status = response.status();
        let body = response.text()?;
        Ok((status, body))
    }
}

impl Fetch for HttpClient {
    fn fetch_page(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.as_str()).send()?.error_for_status()?;
        Ok(response.text()?)
    }
}

impl Download for HttpClient {
    /// Stream `url` into `destination`.
    ///
    /// The body is written to a hidden `.part` file next to the destination
    /// and only renamed into place once at least one byte arrived, so an
    /// interrupted transfer never leaves a truncated artifact behind.
    fn download(&self, url: &Url, destination: &Path) -> Result<u64> {
        let failed = |reason: String| HarvesterError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("server answered {status}")));
        }

        let partial = partial_path(destination);
        let mut file = File::create(&partial).map_err(|e| failed(e.to_string()))?;
        let transferred = response
            .copy_to(&mut file)
            .map_err(|e| e.to_string())
            .and_then(|bytes| file.sync_all().map(|()| bytes).map_err(|e| e.to_string()));
        drop(file);

        let bytes = match transferred {
            Ok(bytes) if bytes > 0 => bytes,
            Ok(_) => {
                discard_partial(&partial);
                return Err(failed("no data received".to_string()));
            }
            Err(reason) => {
                discard_partial(&partial);
                return Err(failed(reason));
            }
        };

        // On Windows, rename fails if the destination already exists
        #[cfg(target_os = "windows")]
        if destination.exists() {
            fs::remove_file(destination).map_err(|e| failed(e.to_string()))?;
        }

        fs::rename(&partial, destination).map_err(|e| {
            discard_partial(&partial);
            failed(e.to_string())
        })?;
        tracing::debug!(url = %url, bytes, path = %destination.display(), "Download done");

        Ok(bytes)
    }
}

fn discard_partial(partial: &Path) {
    if let Err(e) = fs::remove_file(partial) {
        tracing::warn!(path = %partial.display(), error = %e, "Could not remove partial download");
    }
}

/// Hidden sibling file used while a download is in flight.
fn partial_path(destination: &Path) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{file_name}.part"))
}
