//! Source-independent driver of a harvesting run.
//!
//! A run creates the source's working directory, then repeatedly pauses
//! for the configured delay and asks the strategy for the next item.
//! Every produced item is written to disk before the next one is
//! requested.

use std::fs;
use std::thread;
use std::time::Duration;

use crate::config::HarvesterConfig;
use crate::error::{HarvesterError, Result};
use crate::http::{Download, HttpClient};
use crate::item::Item;
use crate::sources::SourceRegistry;

/// Outcome of asking a strategy for the next item.
#[derive(Debug)]
pub enum Pull {
    /// The item was filled and should be persisted.
    Produced,

    /// No more items; later pulls keep returning this.
    Exhausted,

    /// The strategy cannot continue (e.g. the API key was rejected).
    Fatal(HarvesterError),
}

/// A per-source implementation of the pull contract.
pub trait Strategy {
    /// Folder below the output root this source writes into.
    fn folder_name(&self) -> &str;

    /// Fill `item` with the next work of this source.
    ///
    /// Items that fail individually are skipped internally, so
    /// [`Pull::Exhausted`] and [`Pull::Fatal`] are the only ways a run ends.
    fn next_item(&mut self, item: &mut Item) -> Pull;
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The strategy ran out of items.
    Exhausted,

    /// The strategy reported a fatal condition.
    Aborted(String),
}

/// Counters of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub source: String,
    pub items: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub metadata_files: usize,
    pub completion: Completion,
}

impl RunReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            items: 0,
            downloaded: 0,
            skipped: 0,
            failed: 0,
            metadata_files: 0,
            completion: Completion::Exhausted,
        }
    }

    /// Whether the run stopped because of a fatal condition.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self.completion, Completion::Aborted(_))
    }
}

/// Run `strategy` until it is exhausted or fails fatally.
///
/// # Arguments
/// * `strategy` - Source to pull items from
/// * `config` - Output root, delay, overwrite flag and metadata format
/// * `downloader` - Transfers artifact bytes
///
/// # Errors
/// [`HarvesterError::DirectoryCreation`] when an output directory cannot
/// be created. Per-item failures are logged and counted instead.
pub fn run(
    strategy: &mut dyn Strategy,
    config: &HarvesterConfig,
    downloader: &dyn Download,
) -> Result<RunReport> {
    let working_directory = config.working_directory(strategy.folder_name());
    fs::create_dir_all(&working_directory).map_err(|source| HarvesterError::DirectoryCreation {
        path: working_directory.clone(),
        source,
    })?;

    tracing::info!(
        source = %config.name,
        path = %working_directory.display(),
        "Starting harvester"
    );

    let mut report = RunReport::new(&config.name);
    loop {
        pause(config.request_delay);

        let mut item = Item::new();
        match strategy.next_item(&mut item) {
            Pull::Produced => {}
            Pull::Exhausted => break,
            Pull::Fatal(e) => {
                tracing::error!(source = %config.name, error = %e, "Harvester aborted");
                report.completion = Completion::Aborted(e.to_string());
                break;
            }
        }

        report.items += 1;
        tracing::info!(item_id = ?item.id(), "Writing item");

        match item.write_text_files(&working_directory, config.overwrite, downloader) {
            Ok(written) => {
                report.downloaded += written.downloaded.len();
                report.skipped += written.skipped.len();
                report.failed += written.failed;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::error!(item_id = ?item.id(), error = %e, "Could not write text files"),
        }

        match item.write_metadata_file(&working_directory, config.metadata_format) {
            Ok(_) => report.metadata_files += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::error!(item_id = ?item.id(), error = %e, "Could not write metadata"),
        }
    }

    tracing::info!(
        source = %config.name,
        items = report.items,
        downloaded = report.downloaded,
        "Harvester finished"
    );
    Ok(report)
}

/// Build the strategy for `config` and run it with a live HTTP client.
///
/// This is the single blocking entry point per configured source.
pub fn harvest(registry: &SourceRegistry, config: &HarvesterConfig) -> Result<RunReport> {
    let client = HttpClient::new(config.timeout)?;
    let mut strategy = registry.create(config)?;
    run(strategy.as_mut(), config, &client)
}

/// Sleep for `delay`; used before every request-producing step.
pub(crate) fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
