//! Literature Harvester - Collect bibliographic metadata and source documents.
//!
//! This crate harvests literature from the Biodiversity Heritage Library
//! (BHL), the BibDigital library of the Real Jardín Botánico in Madrid and
//! Zobodat, and stores every work as downloaded files plus one metadata
//! file in a per-source output tree.
//!
//! # Example
//!
//! ```
//! use literature_harvester::{FileKind, Item};
//!
//! let mut item = Item::new();
//! item.set_id(22314);
//! item.add_artifact("https://www.biodiversitylibrary.org/itempdf/22314", FileKind::Pdf)
//!     .unwrap();
//! assert!(item.render_metadata(FileKind::Json).unwrap().contains("22314"));
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Configuration file and per-source configuration
//! - [`error`]: Error types and Result alias
//! - [`http`]: HTTP client and the fetch/download seams
//! - [`listfile`]: Line-oriented id lists
//! - [`html`]: HTML helpers for the scraping sources
//! - [`citation`]: Bibliographic reference fields
//! - [`metadata`]: Intermediate record of the scraping sources
//! - [`item`]: Item record and its persistence
//! - [`harvester`]: Strategy contract and the run loop
//! - [`sources`]: Source registry and the BHL, BibDigital and Zobodat strategies
//! - [`cli`]: Command-line interface

pub mod citation;
pub mod cli;
pub mod config;
pub mod error;
pub mod harvester;
pub mod html;
pub mod http;
pub mod item;
pub mod listfile;
pub mod metadata;
pub mod sources;

// Re-export main functions
pub use harvester::{harvest, run, Pull, RunReport, Strategy};

// Re-export commonly used items
pub use citation::Citation;
pub use config::{load_config_file, HarvesterConfig};
pub use error::{HarvesterError, Result};
pub use item::{FileKind, Item};
pub use metadata::Metadata;
pub use sources::SourceRegistry;
