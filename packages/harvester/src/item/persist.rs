//! Writing items to the output tree.
//!
//! Layout below a source's working directory:
//!
//! ```text
//! text/<kind>/<id>[-N].<ext>
//! metadata/<kind>/<id>[-N].<ext>
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{FileKind, Item};
use crate::error::{HarvesterError, Result};
use crate::http::Download;

/// Folder holding downloaded artifacts.
pub const TEXT_FOLDER: &str = "text";

/// Folder holding metadata files.
pub const METADATA_FOLDER: &str = "metadata";

/// Outcome of [`Item::write_text_files`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Files written by this call.
    pub downloaded: Vec<PathBuf>,

    /// Existing files left untouched because overwriting is disabled.
    pub skipped: Vec<PathBuf>,

    /// Artifacts whose download failed.
    pub failed: usize,
}

impl Item {
    /// Allocate the next output path for `kind` below `base`.
    ///
    /// # Errors
    /// [`HarvesterError::MissingItemId`] when no id was set.
    pub fn file_path(&mut self, base: &Path, kind: FileKind) -> Result<PathBuf> {
        let id = self.id.ok_or(HarvesterError::MissingItemId)?;
        let file_name = self.file_names.allocate(&id.to_string(), kind.suffix());
        Ok(base.join(kind.dir_name()).join(file_name))
    }

    /// Download every artifact into `<root>/text/`.
    ///
    /// A failed download is logged and counted; the remaining artifacts
    /// are still attempted. With `overwrite` disabled an existing
    /// destination is skipped, but its name stays allocated.
    ///
    /// # Arguments
    /// * `root` - Working directory of the source
    /// * `overwrite` - Whether existing files are downloaded again
    /// * `downloader` - Transfers the artifact bytes
    ///
    /// # Errors
    /// Only conditions that affect every artifact: a missing item id or an
    /// output directory that cannot be created.
    pub fn write_text_files(
        &mut self,
        root: &Path,
        overwrite: bool,
        downloader: &dyn Download,
    ) -> Result<WriteReport> {
        let base = root.join(TEXT_FOLDER);
        let mut report = WriteReport::default();

        for artifact in self.artifacts.clone() {
            let destination = self.file_path(&base, artifact.kind)?;

            if !overwrite && destination.exists() {
                tracing::info!(path = %destination.display(), "File exists already, skipping");
                report.skipped.push(destination);
                continue;
            }

            if let Some(parent) = destination.parent() {
                create_directory(parent)?;
            }

            tracing::info!(url = %artifact.url, path = %destination.display(), "Downloading file");
            match downloader.download(&artifact.url, &destination) {
                Ok(_) => report.downloaded.push(destination),
                Err(e) => {
                    tracing::warn!(item_id = ?self.id, error = %e, "Download failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Write the metadata document into `<root>/metadata/`.
    ///
    /// The file is written to a temporary sibling first and renamed into
    /// place, so a crash never leaves a truncated metadata file.
    ///
    /// # Returns
    /// Path of the written file
    pub fn write_metadata_file(&mut self, root: &Path, format: FileKind) -> Result<PathBuf> {
        let content = self.render_metadata(format)?;
        let output_file = self.file_path(&root.join(METADATA_FOLDER), format)?;

        let output_dir = output_file.parent().unwrap_or(root).to_path_buf();
        create_directory(&output_dir)?;

        let file_name = output_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_file = output_dir.join(format!(".{file_name}.tmp"));

        tracing::info!(path = %output_file.display(), "Writing metadata");
        {
            let mut file = File::create(&temp_file)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        // On Windows, rename fails if the destination already exists
        #[cfg(target_os = "windows")]
        if output_file.exists() {
            fs::remove_file(&output_file)?;
        }

        fs::rename(&temp_file, &output_file)?;

        Ok(output_file)
    }
}

fn create_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| HarvesterError::DirectoryCreation {
        path: path.to_path_buf(),
        source,
    })
}
