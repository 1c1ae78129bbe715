//! Kinds of files an item can produce.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarvesterError;

/// File kind of a downloadable artifact or a metadata file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    /// Scanned or born-digital PDF.
    Pdf,

    /// Plain OCR text.
    Txt,

    /// XML document (also a metadata format).
    Xml,

    /// JSON document (also a metadata format).
    Json,

    /// Gzipped ABBYY FineReader output.
    Abbyy,
}

impl FileKind {
    /// All kinds, in declaration order.
    pub const ALL: [FileKind; 5] = [Self::Pdf, Self::Txt, Self::Xml, Self::Json, Self::Abbyy];

    /// Name as written into metadata (e.g. "PDF").
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Txt => "TXT",
            Self::Xml => "XML",
            Self::Json => "JSON",
            Self::Abbyy => "ABBYY",
        }
    }

    /// File name extension.
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Abbyy => "gz",
        }
    }

    /// Directory that collects files of this kind.
    #[must_use]
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Abbyy => "abbyy",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = HarvesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HarvesterError::Config(format!("unknown file kind '{s}'")))
    }
}
