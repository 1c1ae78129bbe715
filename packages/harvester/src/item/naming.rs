//! Deduplicating allocation of output file names.

use std::collections::HashSet;

/// Hands out file names that are unique within one item and one run.
///
/// The first request for `<stem>.<ext>` gets exactly that name; later
/// requests get `<stem>-1.<ext>`, `<stem>-2.<ext>`, ... in request order.
/// Files already on disk are never consulted.
#[derive(Debug, Clone, Default)]
pub struct FileNameAllocator {
    allocated: HashSet<String>,
}

impl FileNameAllocator {
    /// Create an empty allocation table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next free name for `stem` and `extension`.
    pub fn allocate(&mut self, stem: &str, extension: &str) -> String {
        let mut file_name = format!("{stem}.{extension}");
        let mut counter = 1;
        while self.allocated.contains(&file_name) {
            file_name = format!("{stem}-{counter}.{extension}");
            counter += 1;
        }

        self.allocated.insert(file_name.clone());
        file_name
    }
}
