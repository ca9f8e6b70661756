// src/storage.rs
//! On-disk layout of the storage root
//!
//! ```text
//! <root>/
//!   <document_id>/
//!     <blob_id>.enc        ciphertext
//!     <blob_id>.enc.meta   sidecar
//! ```

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::consts::{BLOB_EXTENSION, STAGING_PREFIX};
use crate::error::Result;
use crate::util::new_record_id;

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(document_id)
    }

    /// Fresh, never-before-used blob path for a document's next upload
    pub fn new_blob_path(&self, document_id: &str) -> PathBuf {
        self.document_dir(document_id)
            .join(format!("{}.{BLOB_EXTENSION}", new_record_id()))
    }

    /// Every primary blob (`*.enc`) under the root, sorted. Sidecars, staging
    /// files and anything else that lands in the tree are skipped.
    pub fn blobs(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut blobs = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_staging(e.path()));
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() || !is_blob(entry.path()) {
                continue;
            }
            blobs.push(entry.into_path());
        }
        Ok(blobs)
    }
}

fn is_blob(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == BLOB_EXTENSION)
}

/// In-flight staging files written by this crate (never part of the layout)
pub fn is_staging(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with(STAGING_PREFIX))
        .unwrap_or(false)
}
