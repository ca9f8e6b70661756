// src/versioning/model.rs
//! Row types shared by the version store and every repository backend

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::new_record_id;

/// A stored document. `path`/`size` always mirror the current version's blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
    pub current_version_number: u32,
    pub is_encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable entry of a document's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub id: String,
    pub document_id: String,
    pub version_number: u32,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub changes: Option<String>,
    pub file_size: u64,
    pub path: PathBuf,
}

/// Input for [`VersionStore::create_document`](super::VersionStore::create_document)
///
/// The id is chosen up front so the first blob can live in the document's
/// own directory before the row exists.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub name: String,
    pub blob: BlobRef,
    pub is_encrypted: bool,
}

impl NewDocument {
    pub fn new(name: impl Into<String>, blob: BlobRef) -> Self {
        Self::with_id(new_record_id(), name, blob)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, blob: BlobRef) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            blob,
            is_encrypted: true,
        }
    }
}

/// New content for a version: where the blob lives and how big it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub path: PathBuf,
    pub size: u64,
}

impl BlobRef {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Who/why metadata attached to a new version
#[derive(Debug, Clone, Default)]
pub struct VersionMeta {
    pub created_by: String,
    pub changes: Option<String>,
    /// Overrides the size reported by the blob (or the document when no blob)
    pub file_size: Option<u64>,
}

impl VersionMeta {
    pub fn new(created_by: impl Into<String>) -> Self {
        Self {
            created_by: created_by.into(),
            ..Self::default()
        }
    }

    pub fn with_changes(mut self, changes: impl Into<String>) -> Self {
        self.changes = Some(changes.into());
        self
    }

    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = Some(file_size);
        self
    }
}

/// `listByFilter` criteria for versions; empty filter matches everything
#[derive(Debug, Clone, Default)]
pub struct VersionFilter {
    pub document_id: Option<String>,
    pub path: Option<PathBuf>,
}

impl VersionFilter {
    pub fn for_document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            path: None,
        }
    }

    pub fn referencing(path: impl Into<PathBuf>) -> Self {
        Self {
            document_id: None,
            path: Some(path.into()),
        }
    }

    pub fn matches(&self, version: &DocumentVersion) -> bool {
        self.document_id
            .as_deref()
            .map_or(true, |id| version.document_id == id)
            && self.path.as_ref().map_or(true, |p| &version.path == p)
    }
}
