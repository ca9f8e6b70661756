// src/versioning/repository.rs
//! Abstract row store for documents, versions and blob references
//!
//! The version store only talks to this trait. Implementations must make each
//! method atomic on its own; cross-call serialisation per document is the
//! store's job.

use std::path::Path;

use super::model::{Document, DocumentVersion, VersionFilter};
use crate::error::Result;

pub trait DocumentRepository: Send + Sync {
    fn get_document(&self, id: &str) -> Result<Option<Document>>;
    fn create_document(&self, document: &Document) -> Result<()>;
    /// Fails with `NotFound` when the row does not exist
    fn update_document(&self, document: &Document) -> Result<()>;
    fn delete_document(&self, id: &str) -> Result<()>;
    fn list_documents(&self) -> Result<Vec<Document>>;

    fn get_version(&self, id: &str) -> Result<Option<DocumentVersion>>;
    /// Must reject a second row with the same `(document_id, version_number)`
    fn create_version(&self, version: &DocumentVersion) -> Result<()>;
    fn delete_version(&self, id: &str) -> Result<()>;
    /// Matching versions ordered by `(document_id, version_number)`
    fn list_versions(&self, filter: &VersionFilter) -> Result<Vec<DocumentVersion>>;

    // Blob reference ledger: one count per blob path, shared across documents

    /// Increment and return the new count
    fn acquire_blob(&self, path: &Path) -> Result<u32>;
    /// Decrement (never below zero) and return the remaining count
    fn release_blob(&self, path: &Path) -> Result<u32>;
    /// Make sure the path holds at least one reference
    fn ensure_blob(&self, path: &Path) -> Result<u32>;
    fn blob_refs(&self, path: &Path) -> Result<u32>;
}
