// src/versioning/memory.rs
//! In-process repository backed by ordered maps
//!
//! Versions are keyed by `(document_id, version_number)` so a document's
//! history is a contiguous, ordered range of the map.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::model::{Document, DocumentVersion, VersionFilter};
use super::repository::DocumentRepository;
use crate::error::{CoreError, Result};

#[derive(Default)]
struct Tables {
    documents: HashMap<String, Document>,
    versions: BTreeMap<(String, u32), DocumentVersion>,
    version_keys: HashMap<String, (String, u32)>,
    blob_refs: HashMap<PathBuf, u32>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentRepository for InMemoryRepository {
    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.tables().documents.get(id).cloned())
    }

    fn create_document(&self, document: &Document) -> Result<()> {
        let mut t = self.tables();
        if t.documents.contains_key(&document.id) {
            return Err(CoreError::VersionInvariant(format!(
                "document {} already exists",
                document.id
            )));
        }
        t.documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn update_document(&self, document: &Document) -> Result<()> {
        match self.tables().documents.get_mut(&document.id) {
            Some(row) => {
                *row = document.clone();
                Ok(())
            }
            None => Err(CoreError::NotFound(format!("document {}", document.id))),
        }
    }

    fn delete_document(&self, id: &str) -> Result<()> {
        self.tables().documents.remove(id);
        Ok(())
    }

    fn list_documents(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self.tables().documents.values().cloned().collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(docs)
    }

    fn get_version(&self, id: &str) -> Result<Option<DocumentVersion>> {
        let t = self.tables();
        Ok(t.version_keys
            .get(id)
            .and_then(|key| t.versions.get(key))
            .cloned())
    }

    fn create_version(&self, version: &DocumentVersion) -> Result<()> {
        let mut t = self.tables();
        let key = (version.document_id.clone(), version.version_number);
        if t.versions.contains_key(&key) || t.version_keys.contains_key(&version.id) {
            return Err(CoreError::VersionInvariant(format!(
                "version {} of document {} already exists",
                version.version_number, version.document_id
            )));
        }
        t.version_keys.insert(version.id.clone(), key.clone());
        t.versions.insert(key, version.clone());
        Ok(())
    }

    fn delete_version(&self, id: &str) -> Result<()> {
        let mut t = self.tables();
        if let Some(key) = t.version_keys.remove(id) {
            t.versions.remove(&key);
        }
        Ok(())
    }

    fn list_versions(&self, filter: &VersionFilter) -> Result<Vec<DocumentVersion>> {
        let t = self.tables();
        let matching = match filter.document_id.as_deref() {
            Some(id) => t
                .versions
                .range((id.to_string(), 0)..=(id.to_string(), u32::MAX))
                .map(|(_, v)| v)
                .filter(|v| filter.matches(v))
                .cloned()
                .collect(),
            None => t
                .versions
                .values()
                .filter(|v| filter.matches(v))
                .cloned()
                .collect(),
        };
        Ok(matching)
    }

    fn acquire_blob(&self, path: &Path) -> Result<u32> {
        let mut t = self.tables();
        let refs = t.blob_refs.entry(path.to_path_buf()).or_insert(0);
        *refs += 1;
        Ok(*refs)
    }

    fn release_blob(&self, path: &Path) -> Result<u32> {
        let mut t = self.tables();
        let remaining = match t.blob_refs.get_mut(path) {
            Some(refs) => {
                *refs = refs.saturating_sub(1);
                *refs
            }
            None => 0,
        };
        if remaining == 0 {
            t.blob_refs.remove(path);
        }
        Ok(remaining)
    }

    fn ensure_blob(&self, path: &Path) -> Result<u32> {
        let mut t = self.tables();
        let refs = t.blob_refs.entry(path.to_path_buf()).or_insert(0);
        if *refs == 0 {
            *refs = 1;
        }
        Ok(*refs)
    }

    fn blob_refs(&self, path: &Path) -> Result<u32> {
        Ok(self.tables().blob_refs.get(path).copied().unwrap_or(0))
    }
}
