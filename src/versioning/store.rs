// src/versioning/store.rs
//! Version store: document history on top of a [`DocumentRepository`]
//!
//! Every mutating operation takes the document's lock, rebuilds the
//! [`VersionChain`] from the repository, lazily backfills version 1 for
//! documents that predate versioning, and then persists the change.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::chain::VersionChain;
use super::model::{BlobRef, Document, DocumentVersion, NewDocument, VersionFilter, VersionMeta};
use super::repository::DocumentRepository;
use crate::crypto::remove_blob_pair;
use crate::error::{CoreError, Result};
use crate::storage::StorageLayout;

pub struct VersionStore<R: DocumentRepository> {
    repo: Arc<R>,
    layout: StorageLayout,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<R: DocumentRepository> VersionStore<R> {
    pub fn new(repo: Arc<R>, layout: StorageLayout) -> Self {
        Self {
            repo,
            layout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Register a document whose first blob is already on disk.
    ///
    /// No version row is written; version 1 is backfilled on first use.
    pub fn create_document(&self, new: NewDocument) -> Result<Document> {
        let now = Utc::now();
        let document = Document {
            id: new.id,
            name: new.name,
            size: new.blob.size,
            path: new.blob.path,
            current_version_number: 1,
            is_encrypted: new.is_encrypted,
            created_at: now,
            updated_at: now,
        };
        self.repo.create_document(&document)?;
        if let Err(e) = self.repo.acquire_blob(&document.path) {
            if let Err(undo) = self.repo.delete_document(&document.id) {
                warn!(document = %document.id, error = %undo, "rollback of document row failed");
            }
            return Err(e);
        }
        info!(document = %document.id, name = %document.name, "document created");
        Ok(document)
    }

    pub fn document(&self, document_id: &str) -> Result<Document> {
        self.repo
            .get_document(document_id)?
            .ok_or_else(|| CoreError::NotFound(format!("document {document_id}")))
    }

    pub fn list_documents(&self) -> Result<Vec<Document>> {
        self.repo.list_documents()
    }

    /// Append a version. With `blob` the document moves to new content;
    /// without it the version re-records the current content.
    pub fn create_version(
        &self,
        document_id: &str,
        blob: Option<BlobRef>,
        meta: VersionMeta,
    ) -> Result<DocumentVersion> {
        let lock = self.lock_for(document_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (mut document, chain) = self.load_backfilled(document_id)?;
        let (path, size) = match &blob {
            Some(b) => (b.path.clone(), b.size),
            None => (document.path.clone(), document.size),
        };
        let file_size = meta.file_size.unwrap_or(size);
        let version = chain.next_version(path, file_size, &meta.created_by, meta.changes);

        let moves_content = blob.is_some();
        self.commit_version(&mut document, &version, moves_content)?;
        info!(
            document = %document_id,
            version = version.version_number,
            by = %version.created_by,
            "version created"
        );
        Ok(version)
    }

    /// Append a copy of an earlier version; history is left untouched
    pub fn restore_version(
        &self,
        document_id: &str,
        target_version_id: &str,
        created_by: &str,
    ) -> Result<DocumentVersion> {
        let lock = self.lock_for(document_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (mut document, chain) = self.load_backfilled(document_id)?;
        let target = chain.require(target_version_id)?;
        let version = chain.next_version(
            target.path.clone(),
            target.file_size,
            created_by,
            Some(format!("Restored from version {}", target.version_number)),
        );

        self.commit_version(&mut document, &version, true)?;
        info!(
            document = %document_id,
            from = target.version_number,
            version = version.version_number,
            "version restored"
        );
        Ok(version)
    }

    /// Delete a non-current version; its blob goes once nothing references it
    pub fn delete_version(&self, document_id: &str, version_id: &str) -> Result<()> {
        let lock = self.lock_for(document_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (_, chain) = self.load_backfilled(document_id)?;
        let victim = chain.check_deletable(version_id)?;

        self.repo.delete_version(&victim.id)?;
        let remaining = match self.repo.release_blob(&victim.path) {
            Ok(remaining) => remaining,
            Err(e) => {
                self.reinstate(victim, false);
                return Err(e);
            }
        };
        if remaining == 0 {
            if let Err(e) = remove_blob_pair(&victim.path) {
                self.reinstate(victim, true);
                return Err(e);
            }
            debug!(blob = %victim.path.display(), "blob removed");
        }
        info!(
            document = %document_id,
            version = victim.version_number,
            "version deleted"
        );
        Ok(())
    }

    /// Highest explicit version number; 0 while nothing has been backfilled
    pub fn latest_version_number(&self, document_id: &str) -> Result<u32> {
        let document = self.document(document_id)?;
        let versions = self
            .repo
            .list_versions(&VersionFilter::for_document(document_id))?;
        Ok(VersionChain::new(&document, versions).latest_number())
    }

    /// Full history, ascending
    pub fn list_versions(&self, document_id: &str) -> Result<Vec<DocumentVersion>> {
        let lock = self.lock_for(document_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (_, chain) = self.load_backfilled(document_id)?;
        Ok(chain.into_versions())
    }

    pub fn get_version(&self, document_id: &str, version_number: u32) -> Result<DocumentVersion> {
        let lock = self.lock_for(document_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (_, chain) = self.load_backfilled(document_id)?;
        chain.get(version_number).cloned().ok_or_else(|| {
            CoreError::NotFound(format!("version {version_number} of document {document_id}"))
        })
    }

    pub fn current_version(&self, document_id: &str) -> Result<DocumentVersion> {
        let lock = self.lock_for(document_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (_, chain) = self.load_backfilled(document_id)?;
        chain.current().cloned().ok_or_else(|| {
            CoreError::NotFound(format!(
                "current version {} of document {document_id}",
                chain.current_number()
            ))
        })
    }

    /// Drop the document, its history and every blob reference it holds
    pub fn delete_document(&self, document_id: &str) -> Result<()> {
        let lock = self.lock_for(document_id);
        {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

            let document = self.document(document_id)?;
            let versions = self
                .repo
                .list_versions(&VersionFilter::for_document(document_id))?;

            if versions.is_empty() {
                self.release(&document.path)?;
            }
            for version in &versions {
                self.repo.delete_version(&version.id)?;
                self.release(&version.path)?;
            }
            self.repo.delete_document(document_id)?;

            let dir = self.layout.document_dir(document_id);
            match fs::remove_dir(&dir) {
                Ok(()) => debug!(dir = %dir.display(), "removed document directory"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!(dir = %dir.display(), error = %e, "document directory kept"),
            }
            info!(document = %document_id, versions = versions.len(), "document deleted");
        }
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document_id);
        Ok(())
    }

    fn lock_for(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(document_id.to_string()).or_default())
    }

    /// Load the document and its chain, writing version 1 if the chain is empty.
    /// Caller must hold the document lock.
    fn load_backfilled(&self, document_id: &str) -> Result<(Document, VersionChain)> {
        let mut document = self.document(document_id)?;
        let versions = self
            .repo
            .list_versions(&VersionFilter::for_document(document_id))?;
        let mut chain = VersionChain::new(&document, versions);
        if !chain.is_empty() {
            return Ok((document, chain));
        }

        let initial = VersionChain::initial_version(&document);
        self.repo.create_version(&initial)?;
        self.repo.ensure_blob(&initial.path)?;
        chain.append(initial)?;
        if document.current_version_number != 1 {
            document.current_version_number = 1;
            self.repo.update_document(&document)?;
        }
        debug!(document = %document_id, "backfilled version 1");
        Ok((document, chain))
    }

    /// Persist a new version and point the document at it, undoing the
    /// version row and blob reference if the document update fails.
    fn commit_version(
        &self,
        document: &mut Document,
        version: &DocumentVersion,
        moves_content: bool,
    ) -> Result<()> {
        self.repo.create_version(version)?;
        if let Err(e) = self.repo.acquire_blob(&version.path) {
            if let Err(undo) = self.repo.delete_version(&version.id) {
                warn!(version = %version.id, error = %undo, "rollback of version row failed");
            }
            return Err(e);
        }

        let previous = document.clone();
        document.current_version_number = version.version_number;
        if moves_content {
            document.path = version.path.clone();
            document.size = version.file_size;
        }
        document.updated_at = Utc::now();

        if let Err(e) = self.repo.update_document(document) {
            warn!(
                document = %document.id,
                version = version.version_number,
                error = %e,
                "document update failed, rolling back version"
            );
            if let Err(undo) = self.repo.delete_version(&version.id) {
                warn!(version = %version.id, error = %undo, "rollback of version row failed");
            }
            if let Err(undo) = self.repo.release_blob(&version.path) {
                warn!(blob = %version.path.display(), error = %undo, "rollback of blob reference failed");
            }
            *document = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Put back a version row removed by a failed delete, along with its
    /// blob reference when that was already dropped
    fn reinstate(&self, version: &DocumentVersion, reacquire: bool) {
        if let Err(e) = self.repo.create_version(version) {
            warn!(version = %version.id, error = %e, "could not reinstate version row");
            return;
        }
        if reacquire {
            if let Err(e) = self.repo.acquire_blob(&version.path) {
                warn!(blob = %version.path.display(), error = %e, "could not reinstate blob reference");
            }
        }
    }

    /// Drop one reference; the blob pair is removed with the last one
    fn release(&self, blob: &Path) -> Result<()> {
        let remaining = self.repo.release_blob(blob)?;
        if remaining == 0 {
            remove_blob_pair(blob)?;
            debug!(blob = %blob.display(), "blob removed");
        } else {
            debug!(blob = %blob.display(), remaining, "blob still referenced");
        }
        Ok(())
    }
}
