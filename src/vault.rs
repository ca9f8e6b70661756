// src/vault.rs
//! `DocumentVault`: the one entry point an application layer needs
//!
//! Wires the cipher, the version store and the archive service together over a
//! single storage root. Uploads are encrypted into a fresh blob first and only
//! then recorded as a version; if recording fails the blob is removed again.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::archive::{ArchiveService, BackupInfo};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::crypto::{remove_blob_pair, rotate_blobs, CipherService, ConfigKeyProvider};
use crate::db::SqliteRepository;
use crate::error::Result;
use crate::storage::StorageLayout;
use crate::util::new_record_id;
use crate::versioning::{
    BlobRef, Document, DocumentRepository, DocumentVersion, NewDocument, VersionMeta, VersionStore,
};

pub struct DocumentVault<R: DocumentRepository> {
    cipher: CipherService,
    store: VersionStore<R>,
    archive: ArchiveService,
}

impl DocumentVault<SqliteRepository> {
    /// Vault described by `config`: SQLCipher index, master key via config/env
    pub fn open(config: &Config) -> Result<Self> {
        let cipher = CipherService::new(&ConfigKeyProvider::new(config))?;
        let repo = Arc::new(SqliteRepository::from_config(config)?);
        Ok(Self::new(
            cipher,
            repo,
            StorageLayout::new(&config.paths.storage_root),
        ))
    }
}

impl<R: DocumentRepository> DocumentVault<R> {
    pub fn new(cipher: CipherService, repo: Arc<R>, layout: StorageLayout) -> Self {
        let archive = ArchiveService::new(layout.root());
        Self {
            cipher,
            store: VersionStore::new(repo, layout),
            archive,
        }
    }

    pub fn cipher(&self) -> &CipherService {
        &self.cipher
    }

    pub fn store(&self) -> &VersionStore<R> {
        &self.store
    }

    pub fn archive(&self) -> &ArchiveService {
        &self.archive
    }

    pub fn layout(&self) -> &StorageLayout {
        self.store.layout()
    }

    /// Encrypt `content` as the first blob of a new document
    pub fn add_document<S: Read>(&self, name: &str, content: S) -> Result<Document> {
        let id = new_record_id();
        let path = self.layout().new_blob_path(&id);
        let outcome = self.cipher.encrypt(content, &path)?;

        let new = NewDocument::with_id(id, name, BlobRef::new(&path, outcome.plaintext_len));
        match self.store.create_document(new) {
            Ok(document) => Ok(document),
            Err(e) => {
                discard_blob(&path);
                Err(e)
            }
        }
    }

    /// Encrypt `content` into a fresh blob and record it as the next version
    pub fn upload_version<S: Read>(
        &self,
        document_id: &str,
        content: S,
        meta: VersionMeta,
    ) -> Result<DocumentVersion> {
        self.store.document(document_id)?;

        let path = self.layout().new_blob_path(document_id);
        let outcome = self.cipher.encrypt(content, &path)?;
        let blob = BlobRef::new(&path, outcome.plaintext_len);

        match self.store.create_version(document_id, Some(blob), meta) {
            Ok(version) => Ok(version),
            Err(e) => {
                discard_blob(&path);
                Err(e)
            }
        }
    }

    pub fn restore_version(
        &self,
        document_id: &str,
        version_id: &str,
        created_by: &str,
    ) -> Result<DocumentVersion> {
        self.store
            .restore_version(document_id, version_id, created_by)
    }

    pub fn delete_version(&self, document_id: &str, version_id: &str) -> Result<()> {
        self.store.delete_version(document_id, version_id)
    }

    pub fn delete_document(&self, document_id: &str) -> Result<()> {
        self.store.delete_document(document_id)
    }

    pub fn list_versions(&self, document_id: &str) -> Result<Vec<DocumentVersion>> {
        self.store.list_versions(document_id)
    }

    /// Decrypt one version to `dest`
    pub fn read_version(&self, document_id: &str, version_number: u32, dest: &Path) -> Result<PathBuf> {
        let version = self.store.get_version(document_id, version_number)?;
        self.cipher.decrypt(&version.path, dest, None)
    }

    pub fn read_current(&self, document_id: &str, dest: &Path) -> Result<PathBuf> {
        let version = self.store.current_version(document_id)?;
        self.cipher.decrypt(&version.path, dest, None)
    }

    pub fn read_version_to_vec(&self, document_id: &str, version_number: u32) -> Result<Vec<u8>> {
        let version = self.store.get_version(document_id, version_number)?;
        self.cipher.decrypt_to_vec(&version.path)
    }

    /// Archive the whole storage root into `target_dir`
    pub fn backup(&self, target_dir: &Path) -> Result<PathBuf> {
        self.archive.create_backup(None, target_dir)
    }

    pub fn list_backups(&self, dir: &Path) -> Result<Vec<BackupInfo>> {
        ArchiveService::list_backups(dir)
    }

    /// Put an archive made by [`backup`](Self::backup) back under the storage root
    pub fn restore(&self, archive: &Path) -> Result<Vec<PathBuf>> {
        let base = self.archive.entry_base().to_path_buf();
        self.archive.restore_backup(archive, &base)
    }

    /// Re-encrypt every blob under the storage root and switch to `new_cipher`.
    ///
    /// Must not run concurrently with uploads.
    pub fn rotate_key(&mut self, new_cipher: CipherService) -> Result<usize> {
        let blobs = self.layout().blobs()?;
        let count = rotate_blobs(&self.cipher, &new_cipher, &blobs, &CancelToken::new())?;
        self.cipher = new_cipher;
        info!(count, "vault switched to new master key");
        Ok(count)
    }
}

fn discard_blob(path: &Path) {
    if let Err(e) = remove_blob_pair(path) {
        warn!(blob = %path.display(), error = %e, "could not remove orphaned blob");
    }
}
