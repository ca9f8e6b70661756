// src/crypto/service.rs
//! File-level streaming encryption/decryption
//!
//! Every output is written to a staging file in the destination directory and
//! only renamed into place once complete, so a failed or cancelled call never
//! leaves anything addressable at the destination path.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::gcm::{GcmDecryptor, GcmEncryptor};
use super::key::KeyProvider;
use super::sidecar::{self, SidecarMetadata};
use crate::aliases::MasterKey32;
use crate::cancel::CancelToken;
use crate::consts::{IV_LEN, STAGING_PREFIX, STREAM_CHUNK_SIZE};
use crate::enums::CipherAlgorithm;
use crate::error::{CoreError, Result};
use crate::util::remove_file_if_exists;

/// Result of a successful [`CipherService::encrypt`]
#[derive(Debug, Clone)]
pub struct EncryptOutcome {
    pub dest_path: PathBuf,
    pub metadata: SidecarMetadata,
    pub plaintext_len: u64,
    /// BLAKE3 of the plaintext, lowercase hex
    pub content_hash: String,
}

/// Ciphertext fully written and tagged, not yet visible at its final path
pub(crate) struct StagedBlob {
    blob: NamedTempFile,
    dest: PathBuf,
    metadata: SidecarMetadata,
    plaintext_len: u64,
    content_hash: String,
}

impl StagedBlob {
    pub(crate) fn dest(&self) -> &Path {
        &self.dest
    }

    #[cfg(test)]
    pub(crate) fn staging_path(&self) -> &Path {
        self.blob.path()
    }

    /// Publish sidecar first, then the blob, so a blob never exists without
    /// one. If the blob cannot be renamed the sidecar that was there before
    /// (if any) is put back.
    pub(crate) fn commit(self) -> Result<EncryptOutcome> {
        let meta_path = sidecar::sidecar_path(&self.dest);
        let previous = preserve_copy(&meta_path)?;
        sidecar::stage_sidecar(&self.dest, &self.metadata)?
            .persist(&meta_path)
            .map_err(|e| CoreError::Io(e.error))?;

        if let Err(e) = self.blob.persist(&self.dest) {
            match previous {
                Some(old) => {
                    old.persist(&meta_path).map_err(|e| CoreError::Io(e.error))?;
                }
                None => {
                    remove_file_if_exists(&meta_path)?;
                }
            }
            return Err(CoreError::Io(e.error));
        }

        Ok(EncryptOutcome {
            dest_path: self.dest,
            metadata: self.metadata,
            plaintext_len: self.plaintext_len,
            content_hash: self.content_hash,
        })
    }
}

/// Stateless (given its key) AES-256-GCM file cipher
pub struct CipherService {
    key: MasterKey32,
}

impl CipherService {
    /// Resolve the master key once from `provider`
    pub fn new(provider: &dyn KeyProvider) -> Result<Self> {
        Ok(Self::from_key(provider.master_key()?))
    }

    pub fn from_key(key: MasterKey32) -> Self {
        Self { key }
    }

    pub fn algorithm(&self) -> CipherAlgorithm {
        CipherAlgorithm::Aes256Gcm
    }

    /// Stream `source` into an encrypted blob at `dest` plus `<dest>.meta`
    pub fn encrypt<R: Read>(&self, source: R, dest: &Path) -> Result<EncryptOutcome> {
        self.encrypt_with_cancel(source, dest, &CancelToken::new())
    }

    pub fn encrypt_with_cancel<R: Read>(
        &self,
        source: R,
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<EncryptOutcome> {
        let outcome = self.encrypt_staged(source, dest, cancel)?.commit()?;
        debug!(
            blob = %outcome.dest_path.display(),
            bytes = outcome.plaintext_len,
            "encrypted blob"
        );
        Ok(outcome)
    }

    pub fn encrypt_file(&self, input: &Path, dest: &Path) -> Result<EncryptOutcome> {
        self.encrypt(File::open(input)?, dest)
    }

    pub(crate) fn encrypt_staged<R: Read>(
        &self,
        mut source: R,
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<StagedBlob> {
        let mut staged = staging_file(dest)?;

        // Never reused: one fresh IV per encryption
        let iv: [u8; IV_LEN] = rand::random();
        let mut encryptor = GcmEncryptor::new(self.key.expose_secret(), &iv);
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let mut total = 0u64;

        loop {
            cancel.check()?;
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            let chunk = &mut buf[..n];
            hasher.update(chunk);
            encryptor.update(chunk)?;
            staged.write_all(chunk)?;
            total += n as u64;
        }

        staged.flush()?;
        staged.as_file().sync_all()?;

        // Tag exists only now that the whole stream was consumed
        let tag = encryptor.finish();

        Ok(StagedBlob {
            blob: staged,
            dest: dest.to_path_buf(),
            metadata: SidecarMetadata::new(&iv, &tag),
            plaintext_len: total,
            content_hash: hasher.finalize().to_hex().to_string(),
        })
    }

    /// Decrypt `source` to `dest`; metadata is read from the sidecar if not given
    pub fn decrypt(
        &self,
        source: &Path,
        dest: &Path,
        metadata: Option<&SidecarMetadata>,
    ) -> Result<PathBuf> {
        self.decrypt_with_cancel(source, dest, metadata, &CancelToken::new())
    }

    pub fn decrypt_with_cancel(
        &self,
        source: &Path,
        dest: &Path,
        metadata: Option<&SidecarMetadata>,
        cancel: &CancelToken,
    ) -> Result<PathBuf> {
        let loaded;
        let metadata = match metadata {
            Some(meta) => meta,
            None => {
                loaded = sidecar::read_sidecar(source)?;
                &loaded
            }
        };

        let mut staged = staging_file(dest)?;
        let written = self.decrypt_into(source, metadata, &mut staged, cancel)?;
        staged.flush()?;
        staged.as_file().sync_all()?;
        staged.persist(dest).map_err(|e| CoreError::Io(e.error))?;

        debug!(blob = %source.display(), bytes = written, "decrypted blob");
        Ok(dest.to_path_buf())
    }

    /// Decrypt into memory; returns only after the tag has been verified
    pub fn decrypt_to_vec(&self, source: &Path) -> Result<Vec<u8>> {
        let metadata = sidecar::read_sidecar(source)?;
        let mut out = Vec::new();
        self.decrypt_into(source, &metadata, &mut out, &CancelToken::new())?;
        Ok(out)
    }

    /// Core decrypt loop. Output is unauthenticated until this returns `Ok`,
    /// so `out` must always be a staging sink the caller discards on error.
    pub(crate) fn decrypt_into<W: Write>(
        &self,
        source: &Path,
        metadata: &SidecarMetadata,
        out: &mut W,
        cancel: &CancelToken,
    ) -> Result<u64> {
        if metadata.algorithm != self.algorithm() {
            return Err(CoreError::MalformedMetadata(format!(
                "blob uses {}, service provides {}",
                metadata.algorithm,
                self.algorithm()
            )));
        }

        let iv = metadata.iv_bytes()?;
        let tag = metadata.tag_bytes()?;
        let mut decryptor = GcmDecryptor::new(self.key.expose_secret(), &iv, tag);

        let mut input = File::open(source)?;
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let mut total = 0u64;

        loop {
            cancel.check()?;
            let n = match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            let chunk = &mut buf[..n];
            decryptor.update(chunk)?;
            out.write_all(chunk)?;
            total += n as u64;
        }

        decryptor.finish()?;
        Ok(total)
    }
}

/// Copy of `path` in a staging file beside it, for putting back later.
/// `None` if there is nothing at `path`.
pub(crate) fn preserve_copy(path: &Path) -> Result<Option<NamedTempFile>> {
    let mut original = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut copy = staging_file(path)?;
    io::copy(&mut original, &mut copy)?;
    copy.flush()?;
    copy.as_file().sync_all()?;
    Ok(Some(copy))
}

/// Staging file in `dest`'s directory (created if missing); removed on drop
fn staging_file(dest: &Path) -> Result<NamedTempFile> {
    let dir = sidecar::staging_dir(dest);
    std::fs::create_dir_all(&dir)?;
    Ok(tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(".partial")
        .tempfile_in(&dir)?)
}
