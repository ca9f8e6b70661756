// src/crypto/rotate.rs
//! Master key rotation for existing blobs
//!
//! Two phases: every blob is first decrypted under the old key (tag verified)
//! and re-encrypted under the new key into a staging file. Only when all of
//! them succeeded are the new sidecars and blobs renamed into place. A failure
//! in the first phase leaves every original blob untouched; a failure in the
//! second puts the blobs already swapped back to their old-key form.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::service::{preserve_copy, CipherService, StagedBlob};
use super::sidecar;
use crate::cancel::CancelToken;
use crate::consts::STAGING_PREFIX;
use crate::error::{CoreError, Result};

/// Re-encrypt `blobs` from `old` to `new`. Returns the number rotated.
pub fn rotate_blobs(
    old: &CipherService,
    new: &CipherService,
    blobs: &[PathBuf],
    cancel: &CancelToken,
) -> Result<usize> {
    let staged = stage_all(old, new, blobs, cancel)?;
    let count = swap_all(staged)?;
    info!(count, "rotated blobs to new master key");
    Ok(count)
}

fn stage_all(
    old: &CipherService,
    new: &CipherService,
    blobs: &[PathBuf],
    cancel: &CancelToken,
) -> Result<Vec<StagedBlob>> {
    let mut staged = Vec::with_capacity(blobs.len());
    for blob in blobs {
        cancel.check()?;
        let metadata = sidecar::read_sidecar(blob)?;

        // Plaintext stays beside its blob, under a name the layout ignores
        let mut plain = tempfile::Builder::new()
            .prefix(&format!("{STAGING_PREFIX}rotate-"))
            .tempfile_in(sidecar::staging_dir(blob))?;
        old.decrypt_into(blob, &metadata, plain.as_file_mut(), cancel)?;

        staged.push(new.encrypt_staged(plain.reopen()?, blob, cancel)?);
    }
    Ok(staged)
}

/// Old-key blob and sidecar kept aside while the new ones are swapped in
struct Original {
    dest: PathBuf,
    blob: NamedTempFile,
    sidecar: NamedTempFile,
}

impl Original {
    fn preserve(dest: &Path) -> Result<Self> {
        let missing = || CoreError::MissingMetadata {
            blob: dest.to_path_buf(),
        };
        let blob = preserve_copy(dest)?.ok_or_else(missing)?;
        let sidecar = preserve_copy(&sidecar::sidecar_path(dest))?.ok_or_else(missing)?;
        Ok(Self {
            dest: dest.to_path_buf(),
            blob,
            sidecar,
        })
    }

    fn put_back(self) -> Result<()> {
        self.sidecar
            .persist(sidecar::sidecar_path(&self.dest))
            .map_err(|e| CoreError::Io(e.error))?;
        self.blob
            .persist(&self.dest)
            .map_err(|e| CoreError::Io(e.error))?;
        Ok(())
    }
}

/// Rename every staged blob into place, undoing the ones already done if
/// any of them fails
fn swap_all(staged: Vec<StagedBlob>) -> Result<usize> {
    let mut swapped: Vec<Original> = Vec::with_capacity(staged.len());
    for blob in staged {
        let result = Original::preserve(blob.dest())
            .and_then(|original| blob.commit().map(|_| original));
        match result {
            Ok(original) => swapped.push(original),
            Err(e) => {
                warn!(error = %e, swapped = swapped.len(), "rotation failed, restoring old blobs");
                roll_back(swapped);
                return Err(e);
            }
        }
    }
    Ok(swapped.len())
}

fn roll_back(swapped: Vec<Original>) {
    for original in swapped.into_iter().rev() {
        let dest = original.dest.clone();
        if let Err(e) = original.put_back() {
            warn!(blob = %dest.display(), error = %e, "could not restore blob under old key");
        }
    }
}
