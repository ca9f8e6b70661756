// src/archive/restore.rs
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use super::ArchiveService;
use crate::cancel::CancelToken;
use crate::consts::STAGING_PREFIX;
use crate::crypto::is_sidecar;
use crate::error::{CoreError, Result};

impl ArchiveService {
    /// Extract `archive` under `target_dir`; returns the restored primary blobs
    pub fn restore_backup(&self, archive: &Path, target_dir: &Path) -> Result<Vec<PathBuf>> {
        self.restore_backup_with_cancel(archive, target_dir, &CancelToken::new())
    }

    pub fn restore_backup_with_cancel(
        &self,
        archive: &Path,
        target_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<Vec<PathBuf>> {
        let mut zip = ZipArchive::new(File::open(archive)?)?;
        fs::create_dir_all(target_dir)?;

        // Dropped (and removed) on every early return
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(target_dir)?;

        let mut extracted: Vec<PathBuf> = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            cancel.check()?;
            let mut entry = zip.by_index(i)?;
            let rel = entry
                .enclosed_name()
                .map(|p| p.to_path_buf())
                .ok_or_else(|| {
                    CoreError::Io(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("archive entry {} escapes the target", entry.name()),
                    ))
                })?;

            let out = staging.path().join(&rel);
            if entry.is_dir() {
                fs::create_dir_all(&out)?;
                continue;
            }
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            io::copy(&mut entry, &mut File::create(&out)?)?;
            debug!(entry = %rel.display(), "extracted");
            extracted.push(rel);
        }

        // Sidecars land before their blobs so no blob is ever visible alone
        let (sidecars, primaries): (Vec<PathBuf>, Vec<PathBuf>) =
            extracted.into_iter().partition(|rel| is_sidecar(rel));

        for rel in &sidecars {
            cancel.check()?;
            move_into_place(staging.path(), target_dir, rel)?;
        }
        let mut restored = Vec::with_capacity(primaries.len());
        for rel in &primaries {
            cancel.check()?;
            restored.push(move_into_place(staging.path(), target_dir, rel)?);
        }

        info!(
            archive = %archive.display(),
            target = %target_dir.display(),
            blobs = restored.len(),
            "backup restored"
        );
        Ok(restored)
    }
}

fn move_into_place(staging: &Path, target_dir: &Path, rel: &Path) -> Result<PathBuf> {
    let dest = target_dir.join(rel);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(staging.join(rel), &dest)?;
    Ok(dest)
}
