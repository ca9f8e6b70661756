// src/archive/backup.rs
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{backup_file_name, entry_name, ArchiveService};
use crate::cancel::CancelToken;
use crate::consts::STAGING_PREFIX;
use crate::crypto::{is_sidecar, sidecar_path};
use crate::error::{CoreError, Result};
use crate::storage::StorageLayout;

/// Name collisions within the same millisecond get a numeric suffix
const MAX_NAME_ATTEMPTS: u32 = 100;

struct Entry {
    source: PathBuf,
    name: String,
}

impl ArchiveService {
    /// Archive the whole storage root (or just `files`) into `target_dir`
    pub fn create_backup(&self, files: Option<&[PathBuf]>, target_dir: &Path) -> Result<PathBuf> {
        self.create_backup_with_cancel(files, target_dir, &CancelToken::new())
    }

    pub fn create_backup_with_cancel(
        &self,
        files: Option<&[PathBuf]>,
        target_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf> {
        let entries = self.collect_entries(files)?;
        fs::create_dir_all(target_dir)?;

        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".zip.partial")
            .tempfile_in(target_dir)?;

        write_entries(staged.as_file_mut(), &entries, cancel)?;
        seal(&mut staged, entries.len()).map_err(incomplete)?;

        let path = publish(staged, target_dir)?;
        info!(
            archive = %path.display(),
            entries = entries.len(),
            "backup created"
        );
        Ok(path)
    }

    /// Primary blobs in archive order, each followed by its sidecar if present.
    /// A file listed more than once is archived once.
    fn collect_entries(&self, files: Option<&[PathBuf]>) -> Result<Vec<Entry>> {
        let primaries = match files {
            None => StorageLayout::new(&self.storage_root).blobs()?,
            Some(list) => list
                .iter()
                .filter(|p| !is_sidecar(p))
                .map(|p| {
                    if p.is_relative() {
                        self.storage_root.join(p)
                    } else {
                        p.clone()
                    }
                })
                .collect(),
        };

        let base = self.entry_base();
        let mut seen = BTreeSet::new();
        let mut entries = Vec::with_capacity(primaries.len() * 2);
        for primary in primaries {
            if !primary.is_file() {
                return Err(CoreError::NotFound(format!("file {}", primary.display())));
            }
            if !seen.insert(archive_name(base, &primary)?) {
                debug!(file = %primary.display(), "listed twice, archiving once");
                continue;
            }
            let companion = sidecar_path(&primary);
            let has_sidecar = companion.is_file();
            for source in std::iter::once(primary).chain(has_sidecar.then_some(companion)) {
                let name = archive_name(base, &source)?;
                entries.push(Entry { source, name });
            }
        }
        Ok(entries)
    }
}

fn archive_name(base: &Path, source: &Path) -> Result<String> {
    entry_name(base, source).ok_or_else(|| {
        CoreError::BackupIncomplete(format!(
            "{} is outside {}",
            source.display(),
            base.display()
        ))
    })
}

fn write_entries(out: &mut File, entries: &[Entry], cancel: &CancelToken) -> Result<()> {
    let mut zip = ZipWriter::new(out);
    for entry in entries {
        cancel.check()?;
        let mut source = File::open(&entry.source)?;
        let len = source.metadata()?.len();

        // Ciphertext does not compress; sidecars are small JSON
        let method = if is_sidecar(&entry.source) {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        let options = SimpleFileOptions::default()
            .compression_method(method)
            .large_file(len >= u64::from(u32::MAX));

        zip.start_file(entry.name.as_str(), options)?;
        io::copy(&mut source, &mut zip)?;
        debug!(entry = %entry.name, bytes = len, "archived");
    }
    zip.finish().map_err(incomplete)?;
    Ok(())
}

/// Flush to disk, then re-open the staged archive and check its entry count
fn seal(staged: &mut NamedTempFile, expected: usize) -> Result<()> {
    staged.as_file_mut().flush()?;
    staged.as_file().sync_all()?;

    let archive = ZipArchive::new(staged.reopen()?)?;
    if archive.len() != expected {
        return Err(CoreError::BackupIncomplete(format!(
            "archive holds {} entries, expected {expected}",
            archive.len()
        )));
    }
    Ok(())
}

/// Rename into place under a fresh `backup-<timestamp>.zip` name
fn publish(mut staged: NamedTempFile, target_dir: &Path) -> Result<PathBuf> {
    let stem = backup_file_name(Utc::now());
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = match attempt {
            0 => stem.clone(),
            n => stem.replacen(".zip", &format!("-{n}.zip"), 1),
        };
        let dest = target_dir.join(name);
        match staged.persist_noclobber(&dest) {
            Ok(_) => return Ok(dest),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => staged = e.file,
            Err(e) => return Err(incomplete(e.error)),
        }
    }
    warn!(dir = %target_dir.display(), "no free backup name");
    Err(CoreError::BackupIncomplete(format!(
        "no free archive name for {stem}"
    )))
}

fn incomplete(e: impl Into<CoreError>) -> CoreError {
    match e.into() {
        e @ CoreError::BackupIncomplete(_) => e,
        e @ CoreError::Cancelled => e,
        e => CoreError::BackupIncomplete(e.to_string()),
    }
}
