// tests/common.rs
//! Shared test utilities: logging setup and vault fixtures
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use encrypted_doc_vault::{
    CipherService, DocumentVault, InMemoryRepository, StaticKeyProvider, StorageLayout,
};
use tempfile::TempDir;

#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize test-friendly logging
/// Call once at the start of any test that needs logs
pub fn setup() {
    #[cfg(feature = "logging")]
    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env()) // respects RUST_LOG=
        .try_init()
        .ok(); // idempotent

    #[cfg(not(feature = "logging"))]
    { /* no-op */ }
}

/// Force info-level logging even if RUST_LOG is not set
pub fn setup_info() {
    #[cfg(feature = "logging")]
    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::new("info"))
        .try_init()
        .ok();

    #[cfg(not(feature = "logging"))]
    { /* no-op */ }
}

pub fn cipher() -> CipherService {
    CipherService::new(&StaticKeyProvider::random()).unwrap()
}

pub fn cipher_with(key: [u8; 32]) -> CipherService {
    CipherService::new(&StaticKeyProvider::new(key)).unwrap()
}

/// `<tmp>/documents` as storage root, `<tmp>/backups` for archives
pub struct TestVault {
    pub dir: TempDir,
    pub repo: Arc<InMemoryRepository>,
    pub vault: DocumentVault<InMemoryRepository>,
}

impl TestVault {
    pub fn new() -> Self {
        setup();
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let layout = StorageLayout::new(dir.path().join("documents"));
        let vault = DocumentVault::new(cipher(), Arc::clone(&repo), layout);
        Self { dir, repo, vault }
    }

    pub fn storage_root(&self) -> PathBuf {
        self.dir.path().join("documents")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.dir.path().join("backups")
    }
}

/// Deterministic pseudo-random bytes (xorshift) so failures are reproducible
pub fn sample_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}

pub fn write_file(path: &Path, data: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, data).unwrap();
}

/// Every regular file below `dir`, relative and sorted
pub fn tree(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(dir).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}
