// src/lib.rs
//! encrypted-doc-vault: encrypted, versioned document storage
//!
//! Features:
//! - Streaming AES-256-GCM blobs with JSON sidecars (IV + tag)
//! - Append-only version history with a movable current pointer
//! - Shared-blob reference counting
//! - Atomic zip backups and staged restores
//! - SQLCipher index via rusqlite, in-memory repository for embedding/tests

pub mod aliases;
pub mod archive;
pub mod cancel;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod db;
pub mod enums;
pub mod error;
pub mod storage;
pub mod util;
pub mod vault;
pub mod versioning;

// Re-export everything users need at the crate root
pub use aliases::{IndexPassphrase, MasterKey32};
pub use archive::{ArchiveService, BackupInfo};
pub use cancel::CancelToken;
pub use config::{load as load_config, Config};
pub use crypto::{
    CipherService, EncryptOutcome, EnvKeyProvider, KeyProvider, SidecarMetadata, StaticKeyProvider,
};
pub use db::SqliteRepository;
pub use enums::CipherAlgorithm;
pub use error::{CoreError, Result};
pub use storage::StorageLayout;
pub use vault::DocumentVault;
pub use versioning::{
    BlobRef, Document, DocumentRepository, DocumentVersion, InMemoryRepository, NewDocument,
    VersionMeta, VersionStore,
};
