// src/versioning/mod.rs
//! Document version history
//!
//! An append-only chain per document with one movable "current" pointer,
//! persisted through a pluggable [`DocumentRepository`].
mod chain;
mod memory;
mod model;
mod repository;
mod store;

pub use chain::VersionChain;
pub use memory::InMemoryRepository;
pub use model::{BlobRef, Document, DocumentVersion, NewDocument, VersionFilter, VersionMeta};
pub use repository::DocumentRepository;
pub use store::VersionStore;
