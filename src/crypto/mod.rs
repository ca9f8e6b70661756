// src/crypto/mod.rs
//! Cipher service: streaming authenticated encryption of single files
//!
//! Blobs hold ciphertext only; the IV and tag live in the `<blob>.meta`
//! sidecar. Keys come from an injected [`KeyProvider`].
mod gcm;
mod key;
mod rotate;
mod service;
mod sidecar;

pub use gcm::{GcmDecryptor, GcmEncryptor};
pub use key::{
    parse_master_key, ConfigKeyProvider, EnvKeyProvider, KeyProvider, StaticKeyProvider,
    MASTER_KEY_ENV,
};
pub use rotate::rotate_blobs;
pub use service::{CipherService, EncryptOutcome};
pub use sidecar::{
    is_sidecar, read_sidecar, remove_blob_pair, sidecar_path, write_sidecar, SidecarMetadata,
};
