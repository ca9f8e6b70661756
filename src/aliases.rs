// src/aliases.rs
//! Re-exports secure-gate's ergonomic secret types
//!
//! These are the canonical secret types used throughout encrypted-doc-vault.

pub use secure_gate::{dynamic_alias, fixed_alias};

// Fixed-size secrets
fixed_alias!(MasterKey32, 32); // 256-bit AES-GCM content key

// Dynamic secrets
dynamic_alias!(IndexPassphrase, String); // SQLCipher passphrase for the row store
