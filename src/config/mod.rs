// src/config/mod.rs
//! Configuration system for encrypted-doc-vault
//!
//! Central, lazy-loaded global config with TOML + env overrides.

pub use app::{load, Config, Features, Keys, Paths};
pub use defaults::DEFAULT_CONFIG_FILE;

mod app;
mod defaults;
