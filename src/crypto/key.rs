// src/crypto/key.rs
//! Master key resolution
//!
//! The content key is resolved exactly once, through a [`KeyProvider`], and
//! handed to [`CipherService`](super::CipherService) by value. Nothing in the
//! crate reads key material from ambient state on its own.

use std::env;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::aliases::MasterKey32;
use crate::config::Config;
use crate::consts::KEY_LEN;
use crate::error::{CoreError, Result};

/// Environment variable read by [`EnvKeyProvider::default`]
pub const MASTER_KEY_ENV: &str = "EDV_MASTER_KEY";

pub trait KeyProvider {
    fn master_key(&self) -> Result<MasterKey32>;
}

/// Fixed in-process key (tests, embedders with their own KMS)
pub struct StaticKeyProvider {
    key: MasterKey32,
}

impl StaticKeyProvider {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            key: MasterKey32::new(bytes),
        }
    }

    /// Fresh random key: handy for tests and throwaway vaults
    pub fn random() -> Self {
        Self::new(rand::random())
    }
}

impl KeyProvider for StaticKeyProvider {
    fn master_key(&self) -> Result<MasterKey32> {
        Ok(MasterKey32::new(*self.key.expose_secret()))
    }
}

/// Reads a hex or base64 encoded key from an environment variable
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new(MASTER_KEY_ENV)
    }
}

impl KeyProvider for EnvKeyProvider {
    fn master_key(&self) -> Result<MasterKey32> {
        let encoded = env::var(&self.var)
            .map_err(|_| CoreError::Key(format!("{} is not set", self.var)))?;
        parse_master_key(&encoded)
    }
}

/// Dev keys from the config file when `use_dev_keys = true`, env otherwise
pub struct ConfigKeyProvider<'a> {
    config: &'a Config,
}

impl<'a> ConfigKeyProvider<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }
}

impl KeyProvider for ConfigKeyProvider<'_> {
    fn master_key(&self) -> Result<MasterKey32> {
        if self.config.features.use_dev_keys {
            let encoded = self
                .config
                .keys
                .master_key
                .as_deref()
                .ok_or_else(|| CoreError::Key("keys.master_key missing from config".into()))?;
            tracing::warn!("using development master key from config");
            parse_master_key(encoded)
        } else {
            EnvKeyProvider::default().master_key()
        }
    }
}

/// Accepts 64 hex chars, standard base64 or unpadded base64url
pub fn parse_master_key(encoded: &str) -> Result<MasterKey32> {
    let encoded = encoded.trim();

    let raw = if encoded.len() == KEY_LEN * 2 && encoded.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex::decode(encoded).map_err(|e| CoreError::Key(format!("invalid hex key: {e}")))?
    } else {
        STANDARD
            .decode(encoded)
            .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
            .map_err(|e| CoreError::Key(format!("key is neither hex nor base64: {e}")))?
    };

    let len = raw.len();
    let bytes: [u8; KEY_LEN] = raw
        .try_into()
        .map_err(|_| CoreError::Key(format!("key must be {KEY_LEN} bytes, found {len}")))?;
    Ok(MasterKey32::new(bytes))
}
