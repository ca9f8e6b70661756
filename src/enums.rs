// src/enums.rs
//! Public enum types used throughout the crate

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Supported content encryption algorithms
///
/// Serialized with the exact name written into sidecar files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[non_exhaustive]
pub enum CipherAlgorithm {
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

impl CipherAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherAlgorithm::Aes256Gcm => "aes-256-gcm",
        }
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes-256-gcm" => Ok(CipherAlgorithm::Aes256Gcm),
            other => Err(CoreError::MalformedMetadata(format!(
                "unsupported algorithm '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("AES-256-GCM".parse::<CipherAlgorithm>().unwrap(), CipherAlgorithm::Aes256Gcm);
        assert!("aes-128-cbc".parse::<CipherAlgorithm>().is_err());
    }

    #[test]
    fn test_serde_name_matches_display() {
        let json = serde_json::to_string(&CipherAlgorithm::Aes256Gcm).unwrap();
        assert_eq!(json, format!("\"{}\"", CipherAlgorithm::Aes256Gcm));
    }
}
