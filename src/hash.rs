// src/hash.rs

//! Checksums for source archives and remote patches
//!
//! Recipes pin every download with a prefixed checksum such as
//! `sha256:77a2541637b9...`. An unprefixed 64-character hex string is read as
//! SHA-256.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
}

impl HashAlgorithm {
    /// Length of the hex digest
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(Error::ParseError(format!(
                "Unsupported checksum algorithm '{}'",
                other
            ))),
        }
    }
}

/// A declared checksum
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest
    pub value: String,
}

impl Checksum {
    /// Parse `sha256:<hex>` or bare `<hex>`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (algorithm, value) = match s.split_once(':') {
            Some((algo, value)) => (algo.parse()?, value),
            None => (HashAlgorithm::Sha256, s),
        };

        if value.len() != algorithm.hex_len() {
            return Err(Error::ParseError(format!(
                "{} checksum must be {} hex characters, got {}",
                algorithm,
                algorithm.hex_len(),
                value.len()
            )));
        }
        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::ParseError(format!(
                "Checksum '{}' is not valid hex",
                value
            )));
        }

        Ok(Self {
            algorithm,
            value: value.to_ascii_lowercase(),
        })
    }

    /// File-name-safe form used as the source cache key
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.algorithm, self.value)
    }

    /// Check a file against this checksum
    pub fn verify_file(&self, path: &Path) -> Result<()> {
        let actual = match self.algorithm {
            HashAlgorithm::Sha256 => sha256_file(path)?,
        };
        if actual == self.value {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch {
                expected: self.to_string(),
                actual: format!("{}:{}", self.algorithm, actual),
            })
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

impl FromStr for Checksum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// SHA-256 of a byte slice as lowercase hex
pub fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 of everything a reader yields
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of a file, streamed
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| Error::IoError(format!("Failed to open {}: {}", path.display(), e)))?;
    sha256_reader(&mut file)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))
}
