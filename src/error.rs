// src/error.rs

//! Error types for the recipe engine
//!
//! Errors fall into three families that callers need to tell apart:
//! - Invalid configuration: the option/setting combination cannot be built.
//!   Raised before any build work starts and fixable by the user.
//! - External tool failure: fetch, patch, configure, compile or install
//!   failed. Carries the tool's own output.
//! - Packaging inconsistency: a nominally successful build did not produce
//!   an artifact the recipe promised.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// User-fixable option/setting/dependency conflict
    Configuration,
    /// A subprocess or remote fetch failed
    ExternalTool,
    /// Expected artifact missing after the build
    Packaging,
    /// Recipe file is malformed
    Recipe,
    /// Local filesystem problem
    Io,
}

#[derive(Error, Debug)]
pub enum Error {
    /// Mutually exclusive or unsatisfiable option/setting combination
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// External tool exited unsuccessfully
    #[error("{tool} failed during {phase} (exit code {code:?})\n{output}")]
    ToolFailed {
        tool: String,
        phase: String,
        code: Option<i32>,
        output: String,
    },

    /// External tool is not installed
    #[error("required tool not found: {0}")]
    ToolNotFound(String),

    /// External tool ran past the configured timeout
    #[error("{tool} timed out after {seconds}s during {phase}")]
    Timeout {
        tool: String,
        phase: String,
        seconds: u64,
    },

    /// Source download failed
    #[error("download failed: {0}")]
    DownloadError(String),

    /// Downloaded file does not match its declared checksum
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// A strict in-process patch did not apply
    #[error("patch failed: {0}")]
    PatchFailed(String),

    /// An artifact the recipe promised is absent after the build
    #[error("missing artifact after build: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// Other packaging inconsistency
    #[error("packaging error: {0}")]
    PackagingError(String),

    /// Recipe or settings text could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Referenced file or entry does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O failure with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Raw I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid-configuration error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration(_) => ErrorKind::Configuration,
            Self::ToolFailed { .. }
            | Self::ToolNotFound(_)
            | Self::Timeout { .. }
            | Self::DownloadError(_)
            | Self::ChecksumMismatch { .. }
            | Self::PatchFailed(_) => ErrorKind::ExternalTool,
            Self::MissingArtifact { .. } | Self::PackagingError(_) => ErrorKind::Packaging,
            Self::ParseError(_) | Self::Json(_) => ErrorKind::Recipe,
            Self::NotFound(_) | Self::IoError(_) | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// True for user-fixable misconfiguration
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
