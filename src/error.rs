//! Error types for package extraction.
//!
//! Every core operation fails fast with an [`ExtractionError`]. The queue
//! turns the error into a failed [`ExtractionResult`](crate::extractor::ExtractionResult)
//! and keeps going with the next package.

use serde::Serialize;
use std::io;
use std::path::Path;

/// Result alias used throughout the extraction core.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Placeholder used when a tool's error stream is not valid UTF-8.
const UNDECODABLE_STDERR: &str = "Unknown error";

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The source package could not be opened or read.
    #[error("Cannot read file: {0}")]
    FileNotReadable(String),

    /// A structural expectation was violated (missing `Contents`, no payloads, ...).
    #[error("Invalid package format: {0}")]
    InvalidPackageFormat(String),

    /// No free destination name within the suffix limit.
    #[error("Too many naming collisions for: {0}")]
    TooManyCollisions(String),

    /// An external tool exited with a nonzero status.
    #[error("Command failed: {program}\nError: {stderr}")]
    CommandFailed { program: String, stderr: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// Discriminant of [`ExtractionError`], kept on results for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FileNotReadable,
    InvalidPackageFormat,
    TooManyCollisions,
    CommandFailed,
    Io,
}

impl ExtractionError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Build a `CommandFailed` from a program path and its raw stderr bytes.
    pub fn command_failed(program: &Path, stderr: &[u8]) -> Self {
        let stderr = String::from_utf8(stderr.to_vec())
            .unwrap_or_else(|_| UNDECODABLE_STDERR.to_string());
        Self::CommandFailed {
            program: program.display().to_string(),
            stderr,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotReadable(_) => ErrorKind::FileNotReadable,
            Self::InvalidPackageFormat(_) => ErrorKind::InvalidPackageFormat,
            Self::TooManyCollisions(_) => ErrorKind::TooManyCollisions,
            Self::CommandFailed { .. } => ErrorKind::CommandFailed,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}
