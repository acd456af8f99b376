//! Error taxonomy shared by every stage of a request.
//!
//! Errors are raised where they are detected and travel unhandled to the
//! request boundary, which turns them into an HTTP status with
//! [`ImagineError::status_code`]. Nothing in the crate retries.

use crate::config::ConfigError;
use crate::imaging::BackendError;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ImagineError>;

#[derive(Error, Debug)]
pub enum ImagineError {
    /// Deployment misconfiguration: empty breakpoint set, missing route
    /// option, unknown filter, refused cache clear.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source image absent or a cache path that maps to nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Directory creation or write failure while populating the cache.
    #[error("Storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Path-traversal sequence in a requested path.
    #[error("Path '{0}' escapes the configured root")]
    PathSecurity(String),

    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ImagineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// HTTP status the request boundary answers with.
    ///
    /// Path-security failures answer 404 so a probe cannot tell a rejected
    /// path from a missing one.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::PathSecurity(_) => 404,
            Self::Configuration(_)
            | Self::Storage { .. }
            | Self::Imaging(_)
            | Self::Io(_)
            | Self::Config(_) => 500,
        }
    }
}
