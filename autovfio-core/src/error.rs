//! Error types for auto-vfio.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for auto-vfio operations.
pub type Result<T> = std::result::Result<T, AutoVfioError>;

/// Main error type for auto-vfio.
#[derive(Error, Debug)]
pub enum AutoVfioError {
    // Sysfs errors
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout after {timeout:?} writing to {path:?}")]
    Timeout { path: PathBuf, timeout: Duration },

    // Device errors
    #[error("Invalid PCI address format: {address} (expected: 0000:01:00.0)")]
    InvalidPciAddress { address: String },

    #[error("Driver for device {address} not found")]
    DriverNotFound { address: String },

    // Privilege errors
    #[error("Privilege elevation failed: {reason}")]
    Elevation { reason: String },

    // Persistence errors
    #[error("Failed to persist vfio-pci ids in {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Output errors
    #[error("Invalid query expression {expression:?}: {reason}")]
    Query { expression: String, reason: String },

    #[error("Failed to encode output as {format}: {reason}")]
    Encode { format: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Unsupported config file format {extension:?}. Supported formats: {supported}")]
    UnsupportedConfigFormat { extension: String, supported: String },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AutoVfioError {
    /// Wrap an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// True for errors where the operation outcome is unknown.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
