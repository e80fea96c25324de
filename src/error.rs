//! Error types for dtsettings

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for dtsettings operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dtsettings
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("Failed to read file '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{}': {source}", .path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{}': {source}", .path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{}': {source}", .path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Failed to serialize data: {0}")]
    Serialize(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),

    #[error("Invalid environment URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Schema config file not found: {}", .0.display())]
    SchemaFileNotFound(PathBuf),

    #[error("Output already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    // -------------------------------------------------------------------------
    // Transport / API Errors
    // -------------------------------------------------------------------------
    #[error("Cannot reach Dynatrace environment at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API returned {status} for {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    // -------------------------------------------------------------------------
    // Archive Errors (archive feature)
    // -------------------------------------------------------------------------
    #[cfg(feature = "archive")]
    #[error("Archive error: {0}")]
    Archive(String),

    #[cfg(feature = "archive")]
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Check if this error stems from missing or invalid configuration
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::MissingEnv(_)
                | Error::InvalidUrl { .. }
                | Error::SchemaFileNotFound(_)
                | Error::AlreadyExists(_)
        )
    }

    /// Check if this is an authentication or authorization rejection
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status == 401 || *status == 403)
    }

    /// Check if this error must abort the whole run
    ///
    /// Configuration problems, an unreachable environment, an input file that
    /// cannot be read and an output root that cannot be created are fatal.
    /// Everything else is scoped to a single schema, object or follow-up step.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.is_config_error()
            || matches!(
                self,
                Error::Unreachable { .. } | Error::DirectoryCreate { .. } | Error::FileRead { .. }
            )
    }
}

// =============================================================================
// Filesystem Helper Functions
// =============================================================================
// These reduce repetitive map_err patterns across the crate.

/// Create a directory (and parents) with proper error handling
pub fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreate {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write content to a file with proper error handling
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}
