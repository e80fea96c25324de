//! Storage backend trait and implementations

use crate::error::{Error, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Trait for storage backend implementations
///
/// Object files are written through this trait so the on-disk format can be
/// swapped without touching the export loop.
pub trait StorageBackend: Clone + Send + Sync {
    /// File extension for this storage format (e.g., "json")
    fn extension(&self) -> &str;

    /// Serialize data to string
    ///
    /// Output must be deterministic for equal input so repeated exports
    /// produce identical files.
    fn serialize<T: Serialize>(&self, data: &T) -> Result<String>;

    /// Deserialize data from string
    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T>;

    /// Read and deserialize from file
    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.deserialize(&content)
    }

    /// Serialize and write to file
    fn write<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let content = self.serialize(data)?;
        self.write_raw(path, &content)
    }

    /// Write already serialized content to file
    ///
    /// Uses atomic write: writes to temp file then renames to prevent a
    /// half-written object when the process is interrupted.
    fn write_raw(&self, path: &Path, content: &str) -> Result<()> {
        self.write_raw_with_mode(path, content, None)
    }

    /// Like [`write_raw`](Self::write_raw), creating the file with `mode` (Unix)
    ///
    /// The mode is applied to the temp file before the rename, so the final
    /// path never exists with wider permissions.
    fn write_raw_with_mode(&self, path: &Path, content: &str, mode: Option<u32>) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        // Append .tmp to keep the full original filename
        let file_name = path.file_name().ok_or_else(|| {
            Error::Config(format!(
                "Invalid path '{}': must have a filename",
                path.display()
            ))
        })?;
        let mut temp_filename = file_name.to_os_string();
        temp_filename.push(".tmp");
        let temp_path = path.with_file_name(temp_filename);

        write_temp(&temp_path, content, mode).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            Error::FileWrite {
                path: temp_path.clone(),
                source: e,
            }
        })?;

        std::fs::rename(&temp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            Error::FileWrite {
                path: path.to_path_buf(),
                source: e,
            }
        })
    }
}

/// Write the temp file of an atomic write, honouring an optional Unix mode
fn write_temp(path: &Path, content: &str, mode: Option<u32>) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options.open(path)?;

    // A stale temp file keeps its old mode; `mode` only applies on creation
    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.write_all(content.as_bytes())?;
    file.sync_all()
}

// =============================================================================
// JSON Storage Implementation
// =============================================================================

/// JSON storage backend (default)
#[derive(Debug, Clone)]
pub struct JsonStorage {
    /// Pretty print JSON output
    pretty: bool,
}

impl JsonStorage {
    /// Create a new JSON storage backend with pretty printing enabled
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Create a compact JSON storage (no pretty printing)
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for JsonStorage {
    fn extension(&self) -> &str {
        "json"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        let mut out = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        out.push('\n');
        Ok(out)
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        serde_json::from_str(content).map_err(Error::from)
    }
}

// =============================================================================
// Tests
// =============================================================================
