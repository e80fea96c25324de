//! Export manifest
//!
//! `manifest.json` sits in the output root and records, per schema, which
//! objects were written, where, and their SHA-256. It carries no timestamps so
//! two runs against unchanged data produce the same bytes.

use crate::error::{Error, Result};
use crate::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// File name of the manifest inside the output root
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest format version
pub const MANIFEST_VERSION: u32 = 1;

/// Description of one export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    /// Manifest format version
    pub version: u32,

    /// Tool name and version that produced the export
    pub generator: String,

    /// Environment the objects were read from
    pub environment: String,

    /// Schemas in export order
    pub schemas: Vec<ManifestSchema>,
}

/// One schema folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSchema {
    pub schema_id: String,

    /// Folder name relative to the output root
    pub folder: String,

    /// Every listed object was written
    pub complete: bool,

    pub objects: Vec<ManifestObject>,
}

/// One object file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestObject {
    pub object_id: String,

    /// Path relative to the output root, `/`-separated
    pub file: String,

    /// Hex SHA-256 of the file content
    pub sha256: String,

    pub size: u64,
}

/// Result of checking an export directory against its manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestCheck {
    /// Files compared
    pub checked: usize,

    /// Files listed in the manifest but absent on disk
    pub missing: Vec<String>,

    /// Files whose content no longer matches the recorded hash
    pub mismatched: Vec<String>,
}

impl ManifestCheck {
    /// All files present and unchanged
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}

impl ExportManifest {
    /// Start an empty manifest for an environment
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            generator: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
            environment: environment.into(),
            schemas: Vec::new(),
        }
    }

    /// Open a new schema section; following objects are recorded under it
    pub fn begin_schema(&mut self, schema_id: impl Into<String>, folder: impl Into<String>) {
        self.schemas.push(ManifestSchema {
            schema_id: schema_id.into(),
            folder: folder.into(),
            complete: false,
            objects: Vec::new(),
        });
    }

    /// Record a written object under the current schema
    ///
    /// A file can only hold one object: an earlier entry for the same file is
    /// dropped, and if it described another object (or the same ID under
    /// another schema) its schema is marked incomplete.
    pub fn record_object(&mut self, object_id: impl Into<String>, file_name: &str, content: &[u8]) {
        let Some((schema_id, folder)) = self
            .schemas
            .last()
            .map(|s| (s.schema_id.clone(), s.folder.clone()))
        else {
            return;
        };
        let object_id = object_id.into();
        let file = format!("{folder}/{file_name}");

        for schema in &mut self.schemas {
            if let Some(pos) = schema.objects.iter().position(|o| o.file == file) {
                let replaced = schema.objects.remove(pos);
                if schema.schema_id != schema_id || replaced.object_id != object_id {
                    schema.complete = false;
                }
            }
        }

        if let Some(schema) = self.schemas.last_mut() {
            schema.objects.push(ManifestObject {
                object_id,
                file,
                sha256: sha256_hex(content),
                size: content.len() as u64,
            });
        }
    }

    /// Close the current schema section
    pub fn finish_schema(&mut self, complete: bool) {
        if let Some(schema) = self.schemas.last_mut() {
            schema.complete = complete;
        }
    }

    /// Objects recorded across all schemas
    pub fn total_objects(&self) -> usize {
        self.schemas.iter().map(|s| s.objects.len()).sum()
    }

    /// Write the manifest into `root`
    pub fn save<S: StorageBackend>(&self, storage: &S, root: &Path) -> Result<PathBuf> {
        self.save_with_mode(storage, root, None)
    }

    /// Write the manifest into `root`, creating it with `mode` (Unix)
    pub fn save_with_mode<S: StorageBackend>(
        &self,
        storage: &S,
        root: &Path,
        mode: Option<u32>,
    ) -> Result<PathBuf> {
        let path = root.join(MANIFEST_FILE);
        let content = storage.serialize(self)?;
        storage.write_raw_with_mode(&path, &content, mode)?;
        Ok(path)
    }

    /// Load the manifest of an export directory
    pub fn load<S: StorageBackend>(storage: &S, root: &Path) -> Result<Self> {
        let manifest: Self = storage.read(&root.join(MANIFEST_FILE))?;
        if manifest.version > MANIFEST_VERSION {
            return Err(Error::Config(format!(
                "Manifest version {} is newer than supported version {}",
                manifest.version, MANIFEST_VERSION
            )));
        }
        Ok(manifest)
    }

    /// Re-hash every recorded file below `root`
    pub fn verify(&self, root: &Path) -> Result<ManifestCheck> {
        let mut check = ManifestCheck::default();

        for object in self.schemas.iter().flat_map(|s| s.objects.iter()) {
            let path = root.join(&object.file);
            if !path.is_file() {
                check.missing.push(object.file.clone());
                continue;
            }
            let (hash, _) = calculate_file_hash(&path)?;
            check.checked += 1;
            if hash != object.sha256 {
                check.mismatched.push(object.file.clone());
            }
        }

        Ok(check)
    }
}

/// Hex SHA-256 of a byte slice
pub fn sha256_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Calculate SHA-256 hash of a file, returning (hex hash, size)
pub fn calculate_file_hash(path: &Path) -> Result<(String, u64)> {
    let mut file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut total_size = 0u64;

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        if bytes_read == 0 {
            break;
        }
        total_size += bytes_read as u64;
        hasher.update(&buffer[..bytes_read]);
    }

    Ok((format!("{:x}", hasher.finalize()), total_size))
}
