//! Output layout: name sanitisation, target paths and directory creation
//!
//! Every exported object lands at
//! `<output_root>/<sanitize(schemaId)>/<sanitize(objectId)>.<ext>`.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

/// Replace characters that are unsafe in file names with `_`
///
/// Path separators, `:` and the characters Windows reserves are replaced, as
/// are control characters. Names that would resolve to the current or parent
/// directory (`""`, `.`, `..`) become `_`.
pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => sanitized,
    }
}

/// Directory layout of an export
#[derive(Debug, Clone)]
pub struct ExportLayout {
    root: PathBuf,
    extension: String,
    secure: bool,
}

impl ExportLayout {
    /// Create a layout rooted at `root` writing files with `extension`
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            secure: false,
        }
    }

    /// Restrict permissions of everything created to the owner (Unix)
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Output root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder name used for a schema
    pub fn schema_folder(schema_id: &str) -> String {
        sanitize_component(schema_id)
    }

    /// Absolute folder for a schema
    pub fn schema_dir(&self, schema_id: &str) -> PathBuf {
        self.root.join(Self::schema_folder(schema_id))
    }

    /// File name used for an object
    pub fn object_file_name(&self, object_id: &str) -> String {
        format!("{}.{}", sanitize_component(object_id), self.extension)
    }

    /// Path of an object relative to the output root
    pub fn relative_object_path(&self, schema_id: &str, object_id: &str) -> PathBuf {
        PathBuf::from(Self::schema_folder(schema_id)).join(self.object_file_name(object_id))
    }

    /// Full path of an object file
    pub fn object_path(&self, schema_id: &str, object_id: &str) -> PathBuf {
        self.root
            .join(self.relative_object_path(schema_id, object_id))
    }

    /// Create the output root if absent
    pub fn ensure_root(&self) -> Result<()> {
        self.ensure_dir(&self.root)
    }

    /// Create the folder for a schema if absent
    pub fn ensure_schema_dir(&self, schema_id: &str) -> Result<PathBuf> {
        let dir = self.schema_dir(schema_id);
        self.ensure_dir(&dir)?;
        Ok(dir)
    }

    /// Mode new files are created with, `None` for the process default
    pub fn file_mode(&self) -> Option<u32> {
        self.secure.then_some(0o600)
    }

    /// Pairs of distinct schema IDs that map to the same folder
    ///
    /// Each pair is `(first, later)` in configuration order. Repeated entries of
    /// the same ID are not collisions.
    pub fn colliding_schemas<'a>(schema_ids: &'a [String]) -> Vec<(&'a str, &'a str)> {
        let mut owners: HashMap<String, &str> = HashMap::new();
        let mut collisions = Vec::new();

        for id in schema_ids {
            match owners.entry(Self::schema_folder(id)) {
                Entry::Occupied(first) if *first.get() != id.as_str() => {
                    collisions.push((*first.get(), id.as_str()));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }
        collisions
    }

    fn ensure_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if self.secure {
            restrict_permissions(dir, 0o700)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        Error::FileWrite {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// No-op on Windows (permissions managed via ACLs)
#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
