//! Schema list file handling
//!
//! The schema list is a plain text file with one settings schema identifier per
//! line. Blank lines and lines starting with `#` are ignored.

use crate::error::{Error, Result, write_file};
use log::{debug, warn};
use std::collections::HashSet;
use std::path::Path;

/// Default file name looked up in the working directory
pub const DEFAULT_SCHEMA_FILE: &str = "schemas_config.txt";

/// Schemas exported when no other list is configured
pub const DEFAULT_SCHEMAS: [&str; 3] = [
    "builtin:anomaly-detection.metric-events",
    "builtin:alerting.profile",
    "builtin:problem.notifications",
];

/// Parse schema identifiers from the content of a schema list file
///
/// Entries are returned in file order with surrounding whitespace removed.
/// Duplicates are kept and reported with a warning.
pub fn parse_schema_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut schemas = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !seen.insert(line.to_string()) {
            warn!(
                "Schema '{}' listed more than once (line {})",
                line,
                line_no + 1
            );
        }
        schemas.push(line.to_string());
    }

    schemas
}

/// Read and parse a schema list file
///
/// # Errors
///
/// * `Error::SchemaFileNotFound` - If the file does not exist
/// * `Error::FileRead` - If the file exists but cannot be read
pub fn read_schema_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::SchemaFileNotFound(path.to_path_buf())
        } else {
            Error::FileRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let schemas = parse_schema_list(&content);
    debug!(
        "Loaded {} schemas from {}",
        schemas.len(),
        path.display()
    );
    Ok(schemas)
}

/// Content of a freshly generated schema list file
pub fn default_schema_file_contents() -> String {
    let mut content = String::from(
        "# Dynatrace settings schemas to export, one per line.\n\
         # Lines starting with '#' and blank lines are ignored.\n\n",
    );
    for schema in DEFAULT_SCHEMAS {
        content.push_str(schema);
        content.push('\n');
    }
    content
}

/// Write the default schema list to `path`
///
/// Refuses to replace an existing file unless `force` is set.
pub fn write_default_schema_file(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        crate::error::create_dir(parent)?;
    }
    write_file(path, default_schema_file_contents())
}
