//! Zip packaging of an export directory
//!
//! Entries are added in sorted order with a fixed modification time, so
//! archiving the same tree twice yields identical bytes.

use crate::error::{Error, Result};
use crate::manifest::calculate_file_hash;
use log::{debug, info};
use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// A written archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Location of the zip file
    pub path: PathBuf,

    /// Number of files stored
    pub files: usize,

    /// Hex SHA-256 of the zip file
    pub sha256: String,
}

/// Zip the contents of `source_dir` into `output_path`
///
/// Paths inside the archive are relative to `source_dir` and `/`-separated.
/// If `output_path` lies inside `source_dir` it is skipped.
pub fn create_archive(source_dir: &Path, output_path: &Path) -> Result<ArchiveInfo> {
    if !source_dir.is_dir() {
        return Err(Error::Archive(format!(
            "'{}' is not a directory",
            source_dir.display()
        )));
    }
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        crate::error::create_dir(parent)?;
    }

    let file = File::create(output_path).map_err(|e| Error::FileWrite {
        path: output_path.to_path_buf(),
        source: e,
    })?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(file);
    let skip = output_path.canonicalize().ok();
    let files = add_directory_to_zip(&mut zip, source_dir, source_dir, options, skip.as_deref())?;
    zip.finish().map_err(|e| Error::Archive(e.to_string()))?;

    let (sha256, size) = calculate_file_hash(output_path)?;
    info!(
        "Archived {} files into {} ({} bytes)",
        files,
        output_path.display(),
        size
    );

    Ok(ArchiveInfo {
        path: output_path.to_path_buf(),
        files,
        sha256,
    })
}

/// Recursively add a directory to a zip archive, returning the number of files
fn add_directory_to_zip<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    base_dir: &Path,
    current_dir: &Path,
    options: SimpleFileOptions,
    skip: Option<&Path>,
) -> Result<usize> {
    let mut entries = std::fs::read_dir(current_dir)
        .map_err(|e| Error::DirectoryRead {
            path: current_dir.to_path_buf(),
            source: e,
        })?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::DirectoryRead {
            path: current_dir.to_path_buf(),
            source: e,
        })?;
    entries.sort();

    let mut files = 0;
    for path in entries {
        if skip.is_some() && path.canonicalize().ok().as_deref() == skip {
            continue;
        }

        let relative = path
            .strip_prefix(base_dir)
            .map_err(|e| Error::Archive(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if path.is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
            files += add_directory_to_zip(zip, base_dir, &path, options, skip)?;
        } else {
            debug!("Adding {name}");
            zip.start_file(name, options)?;
            let mut file = File::open(&path).map_err(|e| Error::FileRead {
                path: path.clone(),
                source: e,
            })?;
            std::io::copy(&mut file, zip).map_err(|e| Error::FileRead {
                path: path.clone(),
                source: e,
            })?;
            files += 1;
        }
    }

    Ok(files)
}
