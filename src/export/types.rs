//! Outcome types of an export run

use std::path::PathBuf;

/// A single object that could not be exported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFailure {
    /// Schema being exported
    pub schema_id: String,

    /// Object identifier (`None` when the listing returned an entry without one)
    pub object_id: Option<String>,

    /// Human-readable cause
    pub reason: String,
}

impl std::fmt::Display for ObjectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.object_id {
            Some(id) => write!(f, "{} / {}: {}", self.schema_id, id, self.reason),
            None => write!(f, "{} / <missing objectId>: {}", self.schema_id, self.reason),
        }
    }
}

/// Result of exporting one schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOutcome {
    /// Schema identifier as configured
    pub schema_id: String,

    /// Objects reported by the list endpoint
    pub found: usize,

    /// Objects written to disk
    pub downloaded: usize,

    /// Per-object failures, in processing order
    pub failures: Vec<ObjectFailure>,

    /// Set when the schema could not be listed at all
    pub list_error: Option<String>,
}

impl SchemaOutcome {
    pub(crate) fn new(schema_id: impl Into<String>) -> Self {
        Self {
            schema_id: schema_id.into(),
            found: 0,
            downloaded: 0,
            failures: Vec::new(),
            list_error: None,
        }
    }

    /// Listing succeeded and every listed object was written
    ///
    /// A schema without objects is complete.
    pub fn is_complete(&self) -> bool {
        self.list_error.is_none() && self.downloaded == self.found
    }
}

/// Result of a whole export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Output root
    pub output_dir: PathBuf,

    /// One outcome per configured schema, in configuration order
    pub schemas: Vec<SchemaOutcome>,

    /// Location of `manifest.json`, if written
    pub manifest_path: Option<PathBuf>,
}

impl ExportSummary {
    /// Number of schemas the run attempted
    pub fn schemas_attempted(&self) -> usize {
        self.schemas.len()
    }

    /// Number of schemas exported without any failure
    pub fn schemas_succeeded(&self) -> usize {
        self.schemas.iter().filter(|s| s.is_complete()).count()
    }

    /// Objects written across all schemas
    pub fn total_downloaded(&self) -> usize {
        self.schemas.iter().map(|s| s.downloaded).sum()
    }

    /// Objects reported by the API across all listable schemas
    pub fn total_found(&self) -> usize {
        self.schemas.iter().map(|s| s.found).sum()
    }

    /// All per-object failures of the run
    pub fn failures(&self) -> impl Iterator<Item = &ObjectFailure> {
        self.schemas.iter().flat_map(|s| s.failures.iter())
    }

    /// Every schema fully succeeded
    pub fn is_complete(&self) -> bool {
        self.schemas.iter().all(SchemaOutcome::is_complete)
    }
}
