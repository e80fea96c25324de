//! # dtsettings - Dynatrace settings export
//!
//! Downloads settings objects (alerting profiles, problem notifications,
//! metric-event anomaly detectors, or any other Settings 2.0 schema) from a
//! Dynatrace environment and stores each one as a JSON file, grouped in one
//! folder per schema.
//!
//! ## Features
//!
//! - **Paginated listing**: follows `nextPageKey` until every object is listed
//! - **Per-item failure handling**: a broken schema or object is reported and skipped
//! - **Deterministic output**: sorted keys, no timestamps, atomic writes
//! - **Manifest**: `manifest.json` with SHA-256 per file, verifiable later
//! - **Archive**: optional zip of the whole export (`archive` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dtsettings::{Credentials, DefaultEnvSource, ExportConfig, Exporter, HttpSettingsClient};
//!
//! # fn example() -> dtsettings::Result<()> {
//! let credentials = Credentials::from_env(&DefaultEnvSource)?;
//! let config = ExportConfig::builder(credentials)
//!     .schemas(["builtin:alerting.profile", "builtin:problem.notifications"])
//!     .output_dir("downloaded_settings")
//!     .build();
//!
//! let client = HttpSettingsClient::from_config(&config)?;
//! let summary = Exporter::new(config, client).run()?;
//! println!(
//!     "{}/{} schemas, {} objects",
//!     summary.schemas_succeeded(),
//!     summary.schemas_attempted(),
//!     summary.total_downloaded()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Output Layout
//!
//! ```text
//! downloaded_settings/
//! ├── manifest.json
//! ├── builtin_alerting.profile/
//! │   ├── vu9U3hXa3q0AAAABABhidWlsdGluOmFsZXJ0aW5nLnByb2ZpbGUABnRlbmFudAAGdGVuYW50ACRiZjQ2.json
//! │   └── ...
//! └── builtin_problem.notifications/
//!     └── ...
//! ```
//!
//! Schema and object identifiers are sanitised: `:`, `/` and other characters
//! that are unsafe in file names become `_`.

mod error;

pub mod client;
pub mod config;
pub mod export;
pub mod manifest;
pub mod paths;
pub mod storage;

#[cfg(feature = "archive")]
pub mod archive;

// Re-exports from core
pub use error::{Error, Result};
pub use storage::{JsonStorage, StorageBackend};

pub use client::{HttpSettingsClient, ListedObject, ObjectsPage, PageRequest, SettingsApi, SettingsObject};

pub use config::{
    Credentials, DEFAULT_SCHEMA_FILE, DEFAULT_SCHEMAS, DefaultEnvSource, EnvSource, ExportConfig,
    ExportConfigBuilder, FetchMode, MapEnvSource, TOKEN_ENV, URL_ENV, read_schema_file,
};

pub use export::{ExportEvent, ExportSummary, Exporter, ObjectFailure, SchemaOutcome};
pub use manifest::{ExportManifest, MANIFEST_FILE, ManifestCheck};
pub use paths::{ExportLayout, sanitize_component};

#[cfg(feature = "archive")]
pub use archive::{ArchiveInfo, create_archive};
