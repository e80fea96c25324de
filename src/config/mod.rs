//! Configuration types for the exporter
//!
//! This module contains everything needed to describe an export run:
//! - `ExportConfig` - Environment, schemas and output options
//! - `Credentials` - Base URL and API token sourced from the environment
//! - Schema list file parsing (`schemas_config.txt`)

mod schema_list;
mod types;

pub use schema_list::{
    DEFAULT_SCHEMA_FILE, DEFAULT_SCHEMAS, default_schema_file_contents, parse_schema_list,
    read_schema_file, write_default_schema_file,
};

pub use types::{
    Credentials, DefaultEnvSource, EnvSource, ExportConfig, ExportConfigBuilder, FetchMode,
    MapEnvSource, TOKEN_ENV, URL_ENV, parse_base_url,
};
