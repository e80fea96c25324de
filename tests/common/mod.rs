//! Common test utilities for dtsettings integration tests
//!
//! Provides a mock Dynatrace environment, export configurations pointing at it,
//! and helpers for reading what an export wrote.

#![allow(dead_code)]

use dtsettings::{Credentials, ExportConfig, ExportConfigBuilder, Exporter, HttpSettingsClient};
use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TOKEN: &str = "dt0c01.TESTTOKEN.SECRET";
pub const OBJECTS_PATH: &str = "/api/v2/settings/objects";
pub const SCHEMAS_PATH: &str = "/api/v2/settings/schemas";

// =============================================================================
// Test Fixtures
// =============================================================================

/// A mock environment plus a scratch directory for the export
pub struct TestEnv {
    pub server: MockServer,
    pub temp_dir: TempDir,
}

impl TestEnv {
    /// Start a mock server that answers the reachability check
    pub fn new() -> Self {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(Method::HEAD).path(SCHEMAS_PATH);
            then.status(200);
        });
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { server, temp_dir }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.temp_dir.path().join("downloaded_settings")
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.server.base_url(), TOKEN).expect("valid mock credentials")
    }

    /// Builder with the mock credentials and the scratch output directory
    pub fn builder(&self, schemas: &[&str]) -> ExportConfigBuilder {
        ExportConfig::builder(self.credentials())
            .schemas(schemas.iter().copied())
            .output_dir(self.output_dir())
    }

    pub fn config(&self, schemas: &[&str]) -> ExportConfig {
        self.builder(schemas).build()
    }

    pub fn exporter(&self, config: ExportConfig) -> Exporter<HttpSettingsClient> {
        let client = HttpSettingsClient::from_config(&config).expect("client");
        Exporter::new(config, client)
    }

    /// Single-page listing of a schema
    pub fn mock_list(&self, schema_id: &str, items: Vec<Value>) -> Mock<'_> {
        let total = items.len();
        let body = json!({
            "items": items,
            "totalCount": total,
            "pageSize": 100,
        });
        self.server.mock(|when, then| {
            when.method(Method::GET)
                .path(OBJECTS_PATH)
                .query_param("schemaIds", schema_id)
                .header("Authorization", format!("Api-Token {TOKEN}"));
            then.status(200).json_body(body);
        })
    }

    /// Full document of one object, as returned by the single-object endpoint
    pub fn mock_object(&self, schema_id: &str, object_id: &str, value: Value) -> Mock<'_> {
        let body = object_document(schema_id, object_id, value);
        self.server.mock(|when, then| {
            when.method(Method::GET)
                .path(format!("{OBJECTS_PATH}/{object_id}"))
                .header("Authorization", format!("Api-Token {TOKEN}"));
            then.status(200).json_body(body);
        })
    }

    /// Listing plus a single-object mock for every entry
    pub fn mock_schema(&self, schema_id: &str, objects: &[(&str, Value)]) {
        let items = objects
            .iter()
            .map(|(id, value)| listed(id, value.clone()))
            .collect();
        self.mock_list(schema_id, items);
        for (id, value) in objects {
            self.mock_object(schema_id, id, value.clone());
        }
    }

    /// Path of an object file written for a schema folder
    pub fn object_file(&self, folder: &str, file: &str) -> PathBuf {
        self.output_dir().join(folder).join(file)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// A list entry as returned with `fields=objectId,value`
pub fn listed(object_id: &str, value: Value) -> Value {
    json!({ "objectId": object_id, "value": value })
}

pub fn object_document(schema_id: &str, object_id: &str, value: Value) -> Value {
    json!({
        "objectId": object_id,
        "schemaId": schema_id,
        "schemaVersion": "1.0.0",
        "scope": "environment",
        "value": value,
    })
}

/// Parse a written JSON file
pub fn read_json(path: &Path) -> Value {
    let content = std::fs::read_to_string(path).expect("file should exist");
    serde_json::from_str(&content).expect("file should contain JSON")
}

/// Every file below `root`, relative and sorted
pub fn list_files(root: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let rel = path.strip_prefix(base).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }

    let mut files = Vec::new();
    if root.exists() {
        walk(root, root, &mut files);
    }
    files.sort();
    files
}
