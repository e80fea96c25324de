//! The settings export procedure
//!
//! [`Exporter::run`] performs a flat two-level iteration: schemas in configured
//! order, then the objects of each schema in API order. Only problems that make
//! the whole run pointless are returned as errors (environment unreachable,
//! output root not creatable). Everything else is recorded per schema or per
//! object in the returned [`ExportSummary`] and the run carries on.

mod events;
mod types;

pub use events::{EventCallback, EventManager, ExportEvent};
pub use types::{ExportSummary, ObjectFailure, SchemaOutcome};

use crate::client::{ListedObject, SettingsApi, SettingsObject};
use crate::config::{ExportConfig, FetchMode};
use crate::error::{Error, Result};
use crate::manifest::ExportManifest;
use crate::paths::ExportLayout;
use crate::storage::{JsonStorage, StorageBackend};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Who last wrote each file of the run: (schema position, object id)
type WrittenFiles = HashMap<PathBuf, (usize, String)>;

/// An object that made it to disk
struct SavedObject {
    object_id: String,
    path: PathBuf,
    file_name: String,
    content: String,
}

/// Exports settings objects from one environment to a directory tree
pub struct Exporter<A: SettingsApi, S: StorageBackend = JsonStorage> {
    config: ExportConfig<S>,
    api: A,
    layout: ExportLayout,
    events: EventManager,
}

impl<A: SettingsApi, S: StorageBackend> Exporter<A, S> {
    /// Create an exporter from a configuration and an API implementation
    pub fn new(config: ExportConfig<S>, api: A) -> Self {
        let layout = ExportLayout::new(&config.output_dir, config.storage.extension())
            .secure(config.secure_output);
        Self {
            config,
            api,
            layout,
            events: EventManager::new(),
        }
    }

    /// Register a progress listener
    pub fn on_event<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&ExportEvent<'_>) + Send + Sync + 'static,
    {
        self.events.on_event(callback);
        self
    }

    /// Configuration of this exporter
    pub fn config(&self) -> &ExportConfig<S> {
        &self.config
    }

    /// Output layout of this exporter
    pub fn layout(&self) -> &ExportLayout {
        &self.layout
    }

    /// Run the export for every configured schema
    ///
    /// # Errors
    ///
    /// * `Error::Unreachable` - The environment did not answer; nothing was written
    /// * `Error::DirectoryCreate` - The output root could not be created
    pub fn run(&self) -> Result<ExportSummary> {
        self.api.check_reachable()?;
        self.layout.ensure_root()?;

        info!(
            "Exporting {} schemas from {} to {}",
            self.config.schemas.len(),
            self.api.base_url(),
            self.layout.root().display()
        );
        self.events.emit(&ExportEvent::Started {
            base_url: self.api.base_url(),
            schema_count: self.config.schemas.len(),
            output_dir: self.layout.root(),
        });

        let mut manifest = self
            .config
            .write_manifest
            .then(|| ExportManifest::new(self.api.base_url()));

        for (first, later) in ExportLayout::colliding_schemas(&self.config.schemas) {
            warn!(
                "Schemas {first} and {later} share the folder {} (identifiers collide after sanitising)",
                ExportLayout::schema_folder(first)
            );
        }

        let mut schemas: Vec<SchemaOutcome> = Vec::with_capacity(self.config.schemas.len());
        let mut written = WrittenFiles::new();
        for schema_id in &self.config.schemas {
            let outcome =
                self.export_schema_into(schema_id, manifest.as_mut(), &mut written, &mut schemas);
            schemas.push(outcome);
        }

        let manifest_path = manifest.and_then(|m| self.save_manifest(&m));

        let summary = ExportSummary {
            output_dir: self.layout.root().to_path_buf(),
            schemas,
            manifest_path,
        };

        info!(
            "Export finished: {}/{} schemas complete, {} objects written",
            summary.schemas_succeeded(),
            summary.schemas_attempted(),
            summary.total_downloaded()
        );
        self.events.emit(&ExportEvent::Finished { summary: &summary });

        Ok(summary)
    }

    /// Export a single schema without preflight or manifest
    ///
    /// The output root is created on demand when the first object is written.
    pub fn export_schema(&self, schema_id: &str) -> SchemaOutcome {
        self.export_schema_into(schema_id, None, &mut WrittenFiles::new(), &mut [])
    }

    /// Export one schema; `earlier` holds the outcomes of the schemas before it
    fn export_schema_into(
        &self,
        schema_id: &str,
        mut manifest: Option<&mut ExportManifest>,
        written: &mut WrittenFiles,
        earlier: &mut [SchemaOutcome],
    ) -> SchemaOutcome {
        let position = earlier.len();
        self.events.emit(&ExportEvent::SchemaStarted { schema_id });
        let mut outcome = SchemaOutcome::new(schema_id);

        if let Some(m) = manifest.as_deref_mut() {
            m.begin_schema(schema_id, ExportLayout::schema_folder(schema_id));
        }

        let listed = match self.api.list_objects(schema_id, self.config.page_size) {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Error listing settings for schema {schema_id}: {e}");
                outcome.list_error = Some(e.to_string());
                if let Some(m) = manifest.as_deref_mut() {
                    m.finish_schema(false);
                }
                self.events.emit(&ExportEvent::SchemaFinished { outcome: &outcome });
                return outcome;
            }
        };

        let total = listed.len();
        outcome.found = total;
        debug!("Schema {schema_id}: {total} objects listed");
        self.events.emit(&ExportEvent::SchemaListed {
            schema_id,
            count: total,
        });

        for (i, item) in listed.into_iter().enumerate() {
            let index = i + 1;
            match self.export_object(schema_id, item) {
                Ok(saved) => {
                    let previous = written.insert(
                        saved.path.clone(),
                        (position, saved.object_id.clone()),
                    );
                    if let Some((owner, replaced_id)) = previous {
                        let owner_outcome = if owner == position {
                            &mut outcome
                        } else {
                            &mut earlier[owner]
                        };
                        if owner_outcome.schema_id != schema_id || replaced_id != saved.object_id {
                            let failure = ObjectFailure {
                                schema_id: owner_outcome.schema_id.clone(),
                                object_id: Some(replaced_id),
                                reason: format!(
                                    "file {} was overwritten by object {} (identifiers collide after sanitising)",
                                    saved.path.display(),
                                    saved.object_id
                                ),
                            };
                            warn!("Error exporting object {failure}");
                            self.events.emit(&ExportEvent::ObjectFailed {
                                failure: &failure,
                                index,
                                total,
                            });
                            owner_outcome.downloaded -= 1;
                            owner_outcome.failures.push(failure);
                        }
                    }
                    outcome.downloaded += 1;
                    if let Some(m) = manifest.as_deref_mut() {
                        m.record_object(&saved.object_id, &saved.file_name, saved.content.as_bytes());
                    }
                    self.events.emit(&ExportEvent::ObjectSaved {
                        schema_id,
                        object_id: &saved.object_id,
                        path: &saved.path,
                        index,
                        total,
                    });
                }
                Err(failure) => {
                    warn!("Error exporting object {failure}");
                    self.events.emit(&ExportEvent::ObjectFailed {
                        failure: &failure,
                        index,
                        total,
                    });
                    outcome.failures.push(failure);
                }
            }
        }

        if let Some(m) = manifest.as_deref_mut() {
            m.finish_schema(outcome.is_complete());
        }
        self.events.emit(&ExportEvent::SchemaFinished { outcome: &outcome });
        outcome
    }

    fn export_object(
        &self,
        schema_id: &str,
        item: ListedObject,
    ) -> std::result::Result<SavedObject, ObjectFailure> {
        let failure = |object_id: Option<&str>, reason: String| ObjectFailure {
            schema_id: schema_id.to_string(),
            object_id: object_id.map(str::to_string),
            reason,
        };

        let Some(object_id) = item.id().map(str::to_string) else {
            return Err(failure(None, "listed entry has no objectId".into()));
        };

        self.write_object(schema_id, &object_id, item.value)
            .map_err(|e| failure(Some(&object_id), e.to_string()))
    }

    fn write_object(
        &self,
        schema_id: &str,
        object_id: &str,
        listed_value: Option<Value>,
    ) -> Result<SavedObject> {
        let document = match self.config.fetch_mode {
            FetchMode::Individual => {
                let fetched = self.api.get_object(object_id)?;
                with_object_id(fetched, object_id, self.api.base_url())?
            }
            FetchMode::ListOnly => {
                let value = listed_value.ok_or_else(|| Error::Decode {
                    url: self.api.base_url().to_string(),
                    reason: "listed entry has no value".into(),
                })?;
                serde_json::to_value(SettingsObject {
                    object_id: object_id.to_string(),
                    value,
                })?
            }
        };

        let content = self.config.storage.serialize(&document)?;
        self.layout.ensure_schema_dir(schema_id)?;
        let path = self.layout.object_path(schema_id, object_id);
        self.config
            .storage
            .write_raw_with_mode(&path, &content, self.layout.file_mode())?;

        Ok(SavedObject {
            object_id: object_id.to_string(),
            file_name: self.layout.object_file_name(object_id),
            path,
            content,
        })
    }

    fn save_manifest(&self, manifest: &ExportManifest) -> Option<PathBuf> {
        match manifest.save_with_mode(
            &self.config.storage,
            self.layout.root(),
            self.layout.file_mode(),
        ) {
            Ok(path) => {
                self.events.emit(&ExportEvent::ManifestWritten { path: &path });
                Some(path)
            }
            Err(e) => {
                warn!("Failed to write manifest: {e}");
                None
            }
        }
    }
}

/// Ensure a fetched object document carries its `objectId`
fn with_object_id(document: Value, object_id: &str, base_url: &str) -> Result<Value> {
    match document {
        Value::Object(mut map) => {
            map.entry("objectId")
                .or_insert_with(|| Value::String(object_id.to_string()));
            Ok(Value::Object(map))
        }
        other => Err(Error::Decode {
            url: base_url.to_string(),
            reason: format!(
                "expected a JSON object for {object_id}, got {}",
                json_kind(&other)
            ),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ObjectsPage, PageRequest};
    use crate::config::Credentials;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// In-memory environment: schema -> listed objects, id -> full document
    #[derive(Default)]
    struct FakeApi {
        listings: HashMap<String, Vec<Value>>,
        objects: HashMap<String, Value>,
        failing_lists: HashSet<String>,
        unreachable: bool,
    }

    impl FakeApi {
        fn with_schema(mut self, schema: &str, objects: &[(&str, Value)]) -> Self {
            let items = objects
                .iter()
                .map(|(id, value)| json!({"objectId": id, "value": value}))
                .collect();
            self.listings.insert(schema.to_string(), items);
            for (id, value) in objects {
                self.objects.insert(
                    (*id).to_string(),
                    json!({"objectId": id, "schemaId": schema, "value": value}),
                );
            }
            self
        }
    }

    impl SettingsApi for FakeApi {
        fn base_url(&self) -> &str {
            "https://env.example"
        }

        fn check_reachable(&self) -> Result<()> {
            if self.unreachable {
                return Err(Error::Config("unreachable".into()));
            }
            Ok(())
        }

        fn list_page(&self, request: &PageRequest) -> Result<ObjectsPage> {
            let PageRequest::First { schema_id, .. } = request else {
                panic!("fake api has a single page");
            };
            if self.failing_lists.contains(schema_id) {
                return Err(Error::Api {
                    status: 403,
                    url: "https://env.example/api/v2/settings/objects".into(),
                    message: "Token is missing required scope".into(),
                });
            }
            let items = self.listings.get(schema_id).cloned().unwrap_or_default();
            Ok(serde_json::from_value(json!({ "items": items }))?)
        }

        fn get_object(&self, object_id: &str) -> Result<Value> {
            self.objects.get(object_id).cloned().ok_or_else(|| Error::Api {
                status: 404,
                url: format!("https://env.example/api/v2/settings/objects/{object_id}"),
                message: "Not found".into(),
            })
        }
    }

    fn config(dir: &std::path::Path, schemas: &[&str]) -> ExportConfig {
        let creds = Credentials::new("https://env.example", "token").unwrap();
        ExportConfig::builder(creds)
            .schemas(schemas.iter().copied())
            .output_dir(dir.join("out"))
            .build()
    }

    #[test]
    fn test_run_writes_objects_and_summary() {
        let dir = tempdir().unwrap();
        let api = FakeApi::default()
            .with_schema(
                "builtin:alerting.profile",
                &[("p1", json!({"name": "Default"})), ("p2", json!({"name": "Ops"}))],
            )
            .with_schema("builtin:problem.notifications", &[("n1", json!({"type": "EMAIL"}))]);

        let exporter = Exporter::new(
            config(dir.path(), &["builtin:alerting.profile", "builtin:problem.notifications"]),
            api,
        );
        let summary = exporter.run().unwrap();

        assert_eq!(summary.schemas_attempted(), 2);
        assert_eq!(summary.schemas_succeeded(), 2);
        assert_eq!(summary.total_downloaded(), 3);
        assert!(summary.is_complete());

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("out/builtin_alerting.profile/p2.json"))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(written["objectId"], "p2");
        assert_eq!(written["value"], json!({"name": "Ops"}));
        assert_eq!(written["schemaId"], "builtin:alerting.profile");

        assert!(dir.path().join("out/manifest.json").is_file());
    }

    #[test]
    fn test_empty_schema_is_processed_not_failed() {
        let dir = tempdir().unwrap();
        let api = FakeApi::default().with_schema("builtin:alerting.profile", &[]);

        let summary = Exporter::new(config(dir.path(), &["builtin:alerting.profile"]), api)
            .run()
            .unwrap();

        assert_eq!(summary.schemas_succeeded(), 1);
        assert_eq!(summary.total_downloaded(), 0);
        assert!(!dir.path().join("out/builtin_alerting.profile").exists());
    }

    #[test]
    fn test_list_failure_skips_schema_only() {
        let dir = tempdir().unwrap();
        let mut api = FakeApi::default()
            .with_schema("builtin:problem.notifications", &[("n1", json!({}))]);
        api.failing_lists.insert("builtin:alerting.profile".into());

        let summary = Exporter::new(
            config(dir.path(), &["builtin:alerting.profile", "builtin:problem.notifications"]),
            api,
        )
        .run()
        .unwrap();

        assert_eq!(summary.schemas_succeeded(), 1);
        assert_eq!(summary.total_downloaded(), 1);
        let failed = &summary.schemas[0];
        assert!(failed.list_error.as_deref().unwrap().contains("403"));
        assert!(!failed.is_complete());
    }

    #[test]
    fn test_fetch_failure_counts_only_successes() {
        let dir = tempdir().unwrap();
        let mut api = FakeApi::default().with_schema(
            "builtin:alerting.profile",
            &[("p1", json!({})), ("gone", json!({})), ("p3", json!({}))],
        );
        api.objects.remove("gone");

        let summary = Exporter::new(config(dir.path(), &["builtin:alerting.profile"]), api)
            .run()
            .unwrap();

        let outcome = &summary.schemas[0];
        assert_eq!(outcome.found, 3);
        assert_eq!(outcome.downloaded, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].object_id.as_deref(), Some("gone"));
        assert!(outcome.failures[0].reason.contains("404"));
        assert_eq!(summary.schemas_succeeded(), 0);
        assert!(dir.path().join("out/builtin_alerting.profile/p3.json").is_file());
    }

    #[test]
    fn test_entry_without_object_id_is_a_failure() {
        let dir = tempdir().unwrap();
        let mut api = FakeApi::default().with_schema("s", &[("a", json!({}))]);
        api.listings
            .get_mut("s")
            .unwrap()
            .push(json!({"value": {"orphan": true}}));

        let outcome = Exporter::new(config(dir.path(), &["s"]), api).export_schema("s");

        assert_eq!(outcome.found, 2);
        assert_eq!(outcome.downloaded, 1);
        assert_eq!(outcome.failures[0].object_id, None);
    }

    #[test]
    fn test_unreachable_creates_nothing() {
        let dir = tempdir().unwrap();
        let api = FakeApi {
            unreachable: true,
            ..FakeApi::default()
        };

        let result = Exporter::new(config(dir.path(), &["s"]), api).run();

        assert!(result.is_err());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_list_only_mode_writes_listed_pair() {
        let dir = tempdir().unwrap();
        let mut api = FakeApi::default().with_schema("s:x", &[("a:1", json!({"k": "v"}))]);
        // list-only must not call get_object
        api.objects.clear();

        let creds = Credentials::new("https://env.example", "token").unwrap();
        let config = ExportConfig::builder(creds)
            .schemas(["s:x"])
            .output_dir(dir.path())
            .fetch_mode(FetchMode::ListOnly)
            .without_manifest()
            .build();

        let summary = Exporter::new(config, api).run().unwrap();
        assert!(summary.is_complete());
        assert!(summary.manifest_path.is_none());

        let content = std::fs::read_to_string(dir.path().join("s_x/a_1.json")).unwrap();
        assert_eq!(content, "{\n  \"objectId\": \"a:1\",\n  \"value\": {\n    \"k\": \"v\"\n  }\n}\n");
    }

    #[test]
    fn test_events_report_progress() {
        let dir = tempdir().unwrap();
        let api = FakeApi::default().with_schema("s", &[("a", json!({})), ("b", json!({}))]);
        let progress = Arc::new(Mutex::new(Vec::new()));
        let progress_clone = progress.clone();

        let mut exporter = Exporter::new(config(dir.path(), &["s"]), api);
        exporter.on_event(move |event| {
            if let ExportEvent::ObjectSaved { index, total, .. } = event {
                progress_clone.lock().unwrap().push(format!("{index}/{total}"));
            }
        });
        exporter.run().unwrap();

        assert_eq!(*progress.lock().unwrap(), vec!["1/2", "2/2"]);
    }

    #[test]
    fn test_schema_folder_collision_fails_overwritten_object() {
        let dir = tempdir().unwrap();
        let mut api = FakeApi::default()
            .with_schema("x:y", &[("o1", json!({}))])
            .with_schema("x/y", &[("o1", json!({})), ("o3", json!({}))]);
        api.objects.insert("o1".into(), json!({"objectId": "o1", "schemaId": "x/y"}));

        let summary = Exporter::new(config(dir.path(), &["x:y", "x/y"]), api)
            .run()
            .unwrap();

        let first = &summary.schemas[0];
        assert_eq!(first.found, 1);
        assert_eq!(first.downloaded, 0);
        assert_eq!(first.failures[0].schema_id, "x:y");
        assert_eq!(first.failures[0].object_id.as_deref(), Some("o1"));
        assert!(summary.schemas[1].is_complete());
        assert_eq!(summary.total_downloaded(), 2);

        let manifest = ExportManifest::load(&JsonStorage::new(), &dir.path().join("out")).unwrap();
        assert!(!manifest.schemas[0].complete);
        assert!(manifest.schemas[0].objects.is_empty());
        assert!(manifest.verify(&dir.path().join("out")).unwrap().is_ok());
    }

    #[test]
    fn test_repeated_schema_entry_is_not_a_collision() {
        let dir = tempdir().unwrap();
        let api = FakeApi::default().with_schema("s", &[("a", json!({})), ("b", json!({}))]);

        let summary = Exporter::new(config(dir.path(), &["s", "s"]), api)
            .run()
            .unwrap();

        assert!(summary.is_complete());
        assert_eq!(summary.total_downloaded(), 4);
    }

    #[test]
    fn test_with_object_id_rejects_non_objects() {
        assert!(with_object_id(json!([1, 2]), "a", "u").is_err());
        let doc = with_object_id(json!({"value": 1}), "a", "u").unwrap();
        assert_eq!(doc["objectId"], "a");
    }
}
