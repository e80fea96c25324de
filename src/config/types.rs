//! Core configuration types for an export run

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::storage::{JsonStorage, StorageBackend};

use super::schema_list::DEFAULT_SCHEMAS;

/// Environment variable holding the Dynatrace environment URL
pub const URL_ENV: &str = "DYNATRACE_URL";

/// Environment variable holding the Dynatrace API token
pub const TOKEN_ENV: &str = "DYNATRACE_API_TOKEN";

// =============================================================================
// Environment Sources
// =============================================================================

/// Source of environment variables
///
/// Abstracted so tests can supply variables without touching the process
/// environment.
pub trait EnvSource: Send + Sync {
    /// Look up a variable, returning `None` when it is unset
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads variables from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEnvSource;

impl EnvSource for DefaultEnvSource {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment, mostly useful for tests
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource(pub HashMap<String, String>);

impl MapEnvSource {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Environment URL and API token
#[derive(Clone)]
pub struct Credentials {
    /// Validated environment base URL
    pub base_url: Url,

    /// API token sent as `Authorization: Api-Token <token>`
    pub api_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from explicit values
    ///
    /// # Errors
    ///
    /// * `Error::InvalidUrl` - If the URL is not an absolute HTTP(S) URL
    /// * `Error::MissingEnv` - If the token is empty
    pub fn new(base_url: &str, api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::MissingEnv(TOKEN_ENV));
        }
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_token: api_token.trim().to_string(),
        })
    }

    /// Read `DYNATRACE_URL` and `DYNATRACE_API_TOKEN` from an environment source
    ///
    /// Empty values are treated as unset.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        let url = non_empty(env.var(URL_ENV)).ok_or(Error::MissingEnv(URL_ENV))?;
        let token = non_empty(env.var(TOKEN_ENV)).ok_or(Error::MissingEnv(TOKEN_ENV))?;
        Self::new(&url, token)
    }

    /// Base URL without trailing slash, for display
    pub fn display_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse and validate an environment base URL
///
/// The URL must use `http` or `https`, have a host and carry neither query
/// nor fragment. A path is allowed (Managed environments live under
/// `/e/<environment-id>`). Trailing slashes are removed.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: &str| Error::InvalidUrl {
        url: raw.trim().to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not contain a query or fragment"));
    }

    Ok(url)
}

// =============================================================================
// Export Configuration
// =============================================================================

/// How each object's content is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// List object IDs, then GET every object individually (default)
    #[default]
    Individual,
    /// Write the `{objectId, value}` pairs returned by the list call
    ListOnly,
}

/// Configuration for an export run
pub struct ExportConfig<S: StorageBackend = JsonStorage> {
    /// Environment URL and token
    pub credentials: Credentials,

    /// Schema identifiers, exported in this order
    pub schemas: Vec<String>,

    /// Root directory receiving one folder per schema
    pub output_dir: PathBuf,

    /// Storage backend used for object files
    pub storage: S,

    /// Object content source
    pub fetch_mode: FetchMode,

    /// Page size requested from the list endpoint (API default when None)
    pub page_size: Option<u32>,

    /// Total request timeout
    pub timeout: Duration,

    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,

    /// Write `manifest.json` into the output root after the run
    pub write_manifest: bool,

    /// Restrict output permissions to the current user (Unix: 0700 dirs, 0600 files)
    pub secure_output: bool,
}

impl<S: StorageBackend> std::fmt::Debug for ExportConfig<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportConfig")
            .field("credentials", &self.credentials)
            .field("schemas", &self.schemas)
            .field("output_dir", &self.output_dir)
            .field("storage", &self.storage.extension())
            .field("fetch_mode", &self.fetch_mode)
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("write_manifest", &self.write_manifest)
            .field("secure_output", &self.secure_output)
            .finish()
    }
}

impl ExportConfig<JsonStorage> {
    /// Create a new builder for ExportConfig
    ///
    /// # Example
    /// ```rust
    /// use dtsettings::{Credentials, ExportConfig};
    ///
    /// let credentials = Credentials::new("https://abc12345.live.dynatrace.com", "dt0c01.token")?;
    /// let config = ExportConfig::builder(credentials)
    ///     .schemas(["builtin:alerting.profile"])
    ///     .output_dir("backup")
    ///     .build();
    /// assert_eq!(config.schemas.len(), 1);
    /// # Ok::<(), dtsettings::Error>(())
    /// ```
    pub fn builder(credentials: Credentials) -> ExportConfigBuilder {
        ExportConfigBuilder::new(credentials)
    }
}

/// Builder for creating ExportConfig with a fluent API
#[derive(Debug, Clone)]
pub struct ExportConfigBuilder {
    credentials: Credentials,
    schemas: Option<Vec<String>>,
    output_dir: PathBuf,
    pretty_json: bool,
    fetch_mode: FetchMode,
    page_size: Option<u32>,
    timeout: Duration,
    connect_timeout: Duration,
    write_manifest: bool,
    secure_output: bool,
}

impl ExportConfigBuilder {
    /// Default output root, relative to the working directory
    pub const DEFAULT_OUTPUT_DIR: &'static str = "downloaded_settings";

    /// Create a new builder with the required credentials
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            schemas: None,
            output_dir: PathBuf::from(Self::DEFAULT_OUTPUT_DIR),
            pretty_json: true,
            fetch_mode: FetchMode::default(),
            page_size: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            write_manifest: true,
            secure_output: false,
        }
    }

    /// Set the schemas to export (default: the three alerting-related schemas)
    pub fn schemas<I, T>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.schemas = Some(schemas.into_iter().map(Into::into).collect());
        self
    }

    /// Set the output root directory
    ///
    /// Supports `~` expansion for home directory.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let expanded = if path.starts_with("~") {
            if let Some(home) = dirs::home_dir() {
                home.join(path.strip_prefix("~").unwrap_or(&path))
            } else {
                path
            }
        } else {
            path
        };
        self.output_dir = expanded;
        self
    }

    /// Use compact JSON (no pretty printing)
    pub fn compact_json(mut self) -> Self {
        self.pretty_json = false;
        self
    }

    /// Choose how object content is obtained
    pub fn fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = mode;
        self
    }

    /// Request a specific page size from the list endpoint
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Set the total request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Skip writing `manifest.json`
    pub fn without_manifest(mut self) -> Self {
        self.write_manifest = false;
        self
    }

    /// Restrict permissions of created directories and files to the owner
    pub fn secure_output(mut self, secure: bool) -> Self {
        self.secure_output = secure;
        self
    }

    /// Build the ExportConfig
    pub fn build(self) -> ExportConfig<JsonStorage> {
        let storage = if self.pretty_json {
            JsonStorage::new()
        } else {
            JsonStorage::compact()
        };

        ExportConfig {
            credentials: self.credentials,
            schemas: self
                .schemas
                .unwrap_or_else(|| DEFAULT_SCHEMAS.iter().map(|s| (*s).to_string()).collect()),
            output_dir: self.output_dir,
            storage,
            fetch_mode: self.fetch_mode,
            page_size: self.page_size,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            write_manifest: self.write_manifest,
            secure_output: self.secure_output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("https://abc12345.live.dynatrace.com", "dt0c01.secret").unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let config = ExportConfig::builder(creds()).build();

        assert_eq!(config.schemas, DEFAULT_SCHEMAS.to_vec());
        assert_eq!(config.output_dir, PathBuf::from("downloaded_settings"));
        assert_eq!(config.fetch_mode, FetchMode::Individual);
        assert!(config.write_manifest);
        assert!(!config.secure_output);
        assert_eq!(config.page_size, None);
    }

    #[test]
    fn test_builder_with_options() {
        let config = ExportConfig::builder(creds())
            .schemas(["builtin:alerting.profile"])
            .output_dir("/tmp/dt-export")
            .fetch_mode(FetchMode::ListOnly)
            .page_size(100)
            .without_manifest()
            .compact_json()
            .build();

        assert_eq!(config.schemas, vec!["builtin:alerting.profile"]);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/dt-export"));
        assert_eq!(config.fetch_mode, FetchMode::ListOnly);
        assert_eq!(config.page_size, Some(100));
        assert!(!config.write_manifest);
    }

    #[test]
    fn test_url_trailing_slash_removed() {
        let c = Credentials::new("https://abc12345.live.dynatrace.com///", "t").unwrap();
        assert_eq!(c.display_url(), "https://abc12345.live.dynatrace.com");
    }

    #[test]
    fn test_url_with_environment_path() {
        let c = Credentials::new("https://managed.example.com/e/env-1/", "t").unwrap();
        assert_eq!(c.display_url(), "https://managed.example.com/e/env-1");
    }

    #[test]
    fn test_invalid_urls_rejected() {
        for raw in [
            "abc12345.live.dynatrace.com",
            "ftp://abc12345.live.dynatrace.com",
            "https://host?x=1",
            "https://host/#frag",
            "not a url",
        ] {
            let err = parse_base_url(raw).unwrap_err();
            assert!(matches!(err, Error::InvalidUrl { .. }), "accepted {raw}");
        }
    }

    #[test]
    fn test_from_env_missing_url() {
        let env = MapEnvSource::new().with(TOKEN_ENV, "dt0c01.secret");
        let err = Credentials::from_env(&env).unwrap_err();
        assert!(matches!(err, Error::MissingEnv(URL_ENV)));
    }

    #[test]
    fn test_from_env_missing_token() {
        let env = MapEnvSource::new()
            .with(URL_ENV, "https://abc12345.live.dynatrace.com")
            .with(TOKEN_ENV, "   ");
        let err = Credentials::from_env(&env).unwrap_err();
        assert!(matches!(err, Error::MissingEnv(TOKEN_ENV)));
    }

    #[test]
    fn test_from_env_ok() {
        let env = MapEnvSource::new()
            .with(URL_ENV, "https://abc12345.live.dynatrace.com/")
            .with(TOKEN_ENV, "dt0c01.secret");
        let c = Credentials::from_env(&env).unwrap();
        assert_eq!(c.display_url(), "https://abc12345.live.dynatrace.com");
        assert_eq!(c.api_token, "dt0c01.secret");
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", creds());
        assert!(!debug.contains("dt0c01.secret"));
        assert!(debug.contains("<redacted>"));
    }
}
