//! Blocking HTTP implementation of [`SettingsApi`]

use super::SettingsApi;
use super::types::{ErrorEnvelope, ObjectsPage, PageRequest};
use crate::config::{Credentials, ExportConfig};
use crate::error::{Error, Result};
use crate::storage::StorageBackend;
use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const OBJECTS_PATH: [&str; 4] = ["api", "v2", "settings", "objects"];
const SCHEMAS_PATH: [&str; 4] = ["api", "v2", "settings", "schemas"];
const LIST_FIELDS: &str = "objectId,value";

/// Longest error body echoed into an error message
const MAX_ERROR_BODY: usize = 200;

/// Settings API client backed by `reqwest::blocking`
#[derive(Debug, Clone)]
pub struct HttpSettingsClient {
    client: Client,
    base_url: Url,
    display_url: String,
}

impl HttpSettingsClient {
    /// Create a client for an environment
    ///
    /// The token is sent on every request as `Authorization: Api-Token <token>`.
    pub fn new(
        credentials: &Credentials,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Api-Token {}", credentials.api_token))
            .map_err(|_| Error::Config("API token contains invalid header characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: credentials.base_url.clone(),
            display_url: credentials.display_url().to_string(),
        })
    }

    /// Create a client using the timeouts of an export configuration
    pub fn from_config<S: StorageBackend>(config: &ExportConfig<S>) -> Result<Self> {
        Self::new(&config.credentials, config.timeout, config.connect_timeout)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl {
                url: self.display_url.clone(),
                reason: "cannot be used as a base URL".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn page_url(&self, request: &PageRequest) -> Result<Url> {
        let mut url = self.endpoint(&OBJECTS_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            match request {
                PageRequest::First {
                    schema_id,
                    page_size,
                } => {
                    query
                        .append_pair("schemaIds", schema_id)
                        .append_pair("fields", LIST_FIELDS);
                    if let Some(size) = page_size {
                        query.append_pair("pageSize", &size.to_string());
                    }
                }
                PageRequest::Next { page_key } => {
                    query.append_pair("nextPageKey", page_key);
                }
            }
        }
        Ok(url)
    }

    fn object_url(&self, object_id: &str) -> Result<Url> {
        let mut segments = OBJECTS_PATH.to_vec();
        segments.push(object_id);
        self.endpoint(&segments)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {url}");
        let url_string = url.to_string();

        let response = self.client.get(url).send().map_err(|e| Error::Http {
            url: url_string.clone(),
            source: e,
        })?;
        let response = check_status(response, &url_string)?;

        response.json::<T>().map_err(|e| Error::Decode {
            url: url_string,
            reason: e.to_string(),
        })
    }
}

/// Turn a non-success response into `Error::Api`
fn check_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        url: url.to_string(),
        message: error_message(&body, status.canonical_reason()),
    })
}

/// Extract the most useful message from an error body
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = envelope.error.message.filter(|m| !m.is_empty())
    {
        return message;
    }

    let body = body.trim();
    if body.is_empty() {
        return reason.unwrap_or("request failed").to_string();
    }
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

impl SettingsApi for HttpSettingsClient {
    fn base_url(&self) -> &str {
        &self.display_url
    }

    fn check_reachable(&self) -> Result<()> {
        let url = self.endpoint(&SCHEMAS_PATH)?;
        debug!("HEAD {url}");

        let response = self.client.head(url).send().map_err(|e| Error::Unreachable {
            url: self.display_url.clone(),
            source: e,
        })?;
        debug!("Environment answered with {}", response.status());
        Ok(())
    }

    fn list_page(&self, request: &PageRequest) -> Result<ObjectsPage> {
        let url = self.page_url(request)?;
        self.get_json(url)
    }

    fn get_object(&self, object_id: &str) -> Result<Value> {
        let url = self.object_url(object_id)?;
        self.get_json(url)
    }
}
