//! Wire types of the Settings API v2

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A settings object as persisted by the exporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsObject {
    /// Opaque object identifier
    pub object_id: String,

    /// Schema-specific payload, never interpreted
    pub value: Value,
}

/// One entry of a list response
///
/// Fields are optional because the list call only returns what `fields=`
/// requested and a malformed entry must not fail the whole page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedObject {
    #[serde(default)]
    pub object_id: Option<String>,

    #[serde(default)]
    pub value: Option<Value>,
}

impl ListedObject {
    /// Object identifier, if present and non-empty
    pub fn id(&self) -> Option<&str> {
        self.object_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// One page of `GET /api/v2/settings/objects`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectsPage {
    #[serde(default)]
    pub items: Vec<ListedObject>,

    #[serde(default)]
    pub total_count: Option<u64>,

    #[serde(default)]
    pub page_size: Option<u64>,

    /// Cursor for the next page; absent on the last page
    #[serde(default)]
    pub next_page_key: Option<String>,
}

impl ObjectsPage {
    /// Cursor for the following page, ignoring empty keys
    pub fn next_key(&self) -> Option<&str> {
        self.next_page_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Request for one page of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// First page of a schema listing
    First {
        schema_id: String,
        page_size: Option<u32>,
    },
    /// Subsequent page; the API accepts no other parameter alongside the key
    Next { page_key: String },
}

/// Error body returned by Dynatrace APIs
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}
