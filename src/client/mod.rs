//! Access to the Dynatrace Settings API v2
//!
//! [`SettingsApi`] is the seam between the export loop and the network.
//! [`HttpSettingsClient`] is the production implementation; tests supply their
//! own.

mod http;
mod types;

pub use http::HttpSettingsClient;
pub use types::{ListedObject, ObjectsPage, PageRequest, SettingsObject};

use crate::error::{Error, Result};
use log::debug;
use serde_json::Value;
use std::collections::HashSet;

/// Read-only operations the exporter needs from a Dynatrace environment
pub trait SettingsApi: Send {
    /// Environment URL used in messages
    fn base_url(&self) -> &str;

    /// Confirm the environment answers at all
    ///
    /// Any HTTP response counts as reachable; only transport failures
    /// (DNS, refused connection, TLS, timeout) return `Error::Unreachable`.
    fn check_reachable(&self) -> Result<()>;

    /// Fetch one page of a schema listing
    fn list_page(&self, request: &PageRequest) -> Result<ObjectsPage>;

    /// Fetch a single object by its identifier
    fn get_object(&self, object_id: &str) -> Result<Value>;

    /// List every object of a schema, following `nextPageKey` until exhausted
    ///
    /// Objects are returned in API order.
    fn list_objects(&self, schema_id: &str, page_size: Option<u32>) -> Result<Vec<ListedObject>> {
        let mut request = PageRequest::First {
            schema_id: schema_id.to_string(),
            page_size,
        };
        let mut seen_keys = HashSet::new();
        let mut items = Vec::new();

        loop {
            let page = self.list_page(&request)?;
            let next_key = page.next_key().map(str::to_string);
            items.extend(page.items);

            let Some(key) = next_key else {
                break;
            };
            if !seen_keys.insert(key.clone()) {
                return Err(Error::Decode {
                    url: self.base_url().to_string(),
                    reason: format!("pagination for '{schema_id}' repeated page key '{key}'"),
                });
            }
            debug!(
                "Schema {}: {} objects so far, fetching next page",
                schema_id,
                items.len()
            );
            request = PageRequest::Next { page_key: key };
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct PagedApi {
        pages: Vec<Value>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl SettingsApi for PagedApi {
        fn base_url(&self) -> &str {
            "https://env.example"
        }

        fn check_reachable(&self) -> Result<()> {
            Ok(())
        }

        fn list_page(&self, request: &PageRequest) -> Result<ObjectsPage> {
            let mut requests = self.requests.lock().unwrap();
            let index = requests.len();
            requests.push(request.clone());
            Ok(serde_json::from_value(self.pages[index].clone())?)
        }

        fn get_object(&self, _object_id: &str) -> Result<Value> {
            unreachable!()
        }
    }

    #[test]
    fn test_list_follows_pages_in_order() {
        let api = PagedApi {
            pages: vec![
                json!({"items": [{"objectId": "a"}, {"objectId": "b"}], "nextPageKey": "k1"}),
                json!({"items": [{"objectId": "c"}], "nextPageKey": "k2"}),
                json!({"items": [{"objectId": "d"}]}),
            ],
            requests: Mutex::new(Vec::new()),
        };

        let items = api.list_objects("builtin:alerting.profile", Some(2)).unwrap();
        let ids: Vec<_> = items.iter().filter_map(ListedObject::id).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);

        let requests = api.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![
                PageRequest::First {
                    schema_id: "builtin:alerting.profile".into(),
                    page_size: Some(2)
                },
                PageRequest::Next {
                    page_key: "k1".into()
                },
                PageRequest::Next {
                    page_key: "k2".into()
                },
            ]
        );
    }

    #[test]
    fn test_repeated_page_key_is_an_error() {
        let api = PagedApi {
            pages: vec![
                json!({"items": [{"objectId": "a"}], "nextPageKey": "same"}),
                json!({"items": [{"objectId": "b"}], "nextPageKey": "same"}),
            ],
            requests: Mutex::new(Vec::new()),
        };

        let err = api.list_objects("s", None).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
