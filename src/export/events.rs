//! Progress events emitted during an export
//!
//! The exporter never prints. Front-ends register listeners and render the
//! events however they like.

use super::types::{ExportSummary, ObjectFailure, SchemaOutcome};
use std::path::Path;
use std::sync::Arc;

/// Something that happened during an export run
#[derive(Debug, Clone, Copy)]
pub enum ExportEvent<'a> {
    /// Preflight passed and the output root exists
    Started {
        base_url: &'a str,
        schema_count: usize,
        output_dir: &'a Path,
    },

    /// A schema is about to be listed
    SchemaStarted { schema_id: &'a str },

    /// Listing finished (all pages)
    SchemaListed { schema_id: &'a str, count: usize },

    /// Object `index` of `total` (1-based) was written
    ObjectSaved {
        schema_id: &'a str,
        object_id: &'a str,
        path: &'a Path,
        index: usize,
        total: usize,
    },

    /// Object `index` of `total` (1-based) could not be exported
    ObjectFailed {
        failure: &'a ObjectFailure,
        index: usize,
        total: usize,
    },

    /// A schema is done, successfully or not
    SchemaFinished { outcome: &'a SchemaOutcome },

    /// `manifest.json` was written
    ManifestWritten { path: &'a Path },

    /// The run is over
    Finished { summary: &'a ExportSummary },
}

/// Type alias for an event callback
pub type EventCallback = Arc<dyn Fn(&ExportEvent<'_>) + Send + Sync>;

/// Holds the listeners of an exporter
#[derive(Clone, Default)]
pub struct EventManager {
    listeners: Vec<EventCallback>,
}

impl EventManager {
    /// Create an event manager without listeners
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, called for every event in registration order
    pub fn on_event<F>(&mut self, callback: F)
    where
        F: Fn(&ExportEvent<'_>) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(callback));
    }

    /// Deliver an event to all listeners
    pub fn emit(&self, event: &ExportEvent<'_>) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// No listener registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Remove all listeners
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
