//! Watch events and their wire form.

use crate::meta::{self, GroupVersionKind};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Event kinds on the watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Added => "ADDED",
            EventType::Modified => "MODIFIED",
            EventType::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed write, as seen by watchers.
///
/// Events are immutable once broadcast; the wire lines are rendered on
/// first use and shared by every subscriber.
#[derive(Debug)]
pub struct WatchEvent {
    pub gvk: GroupVersionKind,
    pub event_type: EventType,
    pub object: Arc<Value>,
    full_line: OnceCell<String>,
    meta_line: OnceCell<String>,
}

impl WatchEvent {
    pub fn new(gvk: GroupVersionKind, event_type: EventType, object: Arc<Value>) -> Self {
        WatchEvent {
            gvk,
            event_type,
            object,
            full_line: OnceCell::new(),
            meta_line: OnceCell::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        meta::namespace_of(&self.object)
    }

    pub fn resource_version(&self) -> Option<u64> {
        meta::resource_version_of(&self.object)
    }

    /// The newline-delimited JSON wire form carrying the full object.
    pub fn to_json_line(&self) -> &str {
        self.full_line.get_or_init(|| {
            let mut line = json!({
                "type": self.event_type.as_str(),
                "object": self.object.as_ref(),
            })
            .to_string();
            line.push('\n');
            line
        })
    }

    /// The wire form carrying only PartialObjectMetadata.
    pub fn to_metadata_json_line(&self) -> &str {
        self.meta_line.get_or_init(|| {
            let mut line = json!({
                "type": self.event_type.as_str(),
                "object": meta::partial_object_metadata(&self.object),
            })
            .to_string();
            line.push('\n');
            line
        })
    }
}
