//! # memkube
//!
//! An in-memory emulation of the Kubernetes API server data plane.
//!
//! Objects are opaque `serde_json::Value` documents stored per
//! resource, versioned by one shared monotonic clock. Writes broadcast
//! to watchers synchronously, so a watch started from a list snapshot
//! observes every later write exactly once and in order. Patching
//! understands the same merge schemas Kubernetes uses: strategic merge
//! over declared merge keys, and server-side apply with per-manager
//! field ownership and conflict detection.
//!
//! ## Modules
//!
//! - [`schema`] - Merge-type schema language plus the built-in type schemas
//! - [`fieldpath`] - Field paths, field sets, and the fieldsV1 wire form
//! - [`typed`] - Validation, comparison and merging of documents under a schema
//! - [`apply`] - Server-side apply: managers, conflicts, pruning
//! - [`patch`] - Strategic merge patch and the patch request surface
//! - [`store`] - Versioned object storage and watch broadcast
//! - [`registry`] - Served types, including CRD-driven registration
//! - [`admission`] - Mutating webhook matching and round trip
//! - [`server`] - The `ApiServer` facade over all of the above

pub mod admission;
pub mod apply;
pub mod clock;
pub mod error;
pub mod fieldpath;
pub mod meta;
pub mod patch;
pub mod registry;
pub mod schema;
pub mod server;
pub mod store;
pub mod typed;

pub use apply::{Conflict, Conflicts, ManagedFields, Updater};
pub use clock::ResourceVersionClock;
pub use error::{Error, Result};
pub use fieldpath::{Path, PathElement, Set as FieldPathSet};
pub use meta::{GroupResource, GroupVersionKind, NamespacedName, ResourceScope};
pub use patch::{PatchOutcome, PatchRequest};
pub use registry::TypeRegistry;
pub use schema::Schema;
pub use server::ApiServer;
pub use store::{EventType, ResourceStore, SharedWatchHook, WatchEvent, WatchOptions};
pub use typed::{Comparison, ParseableType, TypedValue};
