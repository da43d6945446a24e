//! Patch surface: strategic merge patches and server-side apply
//! requests, plus the outcome type shared by both.

mod strategic;

#[cfg(test)]
mod strategic_test;

pub use strategic::strategic_merge;

use serde_json::Value;

/// A patch submitted against one object.
#[derive(Debug, Clone)]
pub enum PatchRequest {
    /// Schema-aware merge patch: maps merge, nulls delete, keyed
    /// lists merge per element.
    StrategicMerge(Value),
    /// Server-side apply of a full intent document on behalf of a
    /// field manager.
    Apply {
        config: Value,
        field_manager: String,
        force: bool,
    },
}

/// What a patch did to the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The object changed; holds the new stored form.
    Changed(Value),
    /// The patch was a no-op; the object and its version are
    /// untouched.
    Unchanged,
}

impl PatchOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, PatchOutcome::Unchanged)
    }
}
