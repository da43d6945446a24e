//! Field ownership bookkeeping, and its wire form in
//! `metadata.managedFields`.

use crate::error::{Error, Result};
use crate::fieldpath::{set_from_fields_v1, set_to_fields_v1, Set};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

/// The operation a manager last used on its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Apply,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Apply => write!(f, "Apply"),
            Operation::Update => write!(f, "Update"),
        }
    }
}

/// One manager's ownership record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFields {
    pub operation: Operation,
    pub api_version: String,
    pub time: Option<String>,
    pub set: Set,
}

/// All managers' ownership records for one object, keyed by manager
/// name. The BTreeMap keeps the wire form deterministically ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedFields {
    entries: BTreeMap<String, OwnedFields>,
}

impl ManagedFields {
    pub fn new() -> Self {
        ManagedFields::default()
    }

    pub fn get(&self, manager: &str) -> Option<&OwnedFields> {
        self.entries.get(manager)
    }

    pub fn insert(&mut self, manager: impl Into<String>, entry: OwnedFields) {
        self.entries.insert(manager.into(), entry);
    }

    pub fn remove(&mut self, manager: &str) -> Option<OwnedFields> {
        self.entries.remove(manager)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OwnedFields)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops managers whose field set has become empty.
    pub fn remove_empty(&mut self) {
        self.entries.retain(|_, entry| !entry.set.is_empty());
    }

    /// Parses the `metadata.managedFields` array of an object. A
    /// missing array means no tracked ownership.
    pub fn from_object(object: &Value) -> Result<ManagedFields> {
        let mut managed = ManagedFields::new();
        let entries = match object.pointer("/metadata/managedFields") {
            Some(Value::Array(entries)) => entries,
            Some(other) if !other.is_null() => {
                return Err(Error::validation("managedFields must be a list".to_string()))
            }
            _ => return Ok(managed),
        };

        for entry in entries {
            let manager = entry
                .get("manager")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::validation("managedFields entry is missing manager".to_string())
                })?;
            let operation = match entry.get("operation").and_then(Value::as_str) {
                Some("Apply") => Operation::Apply,
                Some("Update") | None => Operation::Update,
                Some(other) => {
                    return Err(Error::validation(format!(
                        "unknown managedFields operation {:?}",
                        other
                    )))
                }
            };
            let set = match entry.get("fieldsV1") {
                Some(fields) => set_from_fields_v1(fields)?,
                None => Set::new(),
            };
            managed.insert(
                manager.to_string(),
                OwnedFields {
                    operation,
                    api_version: entry
                        .get("apiVersion")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    time: entry
                        .get("time")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    set,
                },
            );
        }
        Ok(managed)
    }

    /// Encodes ownership back into the `metadata.managedFields` wire
    /// form.
    pub fn to_wire(&self) -> Result<Value> {
        let mut entries = Vec::with_capacity(self.entries.len());
        for (manager, entry) in &self.entries {
            let mut wire = json!({
                "manager": manager,
                "operation": entry.operation.to_string(),
                "apiVersion": entry.api_version,
                "fieldsType": "FieldsV1",
                "fieldsV1": set_to_fields_v1(&entry.set)?,
            });
            if let Some(time) = &entry.time {
                wire["time"] = json!(time);
            }
            entries.push(wire);
        }
        Ok(Value::Array(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldpath::field_path;
    use pretty_assertions::assert_eq;

    #[test]
    fn wire_round_trip_preserves_ownership() {
        let mut set = Set::new();
        set.insert(&field_path(["data", "a"]));
        set.insert(&field_path(["data", "b"]));

        let mut managed = ManagedFields::new();
        managed.insert(
            "kubectl",
            OwnedFields {
                operation: Operation::Apply,
                api_version: "v1".to_string(),
                time: Some("2024-01-01T00:00:00Z".to_string()),
                set,
            },
        );

        let object = serde_json::json!({"metadata": {"managedFields": managed.to_wire().unwrap()}});
        let parsed = ManagedFields::from_object(&object).unwrap();
        assert_eq!(parsed, managed);
    }

    #[test]
    fn missing_managed_fields_is_empty() {
        let object = serde_json::json!({"metadata": {"name": "x"}});
        assert!(ManagedFields::from_object(&object).unwrap().is_empty());
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let object = serde_json::json!({"metadata": {"managedFields": [
            {"manager": "m", "operation": "Delete"},
        ]}});
        assert!(ManagedFields::from_object(&object).is_err());
    }
}
