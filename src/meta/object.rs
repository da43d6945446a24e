//! Accessors for the metadata block of an opaque object document.

use super::{GroupVersionKind, NamespacedName};
use crate::error::{Error, Result};
use serde_json::{json, Value};

/// Reads `apiVersion` + `kind` off a document.
pub fn gvk_of(obj: &Value) -> Option<GroupVersionKind> {
    let api_version = obj.get("apiVersion")?.as_str()?;
    let kind = obj.get("kind")?.as_str()?;
    Some(GroupVersionKind::from_api_version(api_version, kind))
}

/// Reads `metadata.namespace`/`metadata.name`. A missing name is an
/// unusable document, hence Option.
pub fn id_of(obj: &Value) -> Option<NamespacedName> {
    let meta = obj.get("metadata")?;
    let name = meta.get("name")?.as_str()?;
    let namespace = meta
        .get("namespace")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    Some(NamespacedName::new(namespace, name))
}

pub fn name_of(obj: &Value) -> &str {
    obj.pointer("/metadata/name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

pub fn namespace_of(obj: &Value) -> &str {
    obj.pointer("/metadata/namespace")
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

pub fn resource_version_of(obj: &Value) -> Option<u64> {
    obj.pointer("/metadata/resourceVersion")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}

pub fn uid_of(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/uid").and_then(|v| v.as_str())
}

pub fn generation_of(obj: &Value) -> u64 {
    obj.pointer("/metadata/generation")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

fn metadata_mut(obj: &mut Value) -> Result<&mut serde_json::Map<String, Value>> {
    let top = obj
        .as_object_mut()
        .ok_or_else(|| Error::validation("object document must be a JSON object".to_string()))?;
    let meta = top.entry("metadata").or_insert_with(|| json!({}));
    if !meta.is_object() {
        *meta = json!({});
    }
    meta.as_object_mut()
        .ok_or_else(|| Error::validation("metadata must be a JSON object".to_string()))
}

/// The version token is opaque to clients; it is stored as a decimal
/// string, as the emulated API does.
pub fn set_resource_version(obj: &mut Value, version: u64) -> Result<()> {
    metadata_mut(obj)?.insert(
        "resourceVersion".to_string(),
        Value::String(version.to_string()),
    );
    Ok(())
}

pub fn set_generation(obj: &mut Value, generation: u64) -> Result<()> {
    metadata_mut(obj)?.insert("generation".to_string(), json!(generation));
    Ok(())
}

/// Stamps the server-owned creation fields: uid, creationTimestamp and
/// generation 1. Called once, on create.
pub fn stamp_created(obj: &mut Value) -> Result<()> {
    let uid = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let meta = metadata_mut(obj)?;
    meta.insert("uid".to_string(), Value::String(uid));
    meta.insert("creationTimestamp".to_string(), Value::String(now));
    meta.insert("generation".to_string(), json!(1));
    Ok(())
}

/// Carries the immutable server-owned metadata of `prev` over into
/// `next` before an update is committed: uid, creationTimestamp, and
/// the generation counter (bumped when anything outside `.metadata`
/// changed).
pub fn carry_over_on_update(next: &mut Value, prev: &Value) -> Result<()> {
    let uid = uid_of(prev).map(str::to_string);
    let created = prev
        .pointer("/metadata/creationTimestamp")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let generation = generation_of(prev);

    let bump = non_metadata_changed(prev, next);
    let meta = metadata_mut(next)?;
    if let Some(uid) = uid {
        meta.insert("uid".to_string(), Value::String(uid));
    }
    if let Some(ts) = created {
        meta.insert("creationTimestamp".to_string(), Value::String(ts));
    }
    meta.insert(
        "generation".to_string(),
        json!(if bump { generation + 1 } else { generation }),
    );
    Ok(())
}

/// True if the documents differ anywhere other than `.metadata`.
fn non_metadata_changed(prev: &Value, next: &Value) -> bool {
    let keys: std::collections::BTreeSet<&str> = prev
        .as_object()
        .into_iter()
        .chain(next.as_object())
        .flat_map(|m| m.keys().map(String::as_str))
        .collect();
    keys.into_iter()
        .filter(|k| *k != "metadata")
        .any(|k| prev.get(k) != next.get(k))
}

/// Reads `metadata.managedFields`, if present.
pub fn managed_fields_of(obj: &Value) -> Option<&Vec<Value>> {
    obj.pointer("/metadata/managedFields").and_then(|v| v.as_array())
}

pub fn set_managed_fields(obj: &mut Value, entries: Vec<Value>) -> Result<()> {
    let meta = metadata_mut(obj)?;
    if entries.is_empty() {
        meta.remove("managedFields");
    } else {
        meta.insert("managedFields".to_string(), Value::Array(entries));
    }
    Ok(())
}

/// Strips `metadata.managedFields` off a clone of the document; the
/// merge machinery never sees its own bookkeeping.
pub fn without_managed_fields(obj: &Value) -> Value {
    let mut stripped = obj.clone();
    if let Some(meta) = stripped.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        meta.remove("managedFields");
    }
    stripped
}

/// The PartialObjectMetadata rendering used by metadata-only watches.
pub fn partial_object_metadata(obj: &Value) -> Value {
    json!({
        "apiVersion": "meta.k8s.io/v1",
        "kind": "PartialObjectMetadata",
        "metadata": obj.get("metadata").cloned().unwrap_or_else(|| json!({})),
    })
}
