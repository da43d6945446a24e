//! Strategic merge patch: a merge-patch dialect that understands the
//! merge schema, so keyed lists patch per element instead of being
//! replaced.

use crate::error::{Error, Result};
use crate::fieldpath::{cmp_value, Path, PathElement};
use crate::schema::{ElementRelationship, List, Schema, TypeRef};
use crate::typed::ParseableType;
use serde_json::Value;
use std::cmp::Ordering;

/// Applies `patch` to `live` under the descriptor's type.
///
/// Nulls in the patch delete the corresponding key. Keyed lists merge
/// per merge key with unmatched patch elements appended; lists
/// declared atomic are replaced wholesale. A list that declares
/// neither, or whose path has no list type at all, cannot be patched
/// strategically and fails validation, leaving the live object
/// untouched.
pub fn strategic_merge(descriptor: &ParseableType, live: &Value, patch: &Value) -> Result<Value> {
    merge(
        descriptor.schema().as_ref(),
        descriptor.type_ref(),
        live,
        patch,
        &Path::new(),
    )
}

fn merge(schema: &Schema, tr: &TypeRef, live: &Value, patch: &Value, path: &Path) -> Result<Value> {
    if patch.is_null() {
        return Ok(Value::Null);
    }

    match (live, patch) {
        (Value::Object(l), Value::Object(p)) => {
            let resolved = schema.resolve(tr);
            let map = resolved.and_then(|atom| atom.map.as_ref());
            if let Some(map) = map {
                if map.element_relationship == ElementRelationship::Atomic {
                    return Ok(patch.clone());
                }
            }
            if map.is_none() {
                tracing::warn!(%path, "no map type at patched path, merging structurally");
            }

            let unspecified = TypeRef::default();
            let mut out = l.clone();
            for (key, pv) in p {
                if pv.is_null() {
                    out.remove(key);
                    continue;
                }
                let field_tr = map.map(|m| m.field_type(key)).unwrap_or(&unspecified);
                let field_path = path.with(PathElement::field_name(key.clone()));
                let merged = match l.get(key) {
                    Some(lv) => merge(schema, field_tr, lv, pv, &field_path)?,
                    None => strip_nulls(pv),
                };
                out.insert(key.clone(), merged);
            }
            Ok(Value::Object(out))
        }
        (Value::Array(l), Value::Array(p)) => {
            match schema.resolve(tr).and_then(|atom| atom.list.as_ref()) {
                Some(list) => merge_list(schema, list, l, p, path),
                // A list with no declared merge semantics at all is
                // never replaced behind the caller's back.
                None => Err(Error::validation(format!(
                    "list at {} has no declared merge semantics and cannot be patched strategically",
                    path
                ))),
            }
        }
        _ => Ok(patch.clone()),
    }
}

fn merge_list(
    schema: &Schema,
    list: &List,
    live: &[Value],
    patch: &[Value],
    path: &Path,
) -> Result<Value> {
    match list.element_relationship {
        ElementRelationship::Atomic => Ok(Value::Array(patch.to_vec())),
        ElementRelationship::Associative if !list.keys.is_empty() => {
            let mut out: Vec<Value> = live.to_vec();
            for pv in patch {
                let p_obj = pv.as_object().ok_or_else(|| {
                    Error::validation(format!(
                        "strategic merge patch at {} requires object list items",
                        path
                    ))
                })?;
                let matched = out.iter().position(|lv| {
                    lv.as_object().is_some_and(|l_obj| {
                        list.keys.iter().all(|key| {
                            match (l_obj.get(key), p_obj.get(key)) {
                                (Some(a), Some(b)) => cmp_value(a, b) == Ordering::Equal,
                                _ => false,
                            }
                        })
                    })
                });
                match matched {
                    Some(i) => {
                        let element_path = path.with(PathElement::index(i));
                        out[i] = merge(schema, &list.element_type, &out[i], pv, &element_path)?;
                    }
                    None => out.push(strip_nulls(pv)),
                }
            }
            Ok(Value::Array(out))
        }
        ElementRelationship::Associative => {
            // A set list: patch elements are added when absent.
            let mut out: Vec<Value> = live.to_vec();
            for pv in patch {
                if !out.iter().any(|lv| cmp_value(lv, pv) == Ordering::Equal) {
                    out.push(pv.clone());
                }
            }
            Ok(Value::Array(out))
        }
        ElementRelationship::Separable => Err(Error::validation(format!(
            "list at {} has no merge keys and cannot be patched strategically",
            path
        ))),
    }
}

/// Removes null-valued keys from a patch subtree being inserted as a
/// fresh value. Nulls are deletion markers and must not be stored.
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        _ => value.clone(),
    }
}
