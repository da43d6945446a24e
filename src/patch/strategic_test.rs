use super::*;
use crate::typed::ParseableType;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn map_fields_merge_and_scalars_overwrite() {
    let pt = ParseableType::builtin("ConfigMap");
    let live = json!({"data": {"a": "1", "b": "2"}});
    let patch = json!({"data": {"b": "changed", "c": "3"}});
    let out = strategic_merge(&pt, &live, &patch).unwrap();
    assert_eq!(out, json!({"data": {"a": "1", "b": "changed", "c": "3"}}));
}

#[test]
fn null_deletes_the_key() {
    let pt = ParseableType::builtin("ConfigMap");
    let live = json!({"data": {"a": "1", "b": "2"}});
    let patch = json!({"data": {"a": null}});
    let out = strategic_merge(&pt, &live, &patch).unwrap();
    assert_eq!(out, json!({"data": {"b": "2"}}));
}

#[test]
fn null_on_a_missing_key_is_harmless() {
    let pt = ParseableType::builtin("ConfigMap");
    let live = json!({"data": {"a": "1"}});
    let patch = json!({"data": {"ghost": null}});
    let out = strategic_merge(&pt, &live, &patch).unwrap();
    assert_eq!(out, json!({"data": {"a": "1"}}));
}

#[test]
fn keyed_list_elements_merge_in_place() {
    let pt = ParseableType::builtin("Pod");
    let live = json!({"spec": {"containers": [
        {"name": "web", "image": "nginx:1.25", "args": ["-q"]},
        {"name": "sidecar", "image": "envoy"},
    ]}});
    let patch = json!({"spec": {"containers": [
        {"name": "web", "image": "nginx:1.26"},
    ]}});
    let out = strategic_merge(&pt, &live, &patch).unwrap();
    assert_eq!(
        out["spec"]["containers"],
        json!([
            {"name": "web", "image": "nginx:1.26", "args": ["-q"]},
            {"name": "sidecar", "image": "envoy"},
        ])
    );
}

#[test]
fn unmatched_keyed_elements_are_appended() {
    let pt = ParseableType::builtin("Pod");
    let live = json!({"spec": {"containers": [{"name": "web", "image": "nginx"}]}});
    let patch = json!({"spec": {"containers": [{"name": "logger", "image": "fluentd"}]}});
    let out = strategic_merge(&pt, &live, &patch).unwrap();
    assert_eq!(out["spec"]["containers"].as_array().unwrap().len(), 2);
    assert_eq!(out["spec"]["containers"][1]["name"], json!("logger"));
}

#[test]
fn atomic_lists_replace_wholesale() {
    let pt = ParseableType::builtin("Pod");
    let live = json!({"spec": {"containers": [
        {"name": "web", "command": ["nginx", "-g", "daemon off;"]},
    ]}});
    let patch = json!({"spec": {"containers": [
        {"name": "web", "command": ["sleep"]},
    ]}});
    let out = strategic_merge(&pt, &live, &patch).unwrap();
    assert_eq!(out["spec"]["containers"][0]["command"], json!(["sleep"]));
}

#[test]
fn unknown_subtrees_merge_structurally() {
    // Pod status is declared untyped; objects still merge by key.
    let pt = ParseableType::builtin("Pod");
    let live = json!({"status": {"phase": "Pending", "hostIP": "10.0.0.1"}});
    let patch = json!({"status": {"phase": "Running"}});
    let out = strategic_merge(&pt, &live, &patch).unwrap();
    assert_eq!(
        out["status"],
        json!({"phase": "Running", "hostIP": "10.0.0.1"})
    );
}

#[test]
fn deduced_lists_replace_wholesale() {
    // The deduced schema declares its lists atomic, so replacement is
    // an explicit strategy here, not a fallback.
    let pt = ParseableType::deduced();
    let live = json!({"items": [1, 2, 3]});
    let patch = json!({"items": [9]});
    let out = strategic_merge(&pt, &live, &patch).unwrap();
    assert_eq!(out["items"], json!([9]));
}

#[test]
fn lists_without_a_declared_type_cannot_be_patched() {
    // "extra" is not a ConfigMap field, so the array has no merge
    // strategy to consult; the live object must come back untouched.
    let pt = ParseableType::builtin("ConfigMap");
    let live = json!({"extra": [{"id": 1}, {"id": 2}]});
    let patch = json!({"extra": [{"id": 3}]});
    let err = strategic_merge(&pt, &live, &patch).unwrap_err();
    assert!(err.to_string().contains("merge semantics"));
    assert_eq!(live["extra"], json!([{"id": 1}, {"id": 2}]));
}

#[test]
fn keyless_granular_lists_cannot_be_patched() {
    use crate::schema::{Schema, TypeRef};
    use std::sync::Arc;

    let schema = Schema::from_yaml(
        r#"types:
- name: holder
  map:
    fields:
    - name: items
      type:
        list:
          elementType:
            scalar: string
"#,
    )
    .unwrap();
    let pt = ParseableType::new(Arc::new(schema), TypeRef::named("holder"));

    let live = json!({"items": ["a"]});
    let patch = json!({"items": ["b"]});
    let err = strategic_merge(&pt, &live, &patch).unwrap_err();
    assert!(err.to_string().contains("merge keys"));
}

#[test]
fn fresh_subtrees_drop_null_markers() {
    let pt = ParseableType::builtin("ConfigMap");
    let live = json!({});
    let patch = json!({"data": {"a": "1", "b": null}});
    let out = strategic_merge(&pt, &live, &patch).unwrap();
    assert_eq!(out, json!({"data": {"a": "1"}}));
}
