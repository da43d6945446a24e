use super::*;
use crate::fieldpath::{field_path, PathElement};
use pretty_assertions::assert_eq;
use serde_json::json;

fn pod(value: serde_json::Value) -> TypedValue {
    ParseableType::builtin("Pod")
        .from_value(value)
        .expect("test pod must validate")
}

#[test]
fn scalar_fields_take_the_right_side() {
    let lhs = pod(json!({"spec": {"restartPolicy": "Always", "nodeName": "a"}}));
    let rhs = pod(json!({"spec": {"restartPolicy": "Never"}}));
    let out = lhs.merge(&rhs).unwrap();
    assert_eq!(
        out.value(),
        &json!({"spec": {"restartPolicy": "Never", "nodeName": "a"}})
    );
}

#[test]
fn keyed_lists_merge_per_element() {
    let lhs = pod(json!({"spec": {"containers": [
        {"name": "web", "image": "nginx:1.25", "args": ["-g", "daemon off;"]},
        {"name": "sidecar", "image": "envoy"},
    ]}}));
    let rhs = pod(json!({"spec": {"containers": [
        {"name": "web", "image": "nginx:1.26"},
        {"name": "logger", "image": "fluentd"},
    ]}}));
    let out = lhs.merge(&rhs).unwrap();
    assert_eq!(
        out.value(),
        &json!({"spec": {"containers": [
            {"name": "web", "image": "nginx:1.26", "args": ["-g", "daemon off;"]},
            {"name": "sidecar", "image": "envoy"},
            {"name": "logger", "image": "fluentd"},
        ]}})
    );
}

#[test]
fn atomic_lists_are_replaced_wholesale() {
    let lhs = pod(json!({"spec": {"containers": [
        {"name": "web", "command": ["nginx", "-g", "daemon off;"]},
    ]}}));
    let rhs = pod(json!({"spec": {"containers": [
        {"name": "web", "command": ["sleep"]},
    ]}}));
    let out = lhs.merge(&rhs).unwrap();
    assert_eq!(
        out.value()["spec"]["containers"][0]["command"],
        json!(["sleep"])
    );
}

#[test]
fn multi_key_lists_match_on_all_keys() {
    let lhs = pod(json!({"spec": {"containers": [{"name": "web", "ports": [
        {"containerPort": 80, "protocol": "TCP", "name": "http"},
    ]}]}}));
    let rhs = pod(json!({"spec": {"containers": [{"name": "web", "ports": [
        {"containerPort": 80, "protocol": "UDP", "name": "quic"},
    ]}]}}));
    let out = lhs.merge(&rhs).unwrap();
    // Different protocol means a different element, so both survive.
    assert_eq!(
        out.value()["spec"]["containers"][0]["ports"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn validate_rejects_duplicate_list_keys() {
    let pt = ParseableType::builtin("Pod");
    let err = pt
        .from_value(json!({"spec": {"containers": [
            {"name": "web"},
            {"name": "web"},
        ]}}))
        .unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn validate_rejects_missing_key_fields() {
    let pt = ParseableType::builtin("Pod");
    assert!(pt
        .from_value(json!({"spec": {"containers": [{"image": "nginx"}]}}))
        .is_err());
}

#[test]
fn validate_rejects_wrong_scalar_kind() {
    let pt = ParseableType::builtin("ConfigMap");
    let err = pt.from_value(json!({"data": {"a": 7}})).unwrap_err();
    assert!(err.to_string().contains(".data.a"));
}

#[test]
fn unknown_metadata_fields_are_tolerated() {
    // objectMeta does not enumerate every metadata field; unknown ones
    // fall back to deduced handling rather than failing validation.
    let pt = ParseableType::builtin("ConfigMap");
    assert!(pt
        .from_value(json!({"metadata": {"name": "a", "finalizers": ["x"]}}))
        .is_ok());
}

#[test]
fn field_set_includes_keyed_element_positions() {
    let tv = pod(json!({"spec": {"containers": [
        {"name": "web", "image": "nginx"},
    ]}}));
    let set = tv.to_field_set().unwrap();

    let element = field_path(["spec", "containers"]).with(PathElement::key(vec![(
        "name".to_string(),
        json!("web"),
    )]));
    assert!(set.has(&element));
    assert!(set.has(&element.with(PathElement::field_name("image"))));
    assert!(!set.has(&field_path(["spec", "restartPolicy"])));
}

#[test]
fn field_set_treats_atomic_containers_as_leaves() {
    let tv = pod(json!({"spec": {"tolerations": [{"key": "a", "operator": "Exists"}]}}));
    let set = tv.to_field_set().unwrap();
    assert!(set.has(&field_path(["spec", "tolerations"])));
    assert!(!set.has(&field_path(["spec", "tolerations"]).with(PathElement::index(0))));
}

#[test]
fn compare_reports_added_modified_removed() {
    let lhs = pod(json!({"spec": {
        "restartPolicy": "Always",
        "nodeName": "a",
    }}));
    let rhs = pod(json!({"spec": {
        "restartPolicy": "Never",
        "containers": [{"name": "web"}],
    }}));
    let cmp = lhs.compare(&rhs).unwrap();

    assert!(cmp.modified.has(&field_path(["spec", "restartPolicy"])));
    assert!(cmp.removed.has(&field_path(["spec", "nodeName"])));
    assert!(cmp.added.has(&field_path(["spec", "containers"]).with(PathElement::key(vec![(
        "name".to_string(),
        json!("web"),
    )]))));
}

#[test]
fn compare_equal_documents_is_same() {
    let doc = json!({"spec": {"containers": [{"name": "web", "image": "nginx"}]}});
    let lhs = pod(doc.clone());
    let rhs = pod(doc);
    assert!(lhs.compare(&rhs).unwrap().is_same());
}

#[test]
fn remove_items_drops_fields_and_elements() {
    let tv = pod(json!({"spec": {
        "restartPolicy": "Always",
        "containers": [
            {"name": "web", "image": "nginx"},
            {"name": "sidecar", "image": "envoy"},
        ],
    }}));

    let mut doomed = crate::fieldpath::Set::new();
    doomed.insert(&field_path(["spec", "restartPolicy"]));
    doomed.insert(&field_path(["spec", "containers"]).with(PathElement::key(vec![(
        "name".to_string(),
        json!("sidecar"),
    )])));

    let out = tv.remove_items(&doomed);
    assert_eq!(
        out.value(),
        &json!({"spec": {"containers": [{"name": "web", "image": "nginx"}]}})
    );
}
