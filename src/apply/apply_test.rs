use super::*;
use crate::fieldpath::field_path;
use crate::typed::{ParseableType, TypedValue};
use pretty_assertions::assert_eq;
use serde_json::json;

fn config_map(value: serde_json::Value) -> TypedValue {
    ParseableType::builtin("ConfigMap")
        .from_value(value)
        .expect("test object must validate")
}

#[test]
fn first_apply_takes_ownership() {
    let updater = Updater::with_time("2024-01-01T00:00:00Z");
    let live = config_map(json!({}));
    let config = config_map(json!({"data": {"a": "1", "b": "2"}}));
    let mut managers = ManagedFields::new();

    let out = updater
        .apply(&live, &config, "v1", &mut managers, "deployer", false)
        .unwrap()
        .expect("first apply must change the object");

    assert_eq!(out.value(), &json!({"data": {"a": "1", "b": "2"}}));
    let entry = managers.get("deployer").unwrap();
    assert_eq!(entry.operation, Operation::Apply);
    assert!(entry.set.has(&field_path(["data", "a"])));
    assert_eq!(entry.time.as_deref(), Some("2024-01-01T00:00:00Z"));
}

#[test]
fn reapplying_the_same_config_is_a_noop() {
    let updater = Updater::new();
    let live = config_map(json!({}));
    let config = config_map(json!({"data": {"a": "1"}}));
    let mut managers = ManagedFields::new();

    let applied = updater
        .apply(&live, &config, "v1", &mut managers, "deployer", false)
        .unwrap()
        .unwrap();

    let again = updater
        .apply(&applied, &config, "v1", &mut managers, "deployer", false)
        .unwrap();
    assert!(again.is_none());
}

#[test]
fn dropped_fields_are_pruned() {
    let updater = Updater::new();
    let live = config_map(json!({}));
    let mut managers = ManagedFields::new();

    let full = config_map(json!({"data": {"a": "1", "b": "2"}}));
    let applied = updater
        .apply(&live, &full, "v1", &mut managers, "deployer", false)
        .unwrap()
        .unwrap();

    let narrowed = config_map(json!({"data": {"a": "1"}}));
    let out = updater
        .apply(&applied, &narrowed, "v1", &mut managers, "deployer", false)
        .unwrap()
        .unwrap();

    assert_eq!(out.value(), &json!({"data": {"a": "1"}}));
    assert!(!managers.get("deployer").unwrap().set.has(&field_path(["data", "b"])));
}

#[test]
fn dropped_fields_survive_when_co_owned() {
    let updater = Updater::new();
    let live = config_map(json!({}));
    let mut managers = ManagedFields::new();

    let applied = updater
        .apply(
            &live,
            &config_map(json!({"data": {"a": "1", "b": "2"}})),
            "v1",
            &mut managers,
            "alpha",
            false,
        )
        .unwrap()
        .unwrap();

    // A second manager applies the same value of data.b, sharing it.
    let applied = updater
        .apply(
            &applied,
            &config_map(json!({"data": {"b": "2"}})),
            "v1",
            &mut managers,
            "beta",
            false,
        )
        .unwrap()
        .unwrap();

    // Alpha drops data.b, but beta still owns it.
    let out = updater
        .apply(
            &applied,
            &config_map(json!({"data": {"a": "1"}})),
            "v1",
            &mut managers,
            "alpha",
            false,
        )
        .unwrap()
        .unwrap();

    assert_eq!(out.value(), &json!({"data": {"a": "1", "b": "2"}}));
}

#[test]
fn changing_a_foreign_field_conflicts() {
    let updater = Updater::new();
    let live = config_map(json!({}));
    let mut managers = ManagedFields::new();

    let applied = updater
        .apply(
            &live,
            &config_map(json!({"data": {"a": "1"}})),
            "v1",
            &mut managers,
            "alpha",
            false,
        )
        .unwrap()
        .unwrap();

    let err = updater
        .apply(
            &applied,
            &config_map(json!({"data": {"a": "changed"}})),
            "v1",
            &mut managers,
            "beta",
            false,
        )
        .unwrap_err();

    assert!(err.is_conflict());
    assert!(err.to_string().contains("alpha"));
    // The failed apply must not leave a record for beta behind.
    assert!(managers.get("beta").is_none());
}

#[test]
fn force_apply_transfers_ownership() {
    let updater = Updater::new();
    let live = config_map(json!({}));
    let mut managers = ManagedFields::new();

    let applied = updater
        .apply(
            &live,
            &config_map(json!({"data": {"a": "1"}})),
            "v1",
            &mut managers,
            "alpha",
            false,
        )
        .unwrap()
        .unwrap();

    let out = updater
        .apply(
            &applied,
            &config_map(json!({"data": {"a": "changed"}})),
            "v1",
            &mut managers,
            "beta",
            true,
        )
        .unwrap()
        .unwrap();

    assert_eq!(out.value(), &json!({"data": {"a": "changed"}}));
    assert!(managers.get("beta").unwrap().set.has(&field_path(["data", "a"])));
    // Alpha lost its only field and its record with it.
    assert!(managers.get("alpha").is_none());
}

#[test]
fn applying_the_same_value_shares_without_conflict() {
    let updater = Updater::new();
    let live = config_map(json!({}));
    let mut managers = ManagedFields::new();

    let applied = updater
        .apply(
            &live,
            &config_map(json!({"data": {"a": "1"}})),
            "v1",
            &mut managers,
            "alpha",
            false,
        )
        .unwrap()
        .unwrap();

    // Same value, no conflict, both own it afterwards.
    updater
        .apply(
            &applied,
            &config_map(json!({"data": {"a": "1"}})),
            "v1",
            &mut managers,
            "beta",
            false,
        )
        .unwrap();

    assert!(managers.get("alpha").unwrap().set.has(&field_path(["data", "a"])));
    assert!(managers.get("beta").unwrap().set.has(&field_path(["data", "a"])));
}

#[test]
fn plain_update_takes_changed_fields_without_conflict() {
    let updater = Updater::new();
    let mut managers = ManagedFields::new();
    let live = config_map(json!({}));

    let applied = updater
        .apply(
            &live,
            &config_map(json!({"data": {"a": "1"}})),
            "v1",
            &mut managers,
            "alpha",
            false,
        )
        .unwrap()
        .unwrap();

    let new = config_map(json!({"data": {"a": "edited", "b": "2"}}));
    updater
        .update(&applied, &new, "v1", &mut managers, "editor")
        .unwrap();

    let editor = managers.get("editor").unwrap();
    assert_eq!(editor.operation, Operation::Update);
    assert!(editor.set.has(&field_path(["data", "a"])));
    assert!(editor.set.has(&field_path(["data", "b"])));
    // Alpha's claim on the edited field is gone.
    assert!(managers.get("alpha").is_none());
}

#[test]
fn keyed_list_elements_are_owned_per_element() {
    let updater = Updater::new();
    let mut managers = ManagedFields::new();
    let pt = ParseableType::builtin("Pod");
    let live = pt.from_value(json!({})).unwrap();

    let applied = updater
        .apply(
            &live,
            &pt.from_value(json!({"spec": {"containers": [
                {"name": "web", "image": "nginx"},
            ]}}))
                .unwrap(),
            "v1",
            &mut managers,
            "alpha",
            false,
        )
        .unwrap()
        .unwrap();

    // A second manager adds its own element; no conflict.
    let out = updater
        .apply(
            &applied,
            &pt.from_value(json!({"spec": {"containers": [
                {"name": "sidecar", "image": "envoy"},
            ]}}))
                .unwrap(),
            "v1",
            &mut managers,
            "beta",
            false,
        )
        .unwrap()
        .unwrap();

    assert_eq!(
        out.value()["spec"]["containers"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}
