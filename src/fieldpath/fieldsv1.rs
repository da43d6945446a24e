//! FieldsV1 encoding: the JSON form of a field path set persisted in
//! `metadata.managedFields[].fieldsV1`.
//!
//! Keys are prefixed by element kind (`f:` field, `k:` list key, `v:`
//! value, `i:` index); a `"."` entry marks a node that is itself owned
//! in addition to having owned children.

use super::path::{Path, PathElement};
use super::set::Set;
use crate::error::{Error, Result};
use serde_json::{Map, Value};

fn encode_element(pe: &PathElement) -> Result<String> {
    match pe {
        PathElement::FieldName(name) => Ok(format!("f:{}", name)),
        PathElement::Key(fields) => {
            let obj: Map<String, Value> =
                fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let json = serde_json::to_string(&Value::Object(obj))
                .map_err(|e| Error::validation(format!("cannot encode list key: {}", e)))?;
            Ok(format!("k:{}", json))
        }
        PathElement::Value(v) => {
            let json = serde_json::to_string(v)
                .map_err(|e| Error::validation(format!("cannot encode value element: {}", e)))?;
            Ok(format!("v:{}", json))
        }
        PathElement::Index(i) => Ok(format!("i:{}", i)),
    }
}

fn decode_element(s: &str) -> Result<PathElement> {
    let (prefix, content) = s
        .split_at_checked(2)
        .ok_or_else(|| Error::validation(format!("fieldsV1 key too short: {:?}", s)))?;

    match prefix {
        "f:" => Ok(PathElement::field_name(content)),
        "k:" => {
            let value: Value = serde_json::from_str(content)
                .map_err(|e| Error::validation(format!("bad fieldsV1 list key: {}", e)))?;
            let obj = value
                .as_object()
                .ok_or_else(|| Error::validation("fieldsV1 list key must be an object"))?;
            Ok(PathElement::key(
                obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ))
        }
        "v:" => {
            let value: Value = serde_json::from_str(content)
                .map_err(|e| Error::validation(format!("bad fieldsV1 value element: {}", e)))?;
            Ok(PathElement::Value(value))
        }
        "i:" => content
            .parse::<usize>()
            .map(PathElement::index)
            .map_err(|e| Error::validation(format!("bad fieldsV1 index: {}", e))),
        _ => Err(Error::validation(format!(
            "unknown fieldsV1 key prefix: {:?}",
            prefix
        ))),
    }
}

/// Encodes a set into its fieldsV1 JSON object.
pub fn set_to_fields_v1(set: &Set) -> Result<Value> {
    let mut out = Map::new();

    for member in set.members() {
        if !set.children().contains_key(member) {
            out.insert(encode_element(member)?, Value::Object(Map::new()));
        }
    }
    for (key, child) in set.children() {
        let mut encoded = match set_to_fields_v1(child)? {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        if set.members().binary_search(key).is_ok() {
            encoded.insert(".".to_string(), Value::Object(Map::new()));
        }
        out.insert(encode_element(key)?, Value::Object(encoded));
    }

    Ok(Value::Object(out))
}

/// Decodes a fieldsV1 JSON object back into a set.
pub fn set_from_fields_v1(value: &Value) -> Result<Set> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::validation("fieldsV1 must be a JSON object"))?;

    let mut set = Set::new();
    decode_into(obj, &mut Path::new(), &mut set)?;
    Ok(set)
}

fn decode_into(obj: &Map<String, Value>, prefix: &mut Path, set: &mut Set) -> Result<()> {
    for (key, val) in obj {
        if key == "." {
            // Ownership marker for the node itself; handled by the
            // parent level.
            continue;
        }
        let element = decode_element(key)?;
        let child = val
            .as_object()
            .ok_or_else(|| Error::validation("fieldsV1 nodes must be objects"))?;

        let is_leaf = child.is_empty();
        let owns_self = child.contains_key(".");

        if is_leaf || owns_self {
            let leaf = prefix.with(element.clone());
            set.insert(&leaf);
        }
        if !is_leaf {
            prefix.push(element);
            decode_into(child, prefix, set)?;
            prefix.pop();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldpath::field_path;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_round_trip_plain_fields() {
        let mut set = Set::new();
        set.insert(&field_path(["data", "foo2"]));
        set.insert(&field_path(["metadata", "labels", "app"]));

        let encoded = set_to_fields_v1(&set).unwrap();
        assert_eq!(
            encoded,
            json!({
                "f:data": {"f:foo2": {}},
                "f:metadata": {"f:labels": {"f:app": {}}},
            })
        );

        let decoded = set_from_fields_v1(&encoded).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_round_trip_list_keys() {
        let mut set = Set::new();
        set.insert(&Path::from_elements(vec![
            PathElement::field_name("containers"),
            PathElement::key(vec![("name".to_string(), json!("web"))]),
            PathElement::field_name("image"),
        ]));

        let encoded = set_to_fields_v1(&set).unwrap();
        assert_eq!(
            encoded,
            json!({"f:containers": {"k:{\"name\":\"web\"}": {"f:image": {}}}})
        );
        assert_eq!(set_from_fields_v1(&encoded).unwrap(), set);
    }

    #[test]
    fn test_self_ownership_marker() {
        let mut set = Set::new();
        set.insert(&field_path(["spec"]));
        set.insert(&field_path(["spec", "replicas"]));

        let encoded = set_to_fields_v1(&set).unwrap();
        assert_eq!(encoded, json!({"f:spec": {".": {}, "f:replicas": {}}}));
        assert_eq!(set_from_fields_v1(&encoded).unwrap(), set);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(set_from_fields_v1(&json!("nope")).is_err());
        assert!(set_from_fields_v1(&json!({"x:oops": {}})).is_err());
    }
}
