//! Built-in type schemas, and the deduced schema for CRD-derived
//! types.

use super::elements::Schema;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Merge-type schemas for the kinds this server seeds at start.
///
/// Every top-level type embeds `objectMeta`; labels and annotations
/// are granular string maps, managedFields is atomic (the server owns
/// it wholesale). Pod is the one built-in with keyed lists, which is
/// what strategic merge exercises.
pub const BUILTIN_SCHEMA_YAML: &str = r#"types:
- name: objectMeta
  map:
    fields:
    - name: name
      type:
        scalar: string
    - name: namespace
      type:
        scalar: string
    - name: uid
      type:
        scalar: string
    - name: resourceVersion
      type:
        scalar: string
    - name: generation
      type:
        scalar: numeric
    - name: creationTimestamp
      type:
        scalar: string
    - name: labels
      type:
        map:
          elementType:
            scalar: string
    - name: annotations
      type:
        map:
          elementType:
            scalar: string
    - name: managedFields
      type:
        list:
          elementType:
            namedType: __untyped_atomic_
          elementRelationship: atomic
- name: ConfigMap
  map:
    fields:
    - name: apiVersion
      type:
        scalar: string
    - name: kind
      type:
        scalar: string
    - name: metadata
      type:
        namedType: objectMeta
    - name: data
      type:
        map:
          elementType:
            scalar: string
    - name: binaryData
      type:
        map:
          elementType:
            scalar: string
    - name: immutable
      type:
        scalar: boolean
- name: Secret
  map:
    fields:
    - name: apiVersion
      type:
        scalar: string
    - name: kind
      type:
        scalar: string
    - name: metadata
      type:
        namedType: objectMeta
    - name: type
      type:
        scalar: string
    - name: data
      type:
        map:
          elementType:
            scalar: string
    - name: stringData
      type:
        map:
          elementType:
            scalar: string
    - name: immutable
      type:
        scalar: boolean
- name: Pod
  map:
    fields:
    - name: apiVersion
      type:
        scalar: string
    - name: kind
      type:
        scalar: string
    - name: metadata
      type:
        namedType: objectMeta
    - name: spec
      type:
        namedType: podSpec
    - name: status
      type:
        namedType: __untyped_deduced_
- name: podSpec
  map:
    fields:
    - name: containers
      type:
        list:
          elementType:
            namedType: container
          elementRelationship: associative
          keys:
          - name
    - name: initContainers
      type:
        list:
          elementType:
            namedType: container
          elementRelationship: associative
          keys:
          - name
    - name: restartPolicy
      type:
        scalar: string
    - name: nodeName
      type:
        scalar: string
    - name: tolerations
      type:
        list:
          elementType:
            namedType: __untyped_atomic_
          elementRelationship: atomic
- name: container
  map:
    fields:
    - name: name
      type:
        scalar: string
    - name: image
      type:
        scalar: string
    - name: command
      type:
        list:
          elementType:
            scalar: string
          elementRelationship: atomic
    - name: args
      type:
        list:
          elementType:
            scalar: string
          elementRelationship: atomic
    - name: env
      type:
        list:
          elementType:
            namedType: envVar
          elementRelationship: associative
          keys:
          - name
    - name: ports
      type:
        list:
          elementType:
            namedType: containerPort
          elementRelationship: associative
          keys:
          - containerPort
          - protocol
- name: envVar
  map:
    fields:
    - name: name
      type:
        scalar: string
    - name: value
      type:
        scalar: string
- name: containerPort
  map:
    fields:
    - name: name
      type:
        scalar: string
    - name: containerPort
      type:
        scalar: numeric
    - name: protocol
      type:
        scalar: string
- name: Namespace
  map:
    fields:
    - name: apiVersion
      type:
        scalar: string
    - name: kind
      type:
        scalar: string
    - name: metadata
      type:
        namedType: objectMeta
    - name: spec
      type:
        namedType: __untyped_deduced_
    - name: status
      type:
        namedType: __untyped_deduced_
- name: CustomResourceDefinition
  map:
    fields:
    - name: apiVersion
      type:
        scalar: string
    - name: kind
      type:
        scalar: string
    - name: metadata
      type:
        namedType: objectMeta
    - name: spec
      type:
        namedType: crdSpec
- name: crdSpec
  map:
    fields:
    - name: group
      type:
        scalar: string
    - name: scope
      type:
        scalar: string
    - name: names
      type:
        map:
          elementType:
            scalar: string
    - name: versions
      type:
        list:
          elementType:
            namedType: crdVersion
          elementRelationship: associative
          keys:
          - name
- name: crdVersion
  map:
    fields:
    - name: name
      type:
        scalar: string
    - name: served
      type:
        scalar: boolean
    - name: storage
      type:
        scalar: boolean
- name: __untyped_atomic_
  scalar: untyped
  list:
    elementType:
      namedType: __untyped_atomic_
    elementRelationship: atomic
  map:
    elementType:
      namedType: __untyped_atomic_
    elementRelationship: atomic
- name: __untyped_deduced_
  scalar: untyped
  list:
    elementType:
      namedType: __untyped_atomic_
    elementRelationship: atomic
  map:
    elementType:
      namedType: __untyped_deduced_
    elementRelationship: separable
"#;

static BUILTIN_SCHEMA: Lazy<Arc<Schema>> = Lazy::new(|| {
    Arc::new(Schema::from_yaml(BUILTIN_SCHEMA_YAML).expect("built-in schema must parse"))
});

/// The parsed built-in schema (parsed once, shared).
pub fn builtin_schema() -> &'static Arc<Schema> {
    &BUILTIN_SCHEMA
}

/// Name of the deduced type used for CRD-derived kinds: untyped
/// separable maps, so apply works without a registered OpenAPI shape
/// while lists stay atomic.
pub fn deduced_type_name() -> &'static str {
    "__untyped_deduced_"
}
