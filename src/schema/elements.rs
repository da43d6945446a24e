//! Core schema elements.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema is a list of named types.
///
/// Types are indexed in a map before the first lookup, so a Schema
/// should be considered immutable once built.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeDef>,

    #[serde(skip)]
    type_map: OnceCell<HashMap<String, usize>>,
}

impl Clone for Schema {
    fn clone(&self) -> Self {
        Schema {
            types: self.types.clone(),
            type_map: OnceCell::new(),
        }
    }
}

/// TypeDef is a named type in a schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(flatten)]
    pub atom: Atom,
}

/// TypeRef either names a type in the schema or declares one inline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRef {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "namedType")]
    pub named_type: Option<String>,

    #[serde(flatten)]
    pub inlined: Box<Atom>,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef {
            named_type: Some(name.into()),
            inlined: Box::default(),
        }
    }

    /// True if neither a name nor an inline atom is present; such a
    /// reference carries no merge metadata at all.
    pub fn is_unspecified(&self) -> bool {
        self.named_type.is_none()
            && self.inlined.scalar.is_none()
            && self.inlined.list.is_none()
            && self.inlined.map.is_none()
    }
}

/// Atom is the smallest piece of the type system; exactly one of the
/// fields is normally set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Atom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<Scalar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<List>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<Map>,
}

impl Atom {
    pub fn is_scalar(&self) -> bool {
        self.scalar.is_some()
    }

    pub fn is_list(&self) -> bool {
        self.list.is_some()
    }

    pub fn is_map(&self) -> bool {
        self.map.is_some()
    }
}

/// Scalar types: a leaf with a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    Numeric,
    String,
    Boolean,
    Untyped,
}

/// ElementRelationship states how the elements of a container relate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementRelationship {
    /// Keyed list: elements are identified by the declared merge keys.
    Associative,
    /// The container behaves as a single leaf value.
    Atomic,
    /// No particular relationship (default for maps).
    #[default]
    Separable,
}

/// Map is both a struct (named fields) and a map of unknown fields
/// typed by `element_type`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Map {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<StructField>,

    #[serde(default, rename = "elementType")]
    pub element_type: TypeRef,

    #[serde(
        default,
        skip_serializing_if = "is_default_relationship",
        rename = "elementRelationship"
    )]
    pub element_relationship: ElementRelationship,

    #[serde(skip)]
    field_map: OnceCell<HashMap<String, usize>>,
}

impl Clone for Map {
    fn clone(&self) -> Self {
        Map {
            fields: self.fields.clone(),
            element_type: self.element_type.clone(),
            element_relationship: self.element_relationship,
            field_map: OnceCell::new(),
        }
    }
}

fn is_default_relationship(er: &ElementRelationship) -> bool {
    *er == ElementRelationship::Separable
}

/// StructField pairs a field name with its type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructField {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, rename = "type")]
    pub field_type: TypeRef,
}

/// List holds elements of one subtype; associative lists declare the
/// key fields identifying elements (the merge keys).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct List {
    #[serde(default, rename = "elementType")]
    pub element_type: TypeRef,

    #[serde(default, rename = "elementRelationship")]
    pub element_relationship: ElementRelationship,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn with_types(types: Vec<TypeDef>) -> Self {
        Schema {
            types,
            type_map: OnceCell::new(),
        }
    }

    /// Parses a schema from its YAML form.
    pub fn from_yaml(yaml: &str) -> Result<Schema, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Returns the named TypeDef, if it exists.
    pub fn find_named_type(&self, name: &str) -> Option<&TypeDef> {
        let map = self.type_map.get_or_init(|| {
            self.types
                .iter()
                .enumerate()
                .map(|(i, t)| (t.name.clone(), i))
                .collect()
        });
        map.get(name).map(|&i| &self.types[i])
    }

    /// Resolves a reference to the atom it denotes, named or inline.
    pub fn resolve<'a>(&'a self, tr: &'a TypeRef) -> Option<&'a Atom> {
        match tr.named_type {
            Some(ref name) => self.find_named_type(name).map(|t| &t.atom),
            None => {
                if tr.inlined.scalar.is_some()
                    || tr.inlined.list.is_some()
                    || tr.inlined.map.is_some()
                {
                    Some(&tr.inlined)
                } else {
                    None
                }
            }
        }
    }
}

impl Map {
    /// Returns the declared StructField, if any.
    pub fn find_field(&self, name: &str) -> Option<&StructField> {
        let map = self.field_map.get_or_init(|| {
            self.fields
                .iter()
                .enumerate()
                .map(|(i, f)| (f.name.clone(), i))
                .collect()
        });
        map.get(name).map(|&i| &self.fields[i])
    }

    /// The type to use for a field: its declaration, or the map's
    /// element type for unknown fields.
    pub fn field_type(&self, name: &str) -> &TypeRef {
        self.find_field(name)
            .map(|f| &f.field_type)
            .unwrap_or(&self.element_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"types:
- name: holder
  map:
    fields:
    - name: inline
      type:
        list:
          elementType:
            scalar: string
          elementRelationship: atomic
    - name: named
      type:
        namedType: item
- name: item
  map:
    fields:
    - name: name
      type:
        scalar: string
"#;

    #[test]
    fn test_resolve_named_and_inline() {
        let schema = Schema::from_yaml(SCHEMA).unwrap();
        let holder = schema.find_named_type("holder").unwrap();
        let map = holder.atom.map.as_ref().unwrap();

        let inline = schema.resolve(&map.find_field("inline").unwrap().field_type);
        assert!(inline.unwrap().is_list());

        let named = schema.resolve(&map.find_field("named").unwrap().field_type);
        assert!(named.unwrap().is_map());

        assert!(schema.resolve(&TypeRef::named("missing")).is_none());
        assert!(schema.resolve(&TypeRef::default()).is_none());
    }

    #[test]
    fn test_field_type_falls_back_to_element_type() {
        let schema = Schema::from_yaml(SCHEMA).unwrap();
        let item = schema.find_named_type("item").unwrap();
        let map = item.atom.map.as_ref().unwrap();

        assert!(!map.field_type("name").is_unspecified());
        assert!(map.field_type("unknown").is_unspecified());
    }

    #[test]
    fn test_element_relationship_serialization() {
        assert_eq!(
            serde_json::to_string(&ElementRelationship::Associative).unwrap(),
            "\"associative\""
        );
        assert_eq!(
            serde_json::to_string(&ElementRelationship::Atomic).unwrap(),
            "\"atomic\""
        );
    }
}
