//! TypedValue: an object document paired with its merge schema.

use super::comparison::Comparison;
use crate::error::{Error, Result};
use crate::fieldpath::{cmp_value, Path, PathElement, Set};
use crate::schema::{Atom, ElementRelationship, List, Map as SchemaMap, Scalar, Schema, TypeRef};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a value is treated at one level of the walk.
enum Shape<'a> {
    /// A leaf: scalar, or a container declared atomic.
    Leaf,
    List(&'a List),
    Map(&'a SchemaMap),
    /// No usable type metadata: objects granular, everything else a
    /// leaf (the deduced rules).
    Deduced,
}

/// A document paired with the schema and type it is interpreted under.
#[derive(Debug, Clone)]
pub struct TypedValue {
    value: Value,
    type_ref: TypeRef,
    schema: Arc<Schema>,
}

impl TypedValue {
    pub fn new(value: Value, schema: Arc<Schema>, type_ref: TypeRef) -> Self {
        TypedValue {
            value,
            type_ref,
            schema,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    /// Resolves how `value` is to be treated under `tr`. An atom can
    /// declare several possibilities (the untyped helper types do);
    /// the value's own shape picks the branch.
    fn shape<'a>(&'a self, tr: &'a TypeRef, value: &Value) -> Shape<'a> {
        let atom = match self.schema.resolve(tr) {
            Some(atom) => atom,
            None => return Shape::Deduced,
        };
        self.shape_of_atom(atom, value)
    }

    fn shape_of_atom<'a>(&'a self, atom: &'a Atom, value: &Value) -> Shape<'a> {
        if value.is_array() {
            if let Some(list) = &atom.list {
                return match list.element_relationship {
                    ElementRelationship::Atomic => Shape::Leaf,
                    _ => Shape::List(list),
                };
            }
        }
        if value.is_object() {
            if let Some(map) = &atom.map {
                return match map.element_relationship {
                    ElementRelationship::Atomic => Shape::Leaf,
                    _ => Shape::Map(map),
                };
            }
        }
        if atom.scalar.is_some() {
            return Shape::Leaf;
        }
        // Value shape does not match any declared branch; the walkers
        // surface this as a validation error where it matters.
        match (&atom.list, &atom.map) {
            (Some(list), _) => Shape::List(list),
            (_, Some(map)) => Shape::Map(map),
            _ => Shape::Deduced,
        }
    }

    /// Validates the document against its schema: scalar kinds, list
    /// and map shapes, associative-list keys present and unique.
    pub fn validate(&self) -> Result<()> {
        self.validate_value(&self.value, &self.type_ref, &Path::new())
    }

    fn validate_value(&self, value: &Value, tr: &TypeRef, path: &Path) -> Result<()> {
        match self.shape(tr, value) {
            Shape::Deduced => Ok(()),
            Shape::Leaf => {
                if let Some(atom) = self.schema.resolve(tr) {
                    if let Some(scalar) = atom.scalar {
                        if atom.list.is_none() && atom.map.is_none() {
                            return validate_scalar(value, scalar, path);
                        }
                    }
                }
                Ok(())
            }
            Shape::List(list) => {
                let items = match value {
                    Value::Null => return Ok(()),
                    Value::Array(items) => items,
                    _ => {
                        return Err(Error::validation(format!(
                            "expected list at {}, got {}",
                            path,
                            type_name(value)
                        )))
                    }
                };
                let mut seen: Vec<PathElement> = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    let pe = self.element_of(item, list, i)?;
                    if list.element_relationship == ElementRelationship::Associative {
                        if seen.contains(&pe) {
                            return Err(Error::validation(format!(
                                "duplicate list key at {}{}",
                                path, pe
                            )));
                        }
                        seen.push(pe.clone());
                    }
                    self.validate_value(item, &list.element_type, &path.with(pe))?;
                }
                Ok(())
            }
            Shape::Map(map) => {
                let fields = match value {
                    Value::Null => return Ok(()),
                    Value::Object(fields) => fields,
                    _ => {
                        return Err(Error::validation(format!(
                            "expected map at {}, got {}",
                            path,
                            type_name(value)
                        )))
                    }
                };
                for (key, val) in fields {
                    let field_path = path.with(PathElement::field_name(key.clone()));
                    self.validate_value(val, map.field_type(key), &field_path)?;
                }
                Ok(())
            }
        }
    }

    /// The path element identifying a list item: its merge-key fields
    /// for associative lists with keys, its value for associative
    /// lists without, its index otherwise.
    fn element_of(&self, item: &Value, list: &List, index: usize) -> Result<PathElement> {
        if list.element_relationship != ElementRelationship::Associative {
            return Ok(PathElement::index(index));
        }
        if list.keys.is_empty() {
            return Ok(PathElement::Value(item.clone()));
        }

        let obj = item.as_object().ok_or_else(|| {
            Error::validation("associative list items must be objects".to_string())
        })?;
        let mut fields = Vec::with_capacity(list.keys.len());
        for key in &list.keys {
            let v = obj.get(key).ok_or_else(|| {
                Error::validation(format!("list item is missing key field {:?}", key))
            })?;
            fields.push((key.clone(), v.clone()));
        }
        Ok(PathElement::key(fields))
    }

    /// All leaf paths set in this document: scalars, atomic
    /// containers, and associative-list elements (which own their key
    /// position as well as their leaves).
    pub fn to_field_set(&self) -> Result<Set> {
        let mut set = Set::new();
        self.collect_fields(&self.value, &self.type_ref, &Path::new(), &mut set)?;
        Ok(set)
    }

    fn collect_fields(&self, value: &Value, tr: &TypeRef, path: &Path, set: &mut Set) -> Result<()> {
        match self.shape(tr, value) {
            Shape::Leaf => {
                if !path.is_empty() {
                    set.insert(path);
                }
                Ok(())
            }
            Shape::Deduced => self.collect_deduced(value, path, set),
            Shape::List(list) => {
                if let Value::Array(items) = value {
                    for (i, item) in items.iter().enumerate() {
                        let pe = self.element_of(item, list, i)?;
                        let item_path = path.with(pe);
                        // The element position itself is owned.
                        set.insert(&item_path);
                        self.collect_fields(item, &list.element_type, &item_path, set)?;
                    }
                }
                Ok(())
            }
            Shape::Map(map) => {
                if let Value::Object(fields) = value {
                    for (key, val) in fields {
                        let field_path = path.with(PathElement::field_name(key.clone()));
                        self.collect_fields(val, map.field_type(key), &field_path, set)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn collect_deduced(&self, value: &Value, path: &Path, set: &mut Set) -> Result<()> {
        match value {
            Value::Object(fields) => {
                for (key, val) in fields {
                    let field_path = path.with(PathElement::field_name(key.clone()));
                    self.collect_deduced(val, &field_path, set)?;
                }
                Ok(())
            }
            _ => {
                if !path.is_empty() {
                    set.insert(path);
                }
                Ok(())
            }
        }
    }

    /// Merges `rhs` into this document: right side wins at leaves,
    /// maps merge field-wise, associative lists merge per key with
    /// unmatched right-hand elements appended in order.
    pub fn merge(&self, rhs: &TypedValue) -> Result<TypedValue> {
        let value = self.merge_values(&self.value, &rhs.value, &self.type_ref)?;
        Ok(TypedValue {
            value,
            type_ref: self.type_ref.clone(),
            schema: Arc::clone(&self.schema),
        })
    }

    fn merge_values(&self, lhs: &Value, rhs: &Value, tr: &TypeRef) -> Result<Value> {
        if rhs.is_null() {
            return Ok(lhs.clone());
        }
        if lhs.is_null() {
            return Ok(rhs.clone());
        }

        match self.shape(tr, rhs) {
            Shape::Leaf | Shape::Deduced if !rhs.is_object() => Ok(rhs.clone()),
            Shape::Leaf => Ok(rhs.clone()),
            Shape::Deduced => {
                // Deduced maps merge field-wise.
                match (lhs, rhs) {
                    (Value::Object(l), Value::Object(r)) => {
                        let mut out = l.clone();
                        for (key, rv) in r {
                            let merged = match l.get(key) {
                                Some(lv) => self.merge_values(lv, rv, &TypeRef::default())?,
                                None => rv.clone(),
                            };
                            out.insert(key.clone(), merged);
                        }
                        Ok(Value::Object(out))
                    }
                    _ => Ok(rhs.clone()),
                }
            }
            Shape::List(list) => match (lhs, rhs) {
                (Value::Array(l), Value::Array(r)) => self.merge_lists(l, r, list),
                _ => Ok(rhs.clone()),
            },
            Shape::Map(map) => match (lhs, rhs) {
                (Value::Object(l), Value::Object(r)) => {
                    let mut out = l.clone();
                    for (key, rv) in r {
                        let merged = match l.get(key) {
                            Some(lv) => self.merge_values(lv, rv, map.field_type(key))?,
                            None => rv.clone(),
                        };
                        out.insert(key.clone(), merged);
                    }
                    Ok(Value::Object(out))
                }
                _ => Ok(rhs.clone()),
            },
        }
    }

    fn merge_lists(&self, lhs: &[Value], rhs: &[Value], list: &List) -> Result<Value> {
        if list.element_relationship != ElementRelationship::Associative {
            return Ok(Value::Array(rhs.to_vec()));
        }

        let mut merged: BTreeMap<PathElement, Value> = BTreeMap::new();
        let mut order: Vec<PathElement> = Vec::new();

        for (i, item) in lhs.iter().enumerate() {
            let pe = self.element_of(item, list, i)?;
            if !merged.contains_key(&pe) {
                order.push(pe.clone());
            }
            merged.insert(pe, item.clone());
        }
        for (i, item) in rhs.iter().enumerate() {
            let pe = self.element_of(item, list, i)?;
            let out = match merged.get(&pe) {
                Some(existing) => self.merge_values(existing, item, &list.element_type)?,
                None => {
                    order.push(pe.clone());
                    item.clone()
                }
            };
            merged.insert(pe, out);
        }

        Ok(Value::Array(
            order
                .into_iter()
                .filter_map(|pe| merged.remove(&pe))
                .collect(),
        ))
    }

    /// Compares this document (lhs) with `rhs`, producing the
    /// added/modified/removed leaf sets.
    pub fn compare(&self, rhs: &TypedValue) -> Result<Comparison> {
        let mut comparison = Comparison::new();
        self.compare_values(
            Some(&self.value),
            Some(&rhs.value),
            &self.type_ref,
            &Path::new(),
            &mut comparison,
        )?;
        Ok(comparison)
    }

    fn compare_values(
        &self,
        lhs: Option<&Value>,
        rhs: Option<&Value>,
        tr: &TypeRef,
        path: &Path,
        comparison: &mut Comparison,
    ) -> Result<()> {
        let (lhs, rhs) = match (nonnull(lhs), nonnull(rhs)) {
            (None, None) => return Ok(()),
            (Some(l), None) => {
                self.record_side(l, tr, path, &mut comparison.removed)?;
                return Ok(());
            }
            (None, Some(r)) => {
                self.record_side(r, tr, path, &mut comparison.added)?;
                return Ok(());
            }
            (Some(l), Some(r)) => (l, r),
        };

        match self.shape(tr, rhs) {
            Shape::Leaf => {
                if cmp_value(lhs, rhs) != std::cmp::Ordering::Equal {
                    comparison.modified.insert(path);
                }
                Ok(())
            }
            Shape::Deduced => {
                match (lhs, rhs) {
                    (Value::Object(l), Value::Object(r)) => {
                        for key in l.keys().chain(r.keys().filter(|k| !l.contains_key(*k))) {
                            let field_path = path.with(PathElement::field_name(key.clone()));
                            self.compare_values(
                                l.get(key),
                                r.get(key),
                                &TypeRef::default(),
                                &field_path,
                                comparison,
                            )?;
                        }
                        Ok(())
                    }
                    _ => {
                        if lhs != rhs {
                            comparison.modified.insert(path);
                        }
                        Ok(())
                    }
                }
            }
            Shape::List(list) => {
                let empty = Vec::new();
                let l_items = lhs.as_array().unwrap_or(&empty);
                let r_items = rhs.as_array().unwrap_or(&empty);

                let mut l_by_key: BTreeMap<PathElement, &Value> = BTreeMap::new();
                for (i, item) in l_items.iter().enumerate() {
                    l_by_key.insert(self.element_of(item, list, i)?, item);
                }
                let mut r_by_key: BTreeMap<PathElement, &Value> = BTreeMap::new();
                for (i, item) in r_items.iter().enumerate() {
                    r_by_key.insert(self.element_of(item, list, i)?, item);
                }

                for (pe, l_item) in &l_by_key {
                    let item_path = path.with(pe.clone());
                    match r_by_key.get(pe) {
                        Some(r_item) => self.compare_values(
                            Some(l_item),
                            Some(r_item),
                            &list.element_type,
                            &item_path,
                            comparison,
                        )?,
                        None => {
                            self.record_side(l_item, &list.element_type, &item_path, {
                                &mut comparison.removed
                            })?;
                        }
                    }
                }
                for (pe, r_item) in &r_by_key {
                    if !l_by_key.contains_key(pe) {
                        let item_path = path.with(pe.clone());
                        self.record_side(r_item, &list.element_type, &item_path, {
                            &mut comparison.added
                        })?;
                    }
                }
                Ok(())
            }
            Shape::Map(map) => {
                let empty = serde_json::Map::new();
                let l = lhs.as_object().unwrap_or(&empty);
                let r = rhs.as_object().unwrap_or(&empty);
                for key in l.keys().chain(r.keys().filter(|k| !l.contains_key(*k))) {
                    let field_path = path.with(PathElement::field_name(key.clone()));
                    self.compare_values(
                        l.get(key),
                        r.get(key),
                        map.field_type(key),
                        &field_path,
                        comparison,
                    )?;
                }
                Ok(())
            }
        }
    }

    /// Records every leaf of a one-sided subtree into `set`, including
    /// the subtree's own path.
    fn record_side(&self, value: &Value, tr: &TypeRef, path: &Path, set: &mut Set) -> Result<()> {
        set.insert(path);
        let mut sub = Set::new();
        self.collect_fields(value, tr, &Path::new(), &mut sub)?;
        for leaf in sub.leaves() {
            let mut full = path.clone();
            for pe in leaf.iter() {
                full.push(pe.clone());
            }
            set.insert(&full);
        }
        Ok(())
    }

    /// Returns a copy of the document with every path in `items`
    /// removed.
    pub fn remove_items(&self, items: &Set) -> TypedValue {
        let value = self.remove_from(&self.value, &self.type_ref, items, &Path::new());
        TypedValue {
            value,
            type_ref: self.type_ref.clone(),
            schema: Arc::clone(&self.schema),
        }
    }

    fn remove_from(&self, value: &Value, tr: &TypeRef, items: &Set, path: &Path) -> Value {
        match self.shape(tr, value) {
            Shape::Leaf | Shape::Deduced => value.clone(),
            Shape::List(list) => {
                let items_in = match value {
                    Value::Array(v) => v,
                    _ => return value.clone(),
                };
                let mut out = Vec::new();
                for (i, item) in items_in.iter().enumerate() {
                    let pe = match self.element_of(item, list, i) {
                        Ok(pe) => pe,
                        Err(_) => PathElement::index(i),
                    };
                    let item_path = path.with(pe);
                    if items.has(&item_path) {
                        continue;
                    }
                    out.push(self.remove_from(item, &list.element_type, items, &item_path));
                }
                Value::Array(out)
            }
            Shape::Map(map) => {
                let fields = match value {
                    Value::Object(f) => f,
                    _ => return value.clone(),
                };
                let mut out = serde_json::Map::new();
                for (key, val) in fields {
                    let field_path = path.with(PathElement::field_name(key.clone()));
                    if items.has(&field_path) {
                        continue;
                    }
                    out.insert(
                        key.clone(),
                        self.remove_from(val, map.field_type(key), items, &field_path),
                    );
                }
                Value::Object(out)
            }
        }
    }
}

fn nonnull(v: Option<&Value>) -> Option<&Value> {
    v.filter(|v| !v.is_null())
}

fn validate_scalar(value: &Value, scalar: Scalar, path: &Path) -> Result<()> {
    if value.is_null() {
        return Ok(());
    }
    let ok = match scalar {
        Scalar::Numeric => value.is_number(),
        Scalar::String => value.is_string(),
        Scalar::Boolean => value.is_boolean(),
        Scalar::Untyped => !value.is_array() && !value.is_object(),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "expected {} scalar at {}, got {}",
            scalar_name(scalar),
            path,
            type_name(value)
        )))
    }
}

fn scalar_name(s: Scalar) -> &'static str {
    match s {
        Scalar::Numeric => "numeric",
        Scalar::String => "string",
        Scalar::Boolean => "boolean",
        Scalar::Untyped => "untyped",
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
