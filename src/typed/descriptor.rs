//! A reusable (schema, type) pair for interpreting documents.

use super::typed_value::TypedValue;
use crate::error::Result;
use crate::schema::{builtin_schema, deduced_type_name, Schema, TypeRef};
use serde_json::Value;
use std::sync::Arc;

/// ParseableType binds a schema to one of its types; call it on any
/// number of documents to obtain TypedValues.
#[derive(Debug, Clone)]
pub struct ParseableType {
    schema: Arc<Schema>,
    type_ref: TypeRef,
}

impl ParseableType {
    pub fn new(schema: Arc<Schema>, type_ref: TypeRef) -> Self {
        ParseableType { schema, type_ref }
    }

    /// A descriptor for a named type in the built-in schema.
    pub fn builtin(name: &str) -> Self {
        ParseableType {
            schema: Arc::clone(builtin_schema()),
            type_ref: TypeRef::named(name),
        }
    }

    /// The deduced descriptor: objects granular, lists atomic. Used
    /// for resources registered without any declared schema.
    pub fn deduced() -> Self {
        ParseableType::builtin(deduced_type_name())
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Interprets a document under this type and validates it.
    pub fn from_value(&self, value: Value) -> Result<TypedValue> {
        let tv = TypedValue::new(value, Arc::clone(&self.schema), self.type_ref.clone());
        tv.validate()?;
        Ok(tv)
    }

    /// Interprets a document without validating it. Used where the
    /// document is already known good, or where leniency is wanted.
    pub fn from_value_unvalidated(&self, value: Value) -> TypedValue {
        TypedValue::new(value, Arc::clone(&self.schema), self.type_ref.clone())
    }
}
