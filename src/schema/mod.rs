//! Schema module - the merge-type metadata this server models.
//!
//! Only merge semantics are described: which fields a type has, which
//! list fields are keyed (associative) and by what, and which
//! containers are atomic. This is deliberately not OpenAPI validation.

mod builtins;
mod elements;

pub use builtins::{builtin_schema, deduced_type_name, BUILTIN_SCHEMA_YAML};
pub use elements::*;
