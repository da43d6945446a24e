//! Typed module - operations on object documents under a merge
//! schema: validation, comparison, merging, field-set extraction.

mod comparison;
mod descriptor;
mod typed_value;

#[cfg(test)]
mod merge_test;

pub use comparison::*;
pub use descriptor::*;
pub use typed_value::*;
