//! Field path module - paths into object documents and sets of paths,
//! used to track which field manager owns what.

mod fieldsv1;
mod path;
mod set;

pub use fieldsv1::*;
pub use path::*;
pub use set::*;
