//! Server-side apply: field ownership tracking, conflict detection,
//! and the merge-prune-bookkeep pipeline.

mod conflict;
mod managed;
mod updater;

#[cfg(test)]
mod apply_test;

pub use conflict::*;
pub use managed::*;
pub use updater::*;
