//! Context propagation
//!
//! A child stream runs once per context. Contexts are derived from the
//! records of the parent stream by a [`ContextRule`]: a predicate deciding
//! which records qualify and a field mapping deciding what the child sees.
//! The child renders its endpoint path from the context and copies selected
//! keys into its records as lineage.

mod template;
mod types;

pub use template::{has_variables, path_variables, render_path};
pub use types::{lookup, Context, ContextRule, FieldSource, RecordPredicate};

#[cfg(test)]
mod tests;
