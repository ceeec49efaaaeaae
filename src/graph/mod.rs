//! Stream graph
//!
//! Streams are declared as data: a [`StreamNode`] names its endpoint, its
//! request shape, its sync mode and optionally a parent with the rule that
//! turns parent records into contexts. The [`StreamGraph`] validates the
//! declarations and yields an execution order with parents first.

mod dag;
mod types;

pub use dag::{Selection, StreamGraph};
pub use types::{ParentLink, StreamKind, StreamNode};
