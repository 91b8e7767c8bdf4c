//! Baton Dependencies
//!
//! Materializes the `depends_on` edges of every node of a manifest. Edges
//! pointing at a node of the same owner are resolved to the index of that
//! node, self edges are pruned and cycles are rejected. Edges naming
//! something outside the owner (such as `input`) stay unresolved.

mod error;
mod resolve;

pub use error::DependencyError;
pub use resolve::{Plan, find_node, plan_owner, resolve_manifest, resolve_node, resolve_owner};
