//! Baton Refs
//!
//! The runtime value store holding every value exchanged between the nodes of
//! a single flow invocation. A [`Store`] is created fresh for each invocation,
//! written by completed calls, executed functions and the inbound request, and
//! dropped once the invocation finishes. It carries no cross-invocation state.
//!
//! Values are addressed by a [`Key`] made of a resource (`input`, `header`,
//! `stack` or a node name) and a dot-delimited path inside that resource:
//!
//! ```text
//! input:user.email
//! fetch_user:name
//! stack:6f1c0e...
//! ```

mod key;
mod store;

pub use key::{Key, PATH_DELIMITER, RESOURCE_DELIMITER};
pub use store::{Store, StoreError};
