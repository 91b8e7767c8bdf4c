//! Baton Config
//!
//! This crate contains the serializable manifest types for baton. These
//! types represent flow definitions before they are resolved by
//! `baton-resolver` into a servable manifest.
//!
//! A manifest is loaded from JSON:
//!
//! ```json
//! {
//!   "services": [
//!     {
//!       "name": "users",
//!       "options": { "host": "http://users.local" },
//!       "methods": [
//!         { "name": "get", "options": { "endpoint": "/users/{{ input:id }}" } }
//!       ]
//!     }
//!   ],
//!   "flows": [
//!     {
//!       "name": "user",
//!       "input": { "id": "int64" },
//!       "nodes": [{ "name": "user", "call": { "service": "users", "method": "get" } }],
//!       "output": { "name": "{{ user:name }}" }
//!     }
//!   ]
//! }
//! ```

mod flow;
mod manifest;
mod service;

pub use flow::{CallDef, FlowDef, NodeDef, ProxyDef};
pub use manifest::ManifestDef;
pub use service::{MethodDef, ServiceDef};

/// A value tree. String leaves of requests and outputs are templates or
/// constants; string leaves of schemas are type names.
pub type ValueDef = serde_json::Value;
