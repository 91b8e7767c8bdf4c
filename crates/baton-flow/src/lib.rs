//! Baton Flow
//!
//! Executes resolved flows and proxies. A [`FlowManager`] owns one flow or
//! proxy together with the dialed connections of the services it calls.
//! Every invocation gets its own runtime store:
//!
//! 1. The payload is written to the `input` resource and the headers to the
//!    `header` resource
//! 2. Nodes run in batches; a node is ready once every resolved dependency
//!    completed or was skipped
//! 3. A node whose condition is false is skipped, and so are its dependents
//! 4. Functions are executed, the request is rendered and the call result
//!    is written to the resource named after the node
//! 5. The flow output is rendered, or the inbound request is forwarded for
//!    proxies

mod error;
mod executor;
mod input;
mod manager;

pub use error::FlowError;
pub use input::{Input, Output};
pub use manager::{Connections, FlowManager};
