//! Baton Engine
//!
//! The [`Engine`] turns a resolved manifest into served endpoints:
//!
//! ```text
//! Manifest ──► dial every service through its Caller
//!          ──► one FlowManager per flow/proxy (the endpoints)
//!          ──► hand the endpoints to every Listener
//! ```
//!
//! [`Engine::serve`] runs all listeners concurrently until every one of them
//! stopped. A failing listener closes the others and its error is returned.
//! [`Engine::close`] closes the listeners, waits for the
//! in-flight invocations of every endpoint and closes the connections.

mod engine;
mod error;
mod listener;

pub use engine::{Engine, EngineConfig};
pub use error::EngineError;
pub use listener::{Endpoints, Listener, ListenerError};
