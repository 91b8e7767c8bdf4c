//! Baton Protocol
//!
//! This crate defines the contract every backend transport implements.
//!
//! - A [`Caller`] is the per transport factory. It dials a described
//!   [`Service`](baton_specs::Service) into a [`Call`].
//! - A [`Call`] is a dialed connection. It enumerates the advertised
//!   [`Method`]s and sends messages.
//! - Responses are written through a [`ResponseWriter`], only once the
//!   backend call succeeded.
//!
//! Transports are registered by name in a [`Callers`] registry and selected
//! through the `transport` of a service.

mod call;
mod error;
mod request;
mod writer;

pub use call::{Call, Caller, Callers, Method};
pub use error::CallError;
pub use request::{Headers, Request};
pub use writer::{ResponseBuffer, ResponseWriter};
