//! Baton HTTP transport
//!
//! Dials services described with the `http` transport. The service option
//! `host` holds the base URL. Methods are configured through the options:
//!
//! - `method`: HTTP verb, defaults to `GET`
//! - `endpoint`: path appended to the host, may contain templates such as
//!   `/users/{{ input:id }}` which are substituted from the store at call time

mod caller;
mod endpoint;

pub use caller::{HttpCall, HttpCaller, HttpMethod};
pub use endpoint::Endpoint;

/// Transport name of this caller.
pub const TRANSPORT: &str = "http";

/// Service option holding the base URL.
pub const HOST_OPTION: &str = "host";

/// Method option holding the HTTP verb.
pub const METHOD_OPTION: &str = "method";

/// Method option holding the endpoint path.
pub const ENDPOINT_OPTION: &str = "endpoint";
