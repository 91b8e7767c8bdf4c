//! Baton HTTP listener
//!
//! Exposes every endpoint at `POST /{name}`. The request body is the flow
//! input and the request headers are available through the `header`
//! resource. Failures are answered with a JSON body `{ "error": "..." }`:
//!
//! | status | cause |
//! |--------|-------|
//! | 400 | the payload is not valid JSON |
//! | 404 | no flow or proxy with this name |
//! | 502 | a backend call failed |
//! | 503 | the engine is closing |
//! | 500 | any other failure |

mod listener;

pub use listener::HttpListener;
