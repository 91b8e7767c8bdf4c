use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// Header map forwarded to and from backends.
pub type Headers = BTreeMap<String, String>;

/// A message to send through a [`Call`](crate::Call).
#[derive(Debug, Clone, Default)]
pub struct Request {
  /// Name of the method to invoke.
  pub method: String,
  pub headers: Headers,
  /// Resolved request payload.
  pub body: Bytes,
  /// Upper bound for the whole call, including reading the response.
  pub timeout: Option<Duration>,
  pub cancel: CancellationToken,
}

impl Request {
  pub fn new(method: impl Into<String>) -> Self {
    Self {
      method: method.into(),
      ..Default::default()
    }
  }

  pub fn with_headers(mut self, headers: Headers) -> Self {
    self.headers = headers;
    self
  }

  pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
    self.body = body.into();
    self
  }

  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }
}
