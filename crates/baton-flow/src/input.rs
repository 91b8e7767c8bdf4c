use baton_protocol::Headers;
use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Inbound invocation of a flow.
#[derive(Debug, Clone, Default)]
pub struct Input {
  /// Raw payload, JSON for flows.
  pub body: Bytes,
  pub headers: Headers,
  /// Cancels every in-flight call of the invocation.
  pub cancel: CancellationToken,
}

impl Input {
  pub fn new(body: impl Into<Bytes>) -> Self {
    Self {
      body: body.into(),
      ..Default::default()
    }
  }

  /// Build an input from a JSON value.
  pub fn json(value: &Value) -> Self {
    Self::new(value.to_string())
  }

  pub fn with_headers(mut self, headers: Headers) -> Self {
    self.headers = headers;
    self
  }

  pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// Decode the payload. An empty payload decodes as an empty object.
  pub(crate) fn payload(&self) -> Result<Value, serde_json::Error> {
    if self.body.iter().all(u8::is_ascii_whitespace) {
      return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(&self.body)
  }
}

/// Result of an invocation.
#[derive(Debug, Clone, Default)]
pub struct Output {
  pub status: u16,
  pub headers: Headers,
  pub body: Bytes,
}

impl Output {
  /// Decode the body as JSON.
  pub fn json(&self) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(&self.body)
  }
}
