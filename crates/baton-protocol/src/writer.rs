use std::io;

use crate::Headers;

/// Destination of a call response.
///
/// Transports write the status and headers through [`write_header`] and
/// the raw body through [`io::Write`].
///
/// [`write_header`]: ResponseWriter::write_header
pub trait ResponseWriter: io::Write + Send {
  fn headers_mut(&mut self) -> &mut Headers;

  fn write_header(&mut self, status: u16);
}

/// In-memory response writer.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
  status: Option<u16>,
  headers: Headers,
  body: Vec<u8>,
}

impl ResponseBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Status written by the transport, `None` if nothing was written yet.
  pub fn status(&self) -> Option<u16> {
    self.status
  }

  pub fn headers(&self) -> &Headers {
    &self.headers
  }

  pub fn body(&self) -> &[u8] {
    &self.body
  }

  pub fn into_body(self) -> Vec<u8> {
    self.body
  }

  /// Decode the body as JSON. An empty body decodes as an empty object.
  pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
    if self.body.iter().all(u8::is_ascii_whitespace) {
      return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_slice(&self.body)
  }
}

impl io::Write for ResponseBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.body.extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl ResponseWriter for ResponseBuffer {
  fn headers_mut(&mut self) -> &mut Headers {
    &mut self.headers
  }

  fn write_header(&mut self, status: u16) {
    self.status = Some(status);
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use serde_json::json;

  use super::*;

  #[test]
  fn test_buffer_collects_response() {
    let mut buffer = ResponseBuffer::new();
    assert_eq!(buffer.status(), None);

    buffer
      .headers_mut()
      .insert("content-type".to_string(), "application/json".to_string());
    buffer.write_header(200);
    buffer.write_all(br#"{"id":"#).unwrap();
    buffer.write_all(b"1}").unwrap();

    assert_eq!(buffer.status(), Some(200));
    assert_eq!(buffer.headers()["content-type"], "application/json");
    assert_eq!(buffer.json().unwrap(), json!({ "id": 1 }));
  }

  #[test]
  fn test_empty_body_is_empty_object() {
    let buffer = ResponseBuffer::new();
    assert_eq!(buffer.json().unwrap(), json!({}));
  }
}
