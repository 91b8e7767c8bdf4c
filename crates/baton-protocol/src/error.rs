use baton_refs::StoreError;
use baton_specs::FunctionError;
use thiserror::Error;

/// Errors raised while dialing a service or performing a call.
#[derive(Debug, Error)]
pub enum CallError {
  /// The service could not be dialed.
  #[error("failed to dial service '{service}': {message}")]
  Dial { service: String, message: String },

  /// A service or method option is missing or malformed.
  #[error("invalid option '{option}': {message}")]
  InvalidOption { option: String, message: String },

  /// The requested method is not advertised by the service.
  #[error("unknown method '{method}' on service '{service}'")]
  UnknownMethod { service: String, method: String },

  /// The transport failed to deliver the call.
  #[error("transport error: {0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The call did not complete within the request timeout.
  #[error("call timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  /// The call was cancelled by the caller.
  #[error("call cancelled")]
  Cancelled,

  /// The backend answered with a failure status.
  #[error("backend responded with status {status}: {body}")]
  Status { status: u16, body: String },

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("failed to write response: {0}")]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Function(#[from] FunctionError),

  /// The connection has been closed.
  #[error("call is closed")]
  Closed,
}

impl CallError {
  pub fn transport<E>(error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    CallError::Transport(Box::new(error))
  }
}
