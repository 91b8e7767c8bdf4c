use thiserror::Error;

use crate::ListenerError;

#[derive(Debug, Error)]
pub enum EngineError {
  /// No caller is registered for the transport of a service.
  #[error("unknown transport '{transport}' for service '{service}'")]
  UnknownTransport { service: String, transport: String },

  /// A flow calls a service that is not described.
  #[error("flow '{flow}' calls unknown service '{service}'")]
  UnknownService { flow: String, service: String },

  /// A listener failed while serving.
  #[error("listener '{listener}' failed: {source}")]
  Listener {
    listener: String,
    #[source]
    source: ListenerError,
  },

  #[error("listener task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}
