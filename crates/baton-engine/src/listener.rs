use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use baton_flow::FlowManager;
use thiserror::Error;

/// Flow managers keyed by flow or proxy name.
pub type Endpoints = Arc<HashMap<String, Arc<FlowManager>>>;

#[derive(Debug, Error)]
pub enum ListenerError {
  /// The listen address could not be bound.
  #[error("failed to bind '{address}': {source}")]
  Bind {
    address: String,
    #[source]
    source: std::io::Error,
  },

  #[error("listener io error: {0}")]
  Io(#[from] std::io::Error),
}

/// An inbound surface exposing the endpoints, e.g. an HTTP server.
#[async_trait]
pub trait Listener: Send + Sync {
  fn name(&self) -> &str;

  /// Set the endpoints served by this listener.
  fn handle(&self, endpoints: Endpoints);

  /// Serve until closed or failed.
  async fn serve(&self) -> Result<(), ListenerError>;

  /// Stop accepting requests and make [`serve`](Listener::serve) return.
  async fn close(&self);
}
