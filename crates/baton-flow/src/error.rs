use baton_conditions::ConditionError;
use baton_protocol::CallError;
use baton_refs::StoreError;
use baton_specs::FunctionError;
use thiserror::Error;

/// Errors that can occur while invoking a flow.
#[derive(Debug, Error)]
pub enum FlowError {
  /// The flow manager no longer accepts invocations.
  #[error("flow '{flow}' is closed")]
  Closed { flow: String },

  /// The inbound payload is not valid JSON.
  #[error("invalid input payload: {0}")]
  Input(#[source] serde_json::Error),

  /// A node condition could not be evaluated.
  #[error("condition of node '{node}' failed: {source}")]
  Condition {
    node: String,
    #[source]
    source: ConditionError,
  },

  /// A custom function failed.
  #[error("function of '{node}' failed: {source}")]
  Function {
    node: String,
    #[source]
    source: FunctionError,
  },

  /// No connection is available for the called service.
  #[error("node '{node}' calls unavailable service '{service}'")]
  ServiceUnavailable { node: String, service: String },

  /// The backend call failed.
  #[error("call of node '{node}' failed: {source}")]
  Call {
    node: String,
    #[source]
    source: CallError,
  },

  /// The backend response is not valid JSON.
  #[error("failed to decode response of node '{node}': {source}")]
  Decode {
    node: String,
    #[source]
    source: serde_json::Error,
  },

  /// A value could not be read while rendering a request or the output.
  #[error("failed to render '{node}': {source}")]
  Render {
    node: String,
    #[source]
    source: StoreError,
  },

  #[error("failed to encode message: {0}")]
  Encode(#[source] serde_json::Error),

  /// The invocation was cancelled.
  #[error("flow invocation cancelled")]
  Cancelled,

  /// Nodes could not be scheduled, their dependencies never completed.
  #[error("nodes could not be scheduled: {nodes:?}")]
  Stalled { nodes: Vec<String> },

  #[error("node task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl FlowError {
  /// Whether the error originates from a backend call.
  pub fn is_call_error(&self) -> bool {
    matches!(
      self,
      FlowError::Call { .. } | FlowError::ServiceUnavailable { .. } | FlowError::Decode { .. }
    )
  }
}
