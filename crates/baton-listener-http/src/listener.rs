use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use baton_engine::{Endpoints, Listener, ListenerError};
use baton_flow::{FlowError, FlowManager, Input, Output};
use baton_protocol::Headers;
use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Headers describing the backend connection, never copied to the client.
const HOP_HEADERS: [&str; 3] = ["connection", "content-length", "transfer-encoding"];

struct ListenerState {
  endpoints: RwLock<Endpoints>,
}

impl ListenerState {
  fn endpoint(&self, name: &str) -> Option<Arc<FlowManager>> {
    self.endpoints.read().get(name).cloned()
  }
}

/// Listener serving endpoints over HTTP.
pub struct HttpListener {
  address: String,
  state: Arc<ListenerState>,
  shutdown: CancellationToken,
}

impl HttpListener {
  pub fn new(address: impl Into<String>) -> Self {
    Self {
      address: address.into(),
      state: Arc::new(ListenerState {
        endpoints: RwLock::new(Arc::new(HashMap::new())),
      }),
      shutdown: CancellationToken::new(),
    }
  }

  pub fn address(&self) -> &str {
    &self.address
  }

  /// Build the axum router.
  pub fn router(&self) -> Router {
    Router::new()
      .route("/{name}", post(handle_invoke))
      .with_state(self.state.clone())
  }
}

#[async_trait]
impl Listener for HttpListener {
  fn name(&self) -> &str {
    "http"
  }

  fn handle(&self, endpoints: Endpoints) {
    *self.state.endpoints.write() = endpoints;
  }

  async fn serve(&self) -> Result<(), ListenerError> {
    let listener = TcpListener::bind(&self.address)
      .await
      .map_err(|source| ListenerError::Bind {
        address: self.address.clone(),
        source,
      })?;

    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "starting http listener");

    axum::serve(listener, self.router())
      .with_graceful_shutdown(self.shutdown.clone().cancelled_owned())
      .await?;

    info!(addr = %local_addr, "http listener stopped");
    Ok(())
  }

  async fn close(&self) {
    self.shutdown.cancel();
  }
}

/// Handle POST /{name}
async fn handle_invoke(
  State(state): State<Arc<ListenerState>>,
  Path(name): Path<String>,
  headers: HeaderMap,
  body: Bytes,
) -> Response {
  let Some(manager) = state.endpoint(&name) else {
    return error_response(StatusCode::NOT_FOUND, format!("unknown flow '{name}'"));
  };

  let headers: Headers = headers
    .iter()
    .filter_map(|(key, value)| {
      value
        .to_str()
        .ok()
        .map(|value| (key.as_str().to_string(), value.to_string()))
    })
    .collect();

  // Cancels the in-flight calls when the client goes away.
  let cancel = CancellationToken::new();
  let _guard = cancel.clone().drop_guard();

  let input = Input::new(body).with_headers(headers).with_cancel(cancel);
  match manager.invoke(input).await {
    Ok(output) => output_response(output),
    Err(e) => {
      let status = status_of(&e);
      warn!(flow = %name, status = status.as_u16(), error = %e, "flow invocation failed");
      error_response(status, e.to_string())
    }
  }
}

fn status_of(error: &FlowError) -> StatusCode {
  match error {
    FlowError::Closed { .. } => StatusCode::SERVICE_UNAVAILABLE,
    FlowError::Input(_) => StatusCode::BAD_REQUEST,
    error if error.is_call_error() => StatusCode::BAD_GATEWAY,
    _ => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

fn output_response(output: Output) -> Response {
  let status = StatusCode::from_u16(output.status).unwrap_or(StatusCode::OK);
  let mut response = (status, output.body).into_response();

  for (key, value) in &output.headers {
    if HOP_HEADERS.contains(&key.to_ascii_lowercase().as_str()) {
      continue;
    }
    if let (Ok(key), Ok(value)) = (HeaderName::try_from(key), HeaderValue::try_from(value)) {
      response.headers_mut().insert(key, value);
    }
  }

  response
}

fn error_response(status: StatusCode, message: String) -> Response {
  (status, axum::Json(json!({ "error": message }))).into_response()
}
