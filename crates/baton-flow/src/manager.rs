use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use baton_protocol::{Call, Headers, Request, ResponseBuffer};
use baton_refs::{Key, Store};
use baton_specs::template::{HEADER_RESOURCE, INPUT_RESOURCE};
use baton_specs::{Flow, Functions, Node, Property, Proxy};
use bytes::Bytes;
use serde_json::Value;
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument};

use crate::executor::Execution;
use crate::{FlowError, Input, Output};

/// Dialed connections keyed by service name.
pub type Connections = HashMap<String, Arc<dyn Call>>;

enum Target {
  Flow {
    output: Option<Property>,
    functions: Functions,
  },
  Proxy {
    forward: baton_specs::Call,
  },
}

/// Executes invocations of a single flow or proxy.
pub struct FlowManager {
  name: String,
  nodes: Arc<Vec<Node>>,
  target: Target,
  connections: Arc<Connections>,
  call_timeout: Option<Duration>,
  tracker: TaskTracker,
}

impl FlowManager {
  /// Create a manager rendering the output of the given flow.
  pub fn flow(flow: Flow, connections: Connections) -> Self {
    Self {
      name: flow.name,
      nodes: Arc::new(flow.nodes),
      target: Target::Flow {
        output: flow.output,
        functions: flow.functions,
      },
      connections: Arc::new(connections),
      call_timeout: None,
      tracker: TaskTracker::new(),
    }
  }

  /// Create a manager forwarding the inbound request once every node of
  /// the proxy completed.
  pub fn proxy(proxy: Proxy, connections: Connections) -> Self {
    Self {
      name: proxy.name,
      nodes: Arc::new(proxy.nodes),
      target: Target::Proxy {
        forward: proxy.forward,
      },
      connections: Arc::new(connections),
      call_timeout: None,
      tracker: TaskTracker::new(),
    }
  }

  /// Upper bound applied to every backend call.
  pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.call_timeout = timeout;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_closed(&self) -> bool {
    self.tracker.is_closed()
  }

  /// Invoke the flow.
  #[instrument(name = "flow_invoke", skip(self, input), fields(flow = %self.name))]
  pub async fn invoke(&self, input: Input) -> Result<Output, FlowError> {
    let _token = self.tracker.token();
    if self.tracker.is_closed() {
      return Err(FlowError::Closed {
        flow: self.name.clone(),
      });
    }

    let invocation: Arc<str> = uuid::Uuid::new_v4().to_string().into();
    info!(invocation = %invocation, "flow_started");

    let result = self.execute(invocation.clone(), input).await;

    match &result {
      Ok(output) => info!(invocation = %invocation, status = output.status, "flow_completed"),
      Err(e) => error!(invocation = %invocation, error = %e, "flow_failed"),
    }

    result
  }

  /// Stop accepting invocations. In-flight invocations keep running.
  pub fn close(&self) {
    if self.tracker.close() {
      info!(flow = %self.name, in_flight = self.tracker.len(), "flow_closing");
    }
  }

  /// Wait until every in-flight invocation finished. Only returns once
  /// [`close`](Self::close) has been called.
  pub async fn wait(&self) {
    self.tracker.wait().await;
  }

  async fn execute(&self, invocation: Arc<str>, input: Input) -> Result<Output, FlowError> {
    let store = Arc::new(Store::new());

    let payload = match &self.target {
      Target::Flow { .. } => input.payload().map_err(FlowError::Input)?,
      Target::Proxy { .. } => input.payload().unwrap_or(Value::Null),
    };
    store.set(Key::resource(INPUT_RESOURCE), payload);
    store.set(Key::resource(HEADER_RESOURCE), headers_value(&input.headers));

    let execution = Execution {
      invocation,
      nodes: self.nodes.clone(),
      store: store.clone(),
      connections: self.connections.clone(),
      call_timeout: self.call_timeout,
      cancel: input.cancel.clone(),
    };
    execution.run().await?;

    match &self.target {
      Target::Flow { output, functions } => render_output(output.as_ref(), functions, &store),
      Target::Proxy { forward } => self.forward(forward, input, &store).await,
    }
  }

  async fn forward(
    &self,
    forward: &baton_specs::Call,
    input: Input,
    store: &Store,
  ) -> Result<Output, FlowError> {
    let connection =
      self
        .connections
        .get(&forward.service)
        .ok_or_else(|| FlowError::ServiceUnavailable {
          node: self.name.clone(),
          service: forward.service.clone(),
        })?;

    let request = Request::new(forward.method.clone())
      .with_headers(input.headers)
      .with_body(input.body)
      .with_timeout(self.call_timeout)
      .with_cancel(input.cancel.child_token());

    let mut writer = ResponseBuffer::new();
    connection
      .send_msg(&mut writer, request, store)
      .await
      .map_err(|source| FlowError::Call {
        node: self.name.clone(),
        source,
      })?;

    Ok(Output {
      status: writer.status().unwrap_or(200),
      headers: writer.headers().clone(),
      body: Bytes::from(writer.into_body()),
    })
  }
}

fn headers_value(headers: &Headers) -> Value {
  Value::Object(
    headers
      .iter()
      .map(|(key, value)| (key.clone(), Value::String(value.clone())))
      .collect(),
  )
}

fn render_output(
  output: Option<&Property>,
  functions: &Functions,
  store: &Store,
) -> Result<Output, FlowError> {
  functions
    .execute(store)
    .map_err(|source| FlowError::Function {
      node: "output".to_string(),
      source,
    })?;

  let value = match output {
    Some(output) => output.resolve(store).map_err(|source| FlowError::Render {
      node: "output".to_string(),
      source,
    })?,
    None => Value::Object(Default::default()),
  };

  let mut headers = Headers::new();
  headers.insert("content-type".to_string(), "application/json".to_string());

  Ok(Output {
    status: 200,
    headers,
    body: Bytes::from(serde_json::to_vec(&value).map_err(FlowError::Encode)?),
  })
}
