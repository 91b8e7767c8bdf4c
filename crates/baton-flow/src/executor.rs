//! Node scheduling for a single invocation.

use std::sync::Arc;
use std::time::Duration;

use baton_conditions::Evaluate;
use baton_protocol::{CallError, Request, ResponseBuffer};
use baton_refs::{Key, Store};
use baton_specs::Node;
use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::FlowError;
use crate::manager::Connections;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  Pending,
  Completed,
  Skipped,
}

/// The nodes of one invocation together with its store.
#[derive(Clone)]
pub(crate) struct Execution {
  pub invocation: Arc<str>,
  pub nodes: Arc<Vec<Node>>,
  pub store: Arc<Store>,
  pub connections: Arc<Connections>,
  pub call_timeout: Option<Duration>,
  pub cancel: CancellationToken,
}

impl Execution {
  /// Run every node. Returns once all nodes completed or were skipped, or
  /// with the first error of a batch.
  pub(crate) async fn run(&self) -> Result<(), FlowError> {
    let mut states = vec![State::Pending; self.nodes.len()];

    loop {
      if self.cancel.is_cancelled() {
        return Err(FlowError::Cancelled);
      }

      let ready = find_ready_nodes(&self.nodes, &states);
      if ready.is_empty() {
        break;
      }

      let mut handles = Vec::with_capacity(ready.len());
      for index in ready {
        let node = &self.nodes[index];

        if self.should_skip(node, &states)? {
          info!(invocation = %self.invocation, node = %node.name, "node_skipped");
          self.store.set(Key::resource(node.name.clone()), Value::Null);
          states[index] = State::Skipped;
          continue;
        }

        let execution = self.clone();
        handles.push((
          index,
          tokio::spawn(async move { execution.execute_node(index).await }),
        ));
      }

      if handles.is_empty() {
        continue;
      }

      let (indices, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
      let results = futures::future::join_all(handles).await;

      for (index, result) in indices.into_iter().zip(results) {
        let node = &self.nodes[index].name;
        match result? {
          Ok(()) => {
            info!(invocation = %self.invocation, node = %node, "node_completed");
            states[index] = State::Completed;
          }
          Err(e) => {
            error!(invocation = %self.invocation, node = %node, error = %e, "node_failed");
            return Err(e);
          }
        }
      }
    }

    let stalled: Vec<String> = states
      .iter()
      .zip(self.nodes.iter())
      .filter(|(state, _)| **state == State::Pending)
      .map(|(_, node)| node.name.clone())
      .collect();

    if !stalled.is_empty() {
      return Err(FlowError::Stalled { nodes: stalled });
    }

    Ok(())
  }

  /// A node is skipped when one of its dependencies was skipped or when its
  /// condition evaluates to false.
  fn should_skip(&self, node: &Node, states: &[State]) -> Result<bool, FlowError> {
    if node
      .resolved_dependencies()
      .any(|dependency| states[dependency] == State::Skipped)
    {
      return Ok(true);
    }

    match &node.condition {
      Some(condition) => {
        let pass = condition
          .evaluate(&self.store)
          .map_err(|source| FlowError::Condition {
            node: node.name.clone(),
            source,
          })?;
        debug!(invocation = %self.invocation, node = %node.name, condition = %condition.raw, pass, "evaluated condition");
        Ok(!pass)
      }
      None => Ok(false),
    }
  }

  async fn execute_node(&self, index: usize) -> Result<(), FlowError> {
    let node = &self.nodes[index];

    node
      .functions
      .execute(&self.store)
      .map_err(|source| FlowError::Function {
        node: node.name.clone(),
        source,
      })?;

    let Some(call) = &node.call else {
      self.store.set(
        Key::resource(node.name.clone()),
        Value::Object(Default::default()),
      );
      return Ok(());
    };

    let connection =
      self
        .connections
        .get(&call.service)
        .ok_or_else(|| FlowError::ServiceUnavailable {
          node: node.name.clone(),
          service: call.service.clone(),
        })?;

    let body = match &call.request {
      Some(request) => {
        let value = request
          .resolve(&self.store)
          .map_err(|source| FlowError::Render {
            node: node.name.clone(),
            source,
          })?;
        Bytes::from(serde_json::to_vec(&value).map_err(FlowError::Encode)?)
      }
      None => Bytes::new(),
    };

    let request = Request::new(call.method.clone())
      .with_body(body)
      .with_timeout(self.call_timeout)
      .with_cancel(self.cancel.child_token());

    debug!(
      invocation = %self.invocation,
      node = %node.name,
      service = %call.service,
      method = %call.method,
      "node_call_started"
    );

    let mut writer = ResponseBuffer::new();
    connection
      .send_msg(&mut writer, request, &self.store)
      .await
      .map_err(|source| match source {
        CallError::Cancelled => FlowError::Cancelled,
        source => FlowError::Call {
          node: node.name.clone(),
          source,
        },
      })?;

    let value = writer.json().map_err(|source| FlowError::Decode {
      node: node.name.clone(),
      source,
    })?;

    self.store.set(Key::resource(node.name.clone()), value);
    Ok(())
  }
}

/// Pending nodes whose resolved dependencies all completed or were skipped.
fn find_ready_nodes(nodes: &[Node], states: &[State]) -> Vec<usize> {
  nodes
    .iter()
    .enumerate()
    .filter(|(index, _)| states[*index] == State::Pending)
    .filter(|(_, node)| {
      node
        .resolved_dependencies()
        .all(|dependency| states[dependency] != State::Pending)
    })
    .map(|(index, _)| index)
    .collect()
}
