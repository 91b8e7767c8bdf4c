use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use baton_config::ManifestDef;
use baton_flow::{Connections, FlowError, FlowManager, Input};
use baton_protocol::{Call, CallError, Method, Request, ResponseWriter};
use baton_refs::Store;
use baton_resolver::{Resolver, StandardResolver};
use baton_specs::Manifest;
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tokio::sync::Barrier;

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, CallError>> + Send + Sync>;

/// In-memory backend answering each method with a handler.
#[derive(Default)]
struct FakeCall {
  handlers: HashMap<String, Handler>,
  calls: AtomicUsize,
}

impl FakeCall {
  fn respond<F>(mut self, method: &str, handler: F) -> Self
  where
    F: Fn(Value) -> Result<Value, CallError> + Send + Sync + 'static,
  {
    let handler = Arc::new(handler);
    self.handlers.insert(
      method.to_string(),
      Arc::new(move |body| {
        let handler = handler.clone();
        Box::pin(async move { handler(body) })
      }),
    );
    self
  }

  fn respond_async(mut self, method: &str, handler: Handler) -> Self {
    self.handlers.insert(method.to_string(), handler);
    self
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Call for FakeCall {
  fn methods(&self) -> Vec<&dyn Method> {
    Vec::new()
  }

  fn method(&self, _name: &str) -> Option<&dyn Method> {
    None
  }

  async fn send_msg(
    &self,
    writer: &mut dyn ResponseWriter,
    request: Request,
    _store: &Store,
  ) -> Result<(), CallError> {
    self.calls.fetch_add(1, Ordering::SeqCst);

    let handler = self
      .handlers
      .get(&request.method)
      .cloned()
      .ok_or_else(|| CallError::UnknownMethod {
        service: "fake".to_string(),
        method: request.method.clone(),
      })?;

    let body = if request.body.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&request.body).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&request.body).into_owned())
      })
    };

    let response = handler(body).await?;
    writer.write_header(200);
    writer.write_all(response.to_string().as_bytes())?;
    Ok(())
  }

  fn close(&self) -> Result<(), CallError> {
    Ok(())
  }
}

fn resolve(manifest: Value) -> Manifest {
  let def: ManifestDef = serde_json::from_value(manifest).unwrap();
  StandardResolver::default().resolve(def).unwrap()
}

fn services(methods: &[&str]) -> Value {
  let methods: Vec<Value> = methods.iter().map(|name| json!({ "name": name })).collect();
  json!([{ "name": "backend", "transport": "fake", "methods": methods }])
}

fn manager(manifest: Manifest, call: Arc<FakeCall>) -> FlowManager {
  let mut connections = Connections::new();
  connections.insert("backend".to_string(), call);

  match manifest.flows.into_iter().next() {
    Some(flow) => FlowManager::flow(flow, connections),
    None => FlowManager::proxy(manifest.proxies.into_iter().next().unwrap(), connections),
  }
}

#[tokio::test]
async fn test_values_flow_between_nodes() {
  let manifest = resolve(json!({
    "services": services(&["user", "orders"]),
    "flows": [{
      "name": "profile",
      "nodes": [
        { "name": "user", "call": { "service": "backend", "method": "user", "request": { "id": "{{ input:id }}" } } },
        { "name": "orders", "call": { "service": "backend", "method": "orders", "request": { "owner": "{{ user:name }}" } } }
      ],
      "output": { "name": "{{ user:name }}", "orders": "{{ orders:count }}", "source": "fake" }
    }]
  }));

  let call = Arc::new(
    FakeCall::default()
      .respond("user", |body| Ok(json!({ "name": format!("user-{}", body["id"]) })))
      .respond("orders", |body| {
        assert_eq!(body, json!({ "owner": "user-7" }));
        Ok(json!({ "count": 3 }))
      }),
  );

  let manager = manager(manifest, call.clone());
  let output = manager.invoke(Input::json(&json!({ "id": 7 }))).await.unwrap();

  assert_eq!(output.status, 200);
  assert_eq!(
    output.json().unwrap(),
    json!({ "name": "user-7", "orders": 3, "source": "fake" })
  );
  assert_eq!(call.calls(), 2);
}

#[tokio::test]
async fn test_false_condition_skips_node_and_dependents() {
  let manifest = resolve(json!({
    "services": services(&["user", "orders"]),
    "flows": [{
      "name": "profile",
      "nodes": [
        { "name": "user", "condition": "{{ input:enabled }}", "call": { "service": "backend", "method": "user" } },
        { "name": "orders", "call": { "service": "backend", "method": "orders", "request": { "owner": "{{ user:name }}" } } }
      ],
      "output": { "name": "{{ user:name }}", "orders": "{{ orders }}" }
    }]
  }));

  let call = Arc::new(
    FakeCall::default()
      .respond("user", |_| Ok(json!({ "name": "ada" })))
      .respond("orders", |_| Ok(json!({ "count": 1 }))),
  );

  let manager = manager(manifest, call.clone());

  let output = manager
    .invoke(Input::json(&json!({ "enabled": false })))
    .await
    .unwrap();
  assert_eq!(output.json().unwrap(), json!({ "name": null, "orders": null }));
  assert_eq!(call.calls(), 0);

  let output = manager
    .invoke(Input::json(&json!({ "enabled": true })))
    .await
    .unwrap();
  assert_eq!(
    output.json().unwrap(),
    json!({ "name": "ada", "orders": { "count": 1 } })
  );
  assert_eq!(call.calls(), 2);
}

#[tokio::test]
async fn test_bare_condition_waits_for_upstream() {
  let manifest = resolve(json!({
    "services": services(&["user", "orders"]),
    "flows": [{
      "name": "profile",
      "nodes": [
        { "name": "orders", "condition": "{{ user }} is not none", "call": { "service": "backend", "method": "orders" } },
        { "name": "user", "call": { "service": "backend", "method": "user" } }
      ],
      "output": { "orders": "{{ orders }}" }
    }]
  }));

  let slow_user: Handler = Arc::new(|_| {
    Box::pin(async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok(json!({ "id": 1 }))
    })
  });

  let call = Arc::new(
    FakeCall::default()
      .respond_async("user", slow_user)
      .respond("orders", |_| Ok(json!({ "count": 1 }))),
  );

  let manager = manager(manifest, call.clone());
  let output = manager.invoke(Input::default()).await.unwrap();

  assert_eq!(output.json().unwrap(), json!({ "orders": { "count": 1 } }));
  assert_eq!(call.calls(), 2);
}

#[tokio::test]
async fn test_independent_nodes_run_concurrently() {
  let manifest = resolve(json!({
    "services": services(&["wait"]),
    "flows": [{
      "name": "parallel",
      "nodes": [
        { "name": "left", "call": { "service": "backend", "method": "wait" } },
        { "name": "right", "call": { "service": "backend", "method": "wait" } }
      ]
    }]
  }));

  let barrier = Arc::new(Barrier::new(2));
  let handler: Handler = Arc::new(move |_| {
    let barrier = barrier.clone();
    Box::pin(async move {
      barrier.wait().await;
      Ok(json!({}))
    })
  });

  let call = Arc::new(FakeCall::default().respond_async("wait", handler));
  let manager = manager(manifest, call);

  let output = tokio::time::timeout(Duration::from_secs(5), manager.invoke(Input::default()))
    .await
    .expect("nodes did not run concurrently")
    .unwrap();
  assert_eq!(output.json().unwrap(), json!({}));
}

#[tokio::test]
async fn test_call_error_aborts_invocation() {
  let manifest = resolve(json!({
    "services": services(&["user", "orders"]),
    "flows": [{
      "name": "profile",
      "nodes": [
        { "name": "user", "call": { "service": "backend", "method": "user" } },
        { "name": "orders", "depends_on": ["user"], "call": { "service": "backend", "method": "orders" } }
      ]
    }]
  }));

  let call = Arc::new(
    FakeCall::default()
      .respond("user", |_| {
        Err(CallError::Status {
          status: 500,
          body: "boom".to_string(),
        })
      })
      .respond("orders", |_| Ok(json!({}))),
  );

  let manager = manager(manifest, call.clone());
  let err = manager.invoke(Input::default()).await.unwrap_err();

  assert!(err.is_call_error());
  assert!(matches!(err, FlowError::Call { ref node, .. } if node == "user"));
  assert_eq!(call.calls(), 1);
}

#[tokio::test]
async fn test_invalid_payload() {
  let manifest = resolve(json!({ "flows": [{ "name": "empty" }] }));
  let manager = manager(manifest, Arc::new(FakeCall::default()));

  let err = manager.invoke(Input::new("not json")).await.unwrap_err();
  assert!(matches!(err, FlowError::Input(_)));
  assert!(!err.is_call_error());
}

#[tokio::test]
async fn test_output_functions_and_headers() {
  let def: ManifestDef = serde_json::from_value(json!({
    "flows": [{
      "name": "greeting",
      "output": { "message": "{{ concat('hello ', header:x-user) }}" }
    }]
  }))
  .unwrap();

  let mut functions = baton_specs::CustomFunctions::new();
  functions.insert(
    "concat".to_string(),
    baton_specs::custom_function(|args| {
      let args = args.to_vec();
      Ok((
        baton_specs::Property::scalar(baton_specs::Type::String),
        baton_specs::executable(move |store| {
          let mut result = String::new();
          for arg in &args {
            if let Value::String(value) = arg.resolve(store)? {
              result.push_str(&value);
            }
          }
          Ok(Value::String(result))
        }),
      ))
    }),
  );

  let manifest = StandardResolver::new(functions).resolve(def).unwrap();
  let manager = manager(manifest, Arc::new(FakeCall::default()));

  let mut headers = baton_protocol::Headers::new();
  headers.insert("x-user".to_string(), "ada".to_string());

  let output = manager
    .invoke(Input::default().with_headers(headers))
    .await
    .unwrap();
  assert_eq!(output.json().unwrap(), json!({ "message": "hello ada" }));
}

#[tokio::test]
async fn test_proxy_forwards_raw_body() {
  let manifest = resolve(json!({
    "services": services(&["auth", "upload"]),
    "proxies": [{
      "name": "gateway",
      "nodes": [{ "name": "auth", "call": { "service": "backend", "method": "auth" } }],
      "forward": { "service": "backend", "method": "upload" }
    }]
  }));

  let call = Arc::new(
    FakeCall::default()
      .respond("auth", |_| Ok(json!({ "ok": true })))
      .respond("upload", |body| Ok(json!({ "received": body }))),
  );

  let manager = manager(manifest, call.clone());
  let output = manager.invoke(Input::new("raw bytes")).await.unwrap();

  assert_eq!(output.json().unwrap(), json!({ "received": "raw bytes" }));
  assert_eq!(call.calls(), 2);
}

#[tokio::test]
async fn test_close_rejects_new_and_drains_in_flight() {
  let manifest = resolve(json!({
    "services": services(&["slow"]),
    "flows": [{
      "name": "slow",
      "nodes": [{ "name": "slow", "call": { "service": "backend", "method": "slow" } }],
      "output": { "done": "{{ slow:done }}" }
    }]
  }));

  let handler: Handler = Arc::new(|_| {
    Box::pin(async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok(json!({ "done": true }))
    })
  });

  let call = Arc::new(FakeCall::default().respond_async("slow", handler));
  let manager = Arc::new(manager(manifest, call));

  let in_flight = tokio::spawn({
    let manager = manager.clone();
    async move { manager.invoke(Input::default()).await }
  });

  tokio::time::sleep(Duration::from_millis(20)).await;
  manager.close();

  let err = manager.invoke(Input::default()).await.unwrap_err();
  assert!(matches!(err, FlowError::Closed { .. }));

  tokio::time::timeout(Duration::from_secs(5), manager.wait())
    .await
    .unwrap();

  let output = in_flight.await.unwrap().unwrap();
  assert_eq!(output.json().unwrap(), json!({ "done": true }));
}

#[tokio::test]
async fn test_cancelled_invocation() {
  let manifest = resolve(json!({
    "services": services(&["slow"]),
    "flows": [{
      "name": "slow",
      "nodes": [{ "name": "slow", "call": { "service": "backend", "method": "slow" } }]
    }]
  }));

  let handler: Handler = Arc::new(|_| {
    Box::pin(async {
      tokio::time::sleep(Duration::from_secs(30)).await;
      Ok(json!({}))
    })
  });
  let call = Arc::new(FakeCall::default().respond_async("slow", handler));
  let manager = manager(manifest, call);

  let input = Input::default();
  input.cancel.cancel();

  let err = manager.invoke(input).await.unwrap_err();
  assert!(matches!(err, FlowError::Cancelled));
}
