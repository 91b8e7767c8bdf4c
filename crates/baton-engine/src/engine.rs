use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use baton_flow::{Connections, FlowManager};
use baton_protocol::Callers;
use baton_specs::{CustomFunctions, Manifest, Node, Options};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::{EngineError, Endpoints, Listener};

/// Configuration for the engine.
#[derive(Default)]
pub struct EngineConfig {
  /// Available transports.
  pub callers: Callers,
  /// Custom functions available to transports binding templates at dial
  /// time.
  pub functions: CustomFunctions,
  pub listeners: Vec<Arc<dyn Listener>>,
  /// Upper bound applied to every backend call.
  pub call_timeout: Option<Duration>,
}

/// The orchestration engine.
pub struct Engine {
  endpoints: Endpoints,
  connections: Connections,
  listeners: Vec<Arc<dyn Listener>>,
}

impl Engine {
  /// Dial the services of the manifest and build one endpoint per flow and
  /// proxy.
  ///
  /// A service that fails to dial is logged, and the flows calling it are
  /// not started. Other flows are started regardless.
  pub fn new(manifest: Manifest, config: EngineConfig) -> Result<Self, EngineError> {
    let mut connections = Connections::new();

    for service in manifest.schema.services() {
      let caller =
        config
          .callers
          .get(&service.transport)
          .ok_or_else(|| EngineError::UnknownTransport {
            service: service.name.clone(),
            transport: service.transport.clone(),
          })?;

      match caller.dial(service, &config.functions, &Options::new()) {
        Ok(call) => {
          connections.insert(service.name.clone(), call);
        }
        Err(e) => {
          error!(service = %service.name, transport = %service.transport, error = %e, "failed to dial service");
        }
      }
    }

    let mut endpoints = HashMap::new();

    for flow in manifest.flows {
      let services = called_services(&flow.nodes, None);
      let Some(subset) = select(&manifest.schema, &connections, &flow.name, &services)? else {
        continue;
      };
      let manager = FlowManager::flow(flow, subset).with_call_timeout(config.call_timeout);
      endpoints.insert(manager.name().to_string(), Arc::new(manager));
    }

    for proxy in manifest.proxies {
      let services = called_services(&proxy.nodes, Some(&proxy.forward.service));
      let Some(subset) = select(&manifest.schema, &connections, &proxy.name, &services)? else {
        continue;
      };
      let manager = FlowManager::proxy(proxy, subset).with_call_timeout(config.call_timeout);
      endpoints.insert(manager.name().to_string(), Arc::new(manager));
    }

    let endpoints: Endpoints = Arc::new(endpoints);
    for listener in &config.listeners {
      listener.handle(endpoints.clone());
    }

    info!(
      endpoints = endpoints.len(),
      connections = connections.len(),
      listeners = config.listeners.len(),
      "engine ready"
    );

    Ok(Self {
      endpoints,
      connections,
      listeners: config.listeners,
    })
  }

  pub fn endpoints(&self) -> &Endpoints {
    &self.endpoints
  }

  pub fn endpoint(&self, name: &str) -> Option<Arc<FlowManager>> {
    self.endpoints.get(name).cloned()
  }

  /// Serve every listener concurrently.
  ///
  /// Returns once every listener returned. When a listener fails, the
  /// others are closed and the first error is returned after all of them
  /// stopped.
  pub async fn serve(&self) -> Result<(), EngineError> {
    let mut listeners = JoinSet::new();

    for listener in &self.listeners {
      let listener = listener.clone();
      info!(listener = %listener.name(), "serving listener");

      listeners.spawn(async move {
        listener
          .serve()
          .await
          .map_err(|source| EngineError::Listener {
            listener: listener.name().to_string(),
            source,
          })
      });
    }

    let mut first_error = None;

    while let Some(result) = listeners.join_next().await {
      let Err(e) = result.map_err(EngineError::from).and_then(|served| served) else {
        continue;
      };

      error!(error = %e, "listener failed");
      if first_error.is_none() {
        first_error = Some(e);
        futures::future::join_all(self.listeners.iter().map(|listener| listener.close())).await;
      }
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  /// Close the listeners, wait for every in-flight invocation and close
  /// the connections.
  pub async fn close(&self) {
    info!("closing engine");

    futures::future::join_all(self.listeners.iter().map(|listener| listener.close())).await;

    for manager in self.endpoints.values() {
      manager.close();
    }

    futures::future::join_all(self.endpoints.values().map(|manager| manager.wait())).await;

    for (service, call) in &self.connections {
      match call.close() {
        Ok(()) => info!(service = %service, "closed connection"),
        Err(e) => error!(service = %service, error = %e, "failed to close connection"),
      }
    }

    info!("engine closed");
  }
}

/// Services called by the given nodes, and the forward target of a proxy.
fn called_services<'a>(nodes: &'a [Node], forward: Option<&'a String>) -> BTreeSet<&'a str> {
  nodes
    .iter()
    .filter_map(|node| node.call.as_ref())
    .map(|call| call.service.as_str())
    .chain(forward.map(String::as_str))
    .collect()
}

/// The connections of the given services. Returns `None` when one of them
/// could not be dialed.
fn select(
  schema: &baton_specs::SchemaStore,
  connections: &Connections,
  flow: &str,
  services: &BTreeSet<&str>,
) -> Result<Option<Connections>, EngineError> {
  let mut subset = Connections::new();

  for service in services {
    if schema.get_service(service).is_none() {
      return Err(EngineError::UnknownService {
        flow: flow.to_string(),
        service: service.to_string(),
      });
    }

    match connections.get(*service) {
      Some(call) => {
        subset.insert(service.to_string(), call.clone());
      }
      None => {
        warn!(flow = %flow, service = %service, "flow not started, service is unavailable");
        return Ok(None);
      }
    }
  }

  Ok(Some(subset))
}
