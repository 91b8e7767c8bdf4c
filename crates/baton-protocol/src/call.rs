use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use baton_refs::Store;
use baton_specs::{CustomFunctions, Options, Property, Service};
use tracing::debug;

use crate::{CallError, Request, ResponseWriter};

/// A named call target advertised by a dialed service.
pub trait Method: Send + Sync {
  fn name(&self) -> &str;

  /// Properties this method exposes to downstream references, ordered by
  /// path. May be empty.
  fn references(&self) -> Vec<&Property>;
}

/// A dialed connection to a backend service.
#[async_trait]
pub trait Call: Send + Sync {
  /// Every method advertised by the service.
  fn methods(&self) -> Vec<&dyn Method>;

  /// Look up a method by name.
  fn method(&self, name: &str) -> Option<&dyn Method>;

  /// Send a message to the backend.
  ///
  /// The call honours the request timeout and cancellation token. The
  /// status and raw body are written to `writer` only when the backend call
  /// succeeded.
  async fn send_msg(
    &self,
    writer: &mut dyn ResponseWriter,
    request: Request,
    store: &Store,
  ) -> Result<(), CallError>;

  /// Release the resources held by this call. Calling it more than once is
  /// a no-op.
  fn close(&self) -> Result<(), CallError>;
}

/// Per transport factory dialing services.
pub trait Caller: Send + Sync {
  /// Transport name matched against `Service::transport`.
  fn name(&self) -> &str;

  /// Dial the given service. Method references are bound at call time.
  fn dial(
    &self,
    service: &Service,
    functions: &CustomFunctions,
    options: &Options,
  ) -> Result<Arc<dyn Call>, CallError>;
}

/// Registry of available transports.
#[derive(Clone, Default)]
pub struct Callers {
  entries: HashMap<String, Arc<dyn Caller>>,
}

impl Callers {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a transport under its name, replacing an existing one.
  pub fn register(&mut self, caller: Arc<dyn Caller>) {
    debug!(transport = %caller.name(), "registering caller");
    self.entries.insert(caller.name().to_string(), caller);
  }

  pub fn with(mut self, caller: Arc<dyn Caller>) -> Self {
    self.register(caller);
    self
  }

  pub fn get(&self, transport: &str) -> Option<Arc<dyn Caller>> {
    self.entries.get(transport).cloned()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }
}

impl std::fmt::Debug for Callers {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Callers")
      .field("transports", &self.names().collect::<Vec<_>>())
      .finish()
  }
}
