use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::property::Property;

/// Transport specific options.
pub type Options = BTreeMap<String, String>;

/// A method advertised by a service description.
#[derive(Debug, Clone, Default)]
pub struct MethodDescriptor {
  pub name: String,
  pub options: Options,
  pub input: Option<Property>,
  pub output: Option<Property>,
  /// Resources read by templates embedded in the options, e.g. an endpoint
  /// of `/users/{{ user:id }}` reads `user`.
  pub resources: BTreeSet<String>,
}

/// A backend service description.
#[derive(Debug, Clone, Default)]
pub struct Service {
  pub name: String,
  /// Name of the caller dialing this service, e.g. `http`.
  pub transport: String,
  pub options: Options,
  pub methods: Vec<MethodDescriptor>,
}

impl Service {
  pub fn get_method(&self, name: &str) -> Option<&MethodDescriptor> {
    self.methods.iter().find(|method| method.name == name)
  }
}

/// Collection of service schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaStore {
  services: BTreeMap<String, Service>,
}

impl SchemaStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a service, replacing an existing service with the same name.
  pub fn add_service(&mut self, service: Service) {
    debug!(service = %service.name, "appending service to schema store");
    self.services.insert(service.name.clone(), service);
  }

  pub fn get_service(&self, name: &str) -> Option<&Service> {
    self.services.get(name)
  }

  pub fn services(&self) -> impl Iterator<Item = &Service> {
    self.services.values()
  }
}
