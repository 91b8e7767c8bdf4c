use crate::function::Functions;
use crate::node::{Call, Node};
use crate::property::Property;
use crate::schema::SchemaStore;

/// Owner of a set of nodes; the namespace used for dependency diagnostics.
pub trait FlowResourceManager {
  fn name(&self) -> &str;

  fn nodes(&self) -> &[Node];

  fn nodes_mut(&mut self) -> &mut Vec<Node>;
}

/// A named graph of nodes rendering an output message.
#[derive(Debug, Clone, Default)]
pub struct Flow {
  pub name: String,
  pub input: Option<Property>,
  pub nodes: Vec<Node>,
  pub output: Option<Property>,
  /// Functions used by the output templates.
  pub functions: Functions,
}

/// A named graph of nodes forwarding the inbound request to a service once
/// every node completed.
#[derive(Debug, Clone, Default)]
pub struct Proxy {
  pub name: String,
  pub nodes: Vec<Node>,
  pub forward: Call,
}

impl FlowResourceManager for Flow {
  fn name(&self) -> &str {
    &self.name
  }

  fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  fn nodes_mut(&mut self) -> &mut Vec<Node> {
    &mut self.nodes
  }
}

impl FlowResourceManager for Proxy {
  fn name(&self) -> &str {
    &self.name
  }

  fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  fn nodes_mut(&mut self) -> &mut Vec<Node> {
    &mut self.nodes
  }
}

/// A resolved manifest ready to be served.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
  pub flows: Vec<Flow>,
  pub proxies: Vec<Proxy>,
  pub schema: SchemaStore,
}

impl Manifest {
  pub fn get_flow(&self, name: &str) -> Option<&Flow> {
    self.flows.iter().find(|flow| flow.name == name)
  }

  pub fn get_proxy(&self, name: &str) -> Option<&Proxy> {
    self.proxies.iter().find(|proxy| proxy.name == name)
  }
}
