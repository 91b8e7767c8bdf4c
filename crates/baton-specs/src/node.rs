use std::collections::{BTreeMap, BTreeSet};

use crate::condition::Condition;
use crate::function::Functions;
use crate::property::{Property, PropertyReference};

/// State of a single `depends_on` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
  /// Not resolved (yet), or referencing something outside the local node
  /// set such as the `input` resource.
  Unresolved,
  /// Resolved to the node at this index of the owning flow.
  Resolved(usize),
}

/// Call performed by a node.
#[derive(Debug, Clone, Default)]
pub struct Call {
  pub service: String,
  pub method: String,
  /// Request message rendered from the store before dispatching.
  pub request: Option<Property>,
}

/// A single call site in a flow.
#[derive(Debug, Clone, Default)]
pub struct Node {
  pub name: String,
  pub depends_on: BTreeMap<String, Dependency>,
  pub condition: Option<Condition>,
  pub call: Option<Call>,
  /// Functions used by the templates of this node.
  pub functions: Functions,
}

impl Node {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  /// Declare a dependency on the given name.
  pub fn depend_on(&mut self, name: impl Into<String>) {
    self
      .depends_on
      .entry(name.into())
      .or_insert(Dependency::Unresolved);
  }

  /// Indices of the nodes this node depends on.
  pub fn resolved_dependencies(&self) -> impl Iterator<Item = usize> + '_ {
    self.depends_on.values().filter_map(|dependency| match dependency {
      Dependency::Resolved(index) => Some(*index),
      Dependency::Unresolved => None,
    })
  }

  /// Every reference read by this node: its request, its condition
  /// parameters and the arguments of its functions.
  pub fn references(&self) -> Vec<&PropertyReference> {
    let mut result = Vec::new();

    if let Some(request) = self.call.as_ref().and_then(|call| call.request.as_ref()) {
      result.extend(request.references());
    }

    if let Some(condition) = &self.condition {
      for property in condition.params.values() {
        result.extend(property.references());
      }
    }

    for function in self.functions.iter() {
      for argument in &function.arguments {
        result.extend(argument.references());
      }
    }

    result
  }

  /// Names of the resources read by this node, including the bare
  /// parameters of its condition.
  pub fn resources(&self) -> BTreeSet<&str> {
    let mut result: BTreeSet<&str> = self
      .references()
      .into_iter()
      .map(|reference| reference.resource.as_str())
      .collect();

    if let Some(condition) = &self.condition {
      result.extend(condition.resources());
    }

    result
  }
}
