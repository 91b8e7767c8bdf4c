use std::collections::HashSet;

use baton_specs::{Dependency, FlowResourceManager, Manifest};
use tracing::debug;

use crate::DependencyError;

/// Edge rewrites collected while tracing an owner.
#[derive(Debug, Default)]
pub struct Plan {
  removals: Vec<(usize, String)>,
  resolutions: Vec<(usize, String, usize)>,
  completed: HashSet<usize>,
}

impl Plan {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.removals.is_empty() && self.resolutions.is_empty()
  }

  /// Apply the collected rewrites to the nodes of the given owner.
  pub fn apply<M: FlowResourceManager + ?Sized>(self, owner: &mut M) {
    if self.is_empty() {
      return;
    }

    let nodes = owner.nodes_mut();

    for (node, edge) in self.removals {
      if let Some(node) = nodes.get_mut(node) {
        node.depends_on.remove(&edge);
      }
    }

    for (node, edge, target) in self.resolutions {
      if let Some(node) = nodes.get_mut(node) {
        node.depends_on.insert(edge, Dependency::Resolved(target));
      }
    }
  }
}

/// Resolve the dependencies of every flow and proxy of the manifest.
///
/// Every owner is traced before anything is rewritten, so the first error
/// leaves the whole manifest untouched.
pub fn resolve_manifest(manifest: &mut Manifest) -> Result<(), DependencyError> {
  let flows = manifest
    .flows
    .iter()
    .map(|flow| plan_owner(flow))
    .collect::<Result<Vec<_>, _>>()?;
  let proxies = manifest
    .proxies
    .iter()
    .map(|proxy| plan_owner(proxy))
    .collect::<Result<Vec<_>, _>>()?;

  for (flow, plan) in manifest.flows.iter_mut().zip(flows) {
    plan.apply(flow);
  }
  for (proxy, plan) in manifest.proxies.iter_mut().zip(proxies) {
    plan.apply(proxy);
  }

  Ok(())
}

/// Resolve the dependencies of every node of a single owner.
pub fn resolve_owner<M: FlowResourceManager + ?Sized>(owner: &mut M) -> Result<(), DependencyError> {
  let plan = plan_owner(&*owner)?;
  plan.apply(owner);
  Ok(())
}

/// Trace every node of the owner without rewriting anything.
///
/// Each top-level node starts with an empty in-progress set.
pub fn plan_owner<M: FlowResourceManager + ?Sized>(owner: &M) -> Result<Plan, DependencyError> {
  let mut plan = Plan::new();

  for index in 0..owner.nodes().len() {
    let mut in_progress = HashSet::new();
    resolve_node(owner, index, &mut in_progress, &mut plan)?;
  }

  debug!(
    owner = %owner.name(),
    removals = plan.removals.len(),
    resolutions = plan.resolutions.len(),
    "resolved dependencies"
  );

  Ok(plan)
}

/// Trace the dependencies of the node at `index`, recording edge rewrites
/// into `plan`.
///
/// `in_progress` holds the nodes on the current traversal path. A node
/// leaves the set once all its edges have been traced.
pub fn resolve_node<M: FlowResourceManager + ?Sized>(
  owner: &M,
  index: usize,
  in_progress: &mut HashSet<usize>,
  plan: &mut Plan,
) -> Result<(), DependencyError> {
  if plan.completed.contains(&index) {
    return Ok(());
  }

  let Some(node) = owner.nodes().get(index) else {
    return Ok(());
  };

  in_progress.insert(index);

  for edge in node.depends_on.keys() {
    if *edge == node.name {
      plan.removals.push((index, edge.clone()));
      continue;
    }

    let Some(target) = find_node(owner, edge) else {
      continue;
    };

    if in_progress.contains(&target) {
      return Err(DependencyError::CircularDependency {
        owner: owner.name().to_string(),
        node: node.name.clone(),
        edge: edge.clone(),
      });
    }

    resolve_node(owner, target, in_progress, plan)?;
    plan.resolutions.push((index, edge.clone(), target));
  }

  in_progress.remove(&index);
  plan.completed.insert(index);

  Ok(())
}

/// Index of the node with the given name.
pub fn find_node<M: FlowResourceManager + ?Sized>(owner: &M, name: &str) -> Option<usize> {
  owner.nodes().iter().position(|node| node.name == name)
}
