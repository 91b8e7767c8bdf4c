use std::collections::{BTreeSet, HashSet};

use baton_conditions::new_evaluable_expression;
use baton_config::{CallDef, FlowDef, ManifestDef, NodeDef, ProxyDef, ServiceDef};
use baton_dependencies::resolve_manifest;
use baton_specs::template::{self, STACK_RESOURCE, join_path};
use baton_specs::{
  Call, CustomFunctions, Flow, Functions, Manifest, MethodDescriptor, Node, Proxy, SchemaStore,
  Service,
};
use tracing::{debug, info, warn};

use crate::ResolveError;
use crate::value::{schema_to_property, value_to_property};

/// Resolver transforms a ManifestDef into a servable Manifest.
pub trait Resolver: Send + Sync {
  /// Resolve a manifest definition.
  ///
  /// This process:
  /// 1. Builds the schema store from the service descriptions
  /// 2. Parses every template and compiles every condition
  /// 3. Derives implicit dependencies from the references of each node
  /// 4. Resolves and validates the dependency graph of every flow
  fn resolve(&self, def: ManifestDef) -> Result<Manifest, ResolveError>;
}

/// Standard resolver binding templates against a custom function table.
#[derive(Default)]
pub struct StandardResolver {
  functions: CustomFunctions,
}

impl StandardResolver {
  /// Create a new resolver with the given custom functions.
  pub fn new(functions: CustomFunctions) -> Self {
    Self { functions }
  }

  fn resolve_service(&self, def: ServiceDef) -> Result<Service, ResolveError> {
    let mut methods = Vec::with_capacity(def.methods.len());

    for method in def.methods {
      let path = join_path(&[def.name.as_str(), method.name.as_str()]);
      let input = method
        .input
        .as_ref()
        .map(|schema| schema_to_property(&path, "input", schema))
        .transpose()?;
      let output = method
        .output
        .as_ref()
        .map(|schema| schema_to_property(&path, "output", schema))
        .transpose()?;

      let mut resources = BTreeSet::new();
      for (option, value) in &method.options {
        let found = template::embedded_resources(value, &self.functions).map_err(|source| {
          ResolveError::Template {
            location: join_path(&[path.as_str(), "options", option.as_str()]),
            source,
          }
        })?;
        resources.extend(found);
      }

      methods.push(MethodDescriptor {
        name: method.name,
        options: method.options,
        input,
        output,
        resources,
      });
    }

    Ok(Service {
      name: def.name,
      transport: def.transport,
      options: def.options,
      methods,
    })
  }

  fn resolve_call(
    &self,
    schema: &SchemaStore,
    location: &str,
    def: CallDef,
    functions: &mut Functions,
  ) -> Result<Call, ResolveError> {
    let service = schema
      .get_service(&def.service)
      .ok_or_else(|| ResolveError::ServiceNotFound {
        location: location.to_string(),
        service: def.service.clone(),
      })?;

    if service.get_method(&def.method).is_none() {
      return Err(ResolveError::MethodNotFound {
        location: location.to_string(),
        service: def.service,
        method: def.method,
      });
    }

    let request = def
      .request
      .as_ref()
      .map(|request| value_to_property(location, "request", request, functions, &self.functions))
      .transpose()?;

    Ok(Call {
      service: def.service,
      method: def.method,
      request,
    })
  }

  fn resolve_node(
    &self,
    schema: &SchemaStore,
    owner: &str,
    def: NodeDef,
  ) -> Result<Node, ResolveError> {
    let location = join_path(&[owner, def.name.as_str()]);
    let mut node = Node::new(def.name);

    for edge in def.depends_on {
      node.depend_on(edge);
    }

    if let Some(raw) = def.condition {
      let mut condition =
        new_evaluable_expression(&raw).map_err(|source| ResolveError::Condition {
          location: location.clone(),
          source,
        })?;
      for param in condition.params.values_mut() {
        param.path = join_path(&[location.as_str(), param.path.as_str()]);
      }
      node.condition = Some(condition);
    }

    if let Some(call) = def.call {
      node.call = Some(self.resolve_call(schema, &location, call, &mut node.functions)?);
    }

    let mut implicit: BTreeSet<String> = node.resources().into_iter().map(String::from).collect();

    let method = node.call.as_ref().and_then(|call| {
      schema
        .get_service(&call.service)
        .and_then(|service| service.get_method(&call.method))
    });
    if let Some(method) = method {
      implicit.extend(method.resources.iter().cloned());
    }

    implicit.remove(STACK_RESOURCE);
    for edge in implicit {
      node.depend_on(edge);
    }

    debug!(
      location = %location,
      depends_on = ?node.depends_on.keys().collect::<Vec<_>>(),
      functions = node.functions.len(),
      "resolved node"
    );

    Ok(node)
  }

  fn resolve_nodes(
    &self,
    schema: &SchemaStore,
    owner: &str,
    defs: Vec<NodeDef>,
  ) -> Result<Vec<Node>, ResolveError> {
    let mut names = HashSet::new();
    let mut nodes = Vec::with_capacity(defs.len());

    for def in defs {
      if !names.insert(def.name.clone()) {
        return Err(ResolveError::DuplicateNode {
          owner: owner.to_string(),
          node: def.name,
        });
      }
      nodes.push(self.resolve_node(schema, owner, def)?);
    }

    Ok(nodes)
  }

  fn resolve_flow(&self, schema: &SchemaStore, def: FlowDef) -> Result<Flow, ResolveError> {
    let input = def
      .input
      .as_ref()
      .map(|input| schema_to_property(&def.name, "input", input))
      .transpose()?;

    let nodes = self.resolve_nodes(schema, &def.name, def.nodes)?;

    let mut functions = Functions::new();
    let output = def
      .output
      .as_ref()
      .map(|output| value_to_property(&def.name, "output", output, &mut functions, &self.functions))
      .transpose()?;

    Ok(Flow {
      name: def.name,
      input,
      nodes,
      output,
      functions,
    })
  }

  fn resolve_proxy(&self, schema: &SchemaStore, def: ProxyDef) -> Result<Proxy, ResolveError> {
    let nodes = self.resolve_nodes(schema, &def.name, def.nodes)?;

    let location = join_path(&[def.name.as_str(), "forward"]);
    let mut functions = Functions::new();
    let forward = self.resolve_call(schema, &location, def.forward, &mut functions)?;

    if !functions.is_empty() || forward.request.is_some() {
      warn!(proxy = %def.name, "proxy forward request is ignored, the inbound body is forwarded");
    }

    Ok(Proxy {
      name: def.name,
      nodes,
      forward,
    })
  }
}

impl Resolver for StandardResolver {
  fn resolve(&self, def: ManifestDef) -> Result<Manifest, ResolveError> {
    let mut schema = SchemaStore::new();
    for service in def.services {
      schema.add_service(self.resolve_service(service)?);
    }

    let mut names = HashSet::new();
    let mut manifest = Manifest::default();

    for flow in def.flows {
      if !names.insert(flow.name.clone()) {
        return Err(ResolveError::DuplicateFlow { name: flow.name });
      }
      manifest.flows.push(self.resolve_flow(&schema, flow)?);
    }

    for proxy in def.proxies {
      if !names.insert(proxy.name.clone()) {
        return Err(ResolveError::DuplicateFlow { name: proxy.name });
      }
      manifest.proxies.push(self.resolve_proxy(&schema, proxy)?);
    }

    manifest.schema = schema;
    resolve_manifest(&mut manifest)?;

    info!(
      flows = manifest.flows.len(),
      proxies = manifest.proxies.len(),
      services = manifest.schema.services().count(),
      "resolved manifest"
    );

    Ok(manifest)
  }
}
