use serde::{Deserialize, Serialize};

use crate::flow::{FlowDef, ProxyDef};
use crate::service::ServiceDef;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestDef {
  #[serde(default)]
  pub services: Vec<ServiceDef>,
  #[serde(default)]
  pub flows: Vec<FlowDef>,
  #[serde(default)]
  pub proxies: Vec<ProxyDef>,
}

impl ManifestDef {
  pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(raw)
  }

  pub fn from_slice(raw: &[u8]) -> Result<Self, serde_json::Error> {
    serde_json::from_slice(raw)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_parse_manifest() {
    let raw = json!({
      "services": [{
        "name": "users",
        "options": { "host": "http://users.local" },
        "methods": [{
          "name": "get",
          "options": { "endpoint": "/users/{{ input:id }}" },
          "output": { "name": "string" }
        }]
      }],
      "flows": [{
        "name": "user",
        "input": { "id": "int64" },
        "nodes": [{
          "name": "user",
          "condition": "{{ input:id }} > 0",
          "call": { "service": "users", "method": "get" }
        }],
        "output": { "name": "{{ user:name }}" }
      }],
      "proxies": [{
        "name": "gateway",
        "forward": { "service": "users", "method": "get" }
      }]
    });

    let manifest = ManifestDef::from_json(&raw.to_string()).unwrap();

    let service = &manifest.services[0];
    assert_eq!(service.transport, "http");
    assert_eq!(service.options["host"], "http://users.local");
    assert_eq!(service.methods[0].output, Some(json!({ "name": "string" })));

    let flow = &manifest.flows[0];
    assert_eq!(flow.nodes[0].depends_on, Vec::<String>::new());
    assert_eq!(flow.nodes[0].condition.as_deref(), Some("{{ input:id }} > 0"));
    assert_eq!(flow.nodes[0].call.as_ref().unwrap().request, None);

    let proxy = &manifest.proxies[0];
    assert!(proxy.nodes.is_empty());
    assert_eq!(proxy.forward.service, "users");
  }

  #[test]
  fn test_empty_manifest() {
    let manifest = ManifestDef::from_json("{}").unwrap();
    assert_eq!(manifest, ManifestDef::default());
  }

  #[test]
  fn test_serialize_skips_empty_optionals() {
    let manifest = ManifestDef::from_json(
      r#"{ "flows": [{ "name": "empty", "nodes": [{ "name": "noop" }] }] }"#,
    )
    .unwrap();

    let value = serde_json::to_value(&manifest).unwrap();
    assert_eq!(
      value["flows"][0],
      json!({ "name": "empty", "nodes": [{ "name": "noop", "depends_on": [] }] })
    );
  }
}
