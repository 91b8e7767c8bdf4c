use serde::{Deserialize, Serialize};

use crate::ValueDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDef {
  pub name: String,
  /// Schema of the flow input.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input: Option<ValueDef>,
  #[serde(default)]
  pub nodes: Vec<NodeDef>,
  /// Output message, string leaves are templates or constants.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<ValueDef>,
}

/// A flow forwarding the inbound request once its nodes completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyDef {
  pub name: String,
  #[serde(default)]
  pub nodes: Vec<NodeDef>,
  pub forward: CallDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub name: String,
  /// Explicit dependencies. References used by the node are added
  /// implicitly.
  #[serde(default)]
  pub depends_on: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub call: Option<CallDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDef {
  pub service: String,
  pub method: String,
  /// Request message, string leaves are templates or constants.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub request: Option<ValueDef>,
}
