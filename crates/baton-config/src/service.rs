use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ValueDef;

fn default_transport() -> String {
  "http".to_string()
}

/// A backend service description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDef {
  pub name: String,
  /// Name of the caller dialing this service.
  #[serde(default = "default_transport")]
  pub transport: String,
  #[serde(default)]
  pub options: BTreeMap<String, String>,
  #[serde(default)]
  pub methods: Vec<MethodDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
  pub name: String,
  #[serde(default)]
  pub options: BTreeMap<String, String>,
  /// Schema of the request message.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input: Option<ValueDef>,
  /// Schema of the response message.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<ValueDef>,
}
