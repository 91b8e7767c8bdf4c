use std::collections::BTreeMap;
use std::sync::Arc;

use minijinja::Expression;

use crate::property::Property;

/// A compiled branch guard.
#[derive(Debug, Clone)]
pub struct Condition {
  /// Expression as written in the manifest.
  pub raw: String,
  /// Expression with every template replaced by its identifier.
  pub expression: String,
  /// Compiled form of `expression`.
  pub evaluator: Arc<Expression<'static, 'static>>,
  /// Parameters keyed by canonical name (`resource:path`).
  pub params: BTreeMap<String, Property>,
  /// Identifier used inside `expression` for each canonical name.
  pub identifiers: BTreeMap<String, String>,
}

impl Condition {
  /// Resources read by the parameters. A bare parameter reads the whole
  /// resource named after it.
  pub fn resources(&self) -> impl Iterator<Item = &str> {
    self.params.iter().map(|(name, property)| match &property.reference {
      Some(reference) => reference.resource.as_str(),
      None => name.as_str(),
    })
  }
}
