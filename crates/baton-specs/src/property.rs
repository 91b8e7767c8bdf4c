use std::collections::BTreeMap;

use baton_refs::{Key, Store, StoreError};
use serde_json::Value;

/// Scalar kind of a property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Type {
  /// Not known yet, e.g. a plain template reference before it is bound.
  #[default]
  Unknown,
  String,
  Bool,
  Int32,
  Int64,
  Uint32,
  Uint64,
  Float,
  Double,
  Bytes,
  Message,
  Enum,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Label {
  #[default]
  Optional,
  Required,
  Repeated,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scalar {
  pub kind: Type,
  pub label: Label,
}

/// Composite property holding nested properties, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
  pub properties: BTreeMap<String, Property>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enum {
  pub name: String,
  pub keys: Vec<String>,
}

/// The shape of a property. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
  Scalar(Scalar),
  Message(Message),
  Enum(Enum),
}

impl Default for Template {
  fn default() -> Self {
    Template::Scalar(Scalar::default())
  }
}

/// Address of a value elsewhere in the execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyReference {
  /// Logical origin: `input`, `header`, `stack` or a node name.
  pub resource: String,
  /// Dot-delimited field path inside the resource, empty for the whole resource.
  pub path: String,
  /// Declared return shape, only set for function results.
  pub property: Option<Box<Property>>,
}

impl PropertyReference {
  pub fn new(resource: impl Into<String>, path: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      path: path.into(),
      property: None,
    }
  }

  /// Store key this reference reads from.
  pub fn key(&self) -> Key {
    Key::new(self.resource.clone(), self.path.clone())
  }
}

/// A typed, uniquely pathed value descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Property {
  pub name: String,
  pub path: String,
  pub description: Option<String>,
  pub template: Template,
  pub default: Option<Value>,
  pub reference: Option<PropertyReference>,
}

impl Property {
  pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      path: path.into(),
      ..Default::default()
    }
  }

  /// Anonymous shape of the given scalar kind, used for function return types.
  pub fn scalar(kind: Type) -> Self {
    Self {
      template: Template::Scalar(Scalar {
        kind,
        label: Label::Optional,
      }),
      ..Default::default()
    }
  }

  /// Constant property whose value is its default.
  pub fn constant(name: impl Into<String>, path: impl Into<String>, value: Value) -> Self {
    let kind = match &value {
      Value::String(_) => Type::String,
      Value::Bool(_) => Type::Bool,
      Value::Number(number) if number.is_i64() => Type::Int64,
      Value::Number(number) if number.is_u64() => Type::Uint64,
      Value::Number(_) => Type::Double,
      Value::Array(_) | Value::Object(_) | Value::Null => Type::Unknown,
    };

    let label = if value.is_array() {
      Label::Repeated
    } else {
      Label::Optional
    };

    Self {
      name: name.into(),
      path: path.into(),
      template: Template::Scalar(Scalar { kind, label }),
      default: Some(value),
      ..Default::default()
    }
  }

  /// Composite property holding the given nested properties.
  pub fn message(
    name: impl Into<String>,
    path: impl Into<String>,
    properties: BTreeMap<String, Property>,
  ) -> Self {
    Self {
      name: name.into(),
      path: path.into(),
      template: Template::Message(Message { properties }),
      ..Default::default()
    }
  }

  /// The kind of this property: the scalar kind, `Message` or `Enum`.
  pub fn kind(&self) -> Type {
    match &self.template {
      Template::Scalar(scalar) => scalar.kind,
      Template::Message(_) => Type::Message,
      Template::Enum(_) => Type::Enum,
    }
  }

  pub fn label(&self) -> Label {
    match &self.template {
      Template::Scalar(scalar) => scalar.label,
      _ => Label::Optional,
    }
  }

  pub fn message_properties(&self) -> Option<&BTreeMap<String, Property>> {
    match &self.template {
      Template::Message(message) => Some(&message.properties),
      _ => None,
    }
  }

  /// All references held by this property and its nested properties.
  pub fn references(&self) -> Vec<&PropertyReference> {
    let mut result = Vec::new();
    self.collect_references(&mut result);
    result
  }

  fn collect_references<'a>(&'a self, result: &mut Vec<&'a PropertyReference>) {
    if let Some(reference) = &self.reference {
      result.push(reference);
    }

    if let Some(properties) = self.message_properties() {
      for property in properties.values() {
        property.collect_references(result);
      }
    }
  }

  /// Leaf properties ordered by path. A non-message property is its own leaf.
  pub fn leaves(&self) -> Vec<&Property> {
    let mut result = Vec::new();
    self.collect_leaves(&mut result);
    result.sort_by(|a, b| a.path.cmp(&b.path));
    result
  }

  fn collect_leaves<'a>(&'a self, result: &mut Vec<&'a Property>) {
    match self.message_properties() {
      Some(properties) => {
        for property in properties.values() {
          property.collect_leaves(result);
        }
      }
      None => result.push(self),
    }
  }

  /// Produce the runtime value of this property.
  ///
  /// References are read from the store (falling back to the default when
  /// the stored value is `null`), messages are rendered as JSON objects and
  /// anything else yields its default.
  pub fn resolve(&self, store: &Store) -> Result<Value, StoreError> {
    if let Some(reference) = &self.reference {
      let value = store.load(&reference.key())?;
      return Ok(match (&value, &self.default) {
        (Value::Null, Some(default)) => default.clone(),
        _ => value,
      });
    }

    match &self.template {
      Template::Message(message) => {
        let mut object = serde_json::Map::new();
        for (name, property) in &message.properties {
          object.insert(name.clone(), property.resolve(store)?);
        }
        Ok(Value::Object(object))
      }
      _ => Ok(self.default.clone().unwrap_or(Value::Null)),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn referencing(name: &str, resource: &str, path: &str) -> Property {
    Property {
      reference: Some(PropertyReference::new(resource, path)),
      ..Property::new(name, name)
    }
  }

  #[test]
  fn test_constant_kinds() {
    assert_eq!(Property::constant("a", "a", json!("x")).kind(), Type::String);
    assert_eq!(Property::constant("a", "a", json!(1)).kind(), Type::Int64);
    assert_eq!(Property::constant("a", "a", json!(1.5)).kind(), Type::Double);
    assert_eq!(Property::constant("a", "a", json!(true)).kind(), Type::Bool);
    assert_eq!(
      Property::constant("a", "a", json!([1])).label(),
      Label::Repeated
    );
  }

  #[test]
  fn test_resolve_message_from_store() {
    let store = Store::new();
    store.set(Key::resource("input"), json!({ "id": 7, "name": null }));

    let mut properties = BTreeMap::new();
    properties.insert("id".to_string(), referencing("id", "input", "id"));
    properties.insert("kind".to_string(), Property::constant("kind", "kind", json!("user")));
    properties.insert(
      "name".to_string(),
      Property {
        default: Some(json!("anonymous")),
        ..referencing("name", "input", "name")
      },
    );

    let request = Property::message("request", "request", properties);
    let value = request.resolve(&store).unwrap();

    assert_eq!(value, json!({ "id": 7, "kind": "user", "name": "anonymous" }));
  }

  #[test]
  fn test_resolve_unwritten_reference_fails() {
    let store = Store::new();
    let property = referencing("id", "fetch", "id");

    assert!(property.resolve(&store).is_err());
  }

  #[test]
  fn test_leaves_and_references() {
    let mut inner = BTreeMap::new();
    inner.insert("b".to_string(), referencing("b", "node", "b"));
    let mut outer = BTreeMap::new();
    outer.insert("z".to_string(), referencing("z", "input", "z"));
    outer.insert("a".to_string(), Property::message("a", "a", inner));

    let property = Property::message("root", "", outer);

    let leaves: Vec<_> = property.leaves().into_iter().map(|p| p.path.as_str()).collect();
    assert_eq!(leaves, vec!["b", "z"]);

    let resources: Vec<_> = property
      .references()
      .into_iter()
      .map(|r| r.resource.as_str())
      .collect();
    assert_eq!(resources, vec!["node", "input"]);
  }
}
