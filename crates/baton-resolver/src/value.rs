use std::collections::BTreeMap;

use baton_config::ValueDef;
use baton_specs::template::{self, join_path};
use baton_specs::{CustomFunctions, Enum, Functions, Label, Property, Scalar, Template, Type};
use serde_json::Value;

use crate::ResolveError;

/// Convert a value definition into a property.
///
/// String leaves are templates (`{{ ... }}`) or string constants, objects
/// become messages and every other value is a constant. Functions used by
/// the templates are registered into `functions`.
pub fn value_to_property(
  path: &str,
  name: &str,
  value: &ValueDef,
  functions: &mut Functions,
  custom: &CustomFunctions,
) -> Result<Property, ResolveError> {
  let full = join_path(&[path, name]);

  match value {
    Value::String(raw) if template::is_template(raw) => {
      template::parse_template(path, name, functions, custom, raw).map_err(|source| {
        ResolveError::Template {
          location: full,
          source,
        }
      })
    }
    Value::Object(fields) => {
      let mut properties = BTreeMap::new();
      for (key, field) in fields {
        let property = value_to_property(&full, key, field, functions, custom)?;
        properties.insert(key.clone(), property);
      }
      Ok(Property::message(name, full, properties))
    }
    Value::Array(items) if items.iter().any(contains_template) => Err(ResolveError::InvalidValue {
      location: full,
      message: "templates inside arrays are not supported".to_string(),
    }),
    constant => Ok(Property::constant(name, full, constant.clone())),
  }
}

fn contains_template(value: &Value) -> bool {
  match value {
    Value::String(raw) => template::is_template(raw),
    Value::Array(items) => items.iter().any(contains_template),
    Value::Object(fields) => fields.values().any(contains_template),
    _ => false,
  }
}

/// Parse a scalar type name.
pub fn parse_type(name: &str) -> Option<Type> {
  let kind = match name {
    "string" => Type::String,
    "bool" => Type::Bool,
    "int32" => Type::Int32,
    "int64" => Type::Int64,
    "uint32" => Type::Uint32,
    "uint64" => Type::Uint64,
    "float" => Type::Float,
    "double" => Type::Double,
    "bytes" => Type::Bytes,
    _ => return None,
  };
  Some(kind)
}

/// Parse an enum type, e.g. `enum(ACTIVE, INACTIVE)`, into its keys.
fn parse_enum(name: &str) -> Option<Vec<String>> {
  let keys = name.strip_prefix("enum(")?.strip_suffix(')')?;
  Some(
    keys
      .split(',')
      .map(str::trim)
      .filter(|key| !key.is_empty())
      .map(String::from)
      .collect(),
  )
}

/// Convert a schema definition into a property.
///
/// String leaves name a scalar type or an enum, objects become messages and
/// a single element array marks its element as repeated.
pub fn schema_to_property(path: &str, name: &str, schema: &ValueDef) -> Result<Property, ResolveError> {
  let full = join_path(&[path, name]);
  let invalid = |message: String| ResolveError::InvalidSchema {
    location: full.clone(),
    message,
  };

  match schema {
    Value::String(kind) if kind.starts_with("enum(") => {
      let keys = parse_enum(kind)
        .filter(|keys| !keys.is_empty())
        .ok_or_else(|| invalid(format!("invalid enum '{kind}'")))?;
      Ok(Property {
        template: Template::Enum(Enum {
          name: name.to_string(),
          keys,
        }),
        ..Property::new(name, full.clone())
      })
    }
    Value::String(kind) => {
      let kind = parse_type(kind).ok_or_else(|| invalid(format!("unknown type '{kind}'")))?;
      Ok(Property {
        template: Template::Scalar(Scalar {
          kind,
          label: Label::Optional,
        }),
        ..Property::new(name, full.clone())
      })
    }
    Value::Object(fields) => {
      let mut properties = BTreeMap::new();
      for (key, field) in fields {
        properties.insert(key.clone(), schema_to_property(&full, key, field)?);
      }
      Ok(Property::message(name, full.clone(), properties))
    }
    Value::Array(items) if items.len() == 1 => {
      let mut property = schema_to_property(path, name, &items[0])?;
      if let Template::Scalar(scalar) = &mut property.template {
        scalar.label = Label::Repeated;
      }
      Ok(property)
    }
    other => Err(invalid(format!("unexpected schema value {other}"))),
  }
}
