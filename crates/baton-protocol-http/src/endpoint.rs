use baton_protocol::CallError;
use baton_refs::Store;
use baton_specs::template::{self, Fragment};
use baton_specs::{CustomFunctions, Functions, Property, TemplateError};
use serde_json::Value;

#[derive(Debug, Clone)]
enum Segment {
  Literal(String),
  Template(Property),
}

/// Endpoint path with embedded templates.
///
/// Substituted values are percent-encoded, so a value can never add path
/// segments, a query or a fragment.
#[derive(Debug, Clone, Default)]
pub struct Endpoint {
  segments: Vec<Segment>,
  functions: Functions,
}

impl Endpoint {
  /// Parse the given endpoint. `path` names the owning method and is used
  /// as the property path of embedded templates.
  pub fn parse(path: &str, raw: &str, custom: &CustomFunctions) -> Result<Self, CallError> {
    let invalid = |err: TemplateError| CallError::InvalidOption {
      option: crate::ENDPOINT_OPTION.to_string(),
      message: err.to_string(),
    };

    let mut segments = Vec::new();
    let mut functions = Functions::new();

    for fragment in template::split_templates(raw).map_err(invalid)? {
      let segment = match fragment {
        Fragment::Literal(literal) => Segment::Literal(literal.to_string()),
        Fragment::Template(content) => {
          let name = format!("endpoint{}", segments.len());
          let property = template::parse_template(path, &name, &mut functions, custom, content)
            .map_err(invalid)?;
          Segment::Template(property)
        }
      };
      segments.push(segment);
    }

    Ok(Self {
      segments,
      functions,
    })
  }

  /// Properties substituted into the endpoint.
  pub(crate) fn templates(&self) -> impl Iterator<Item = &Property> {
    self.segments.iter().filter_map(|segment| match segment {
      Segment::Template(property) => Some(property),
      Segment::Literal(_) => None,
    })
  }

  /// Substitute every template with its value from the store.
  pub fn render(&self, store: &Store) -> Result<String, CallError> {
    self.functions.execute(store)?;

    let mut result = String::new();
    for segment in &self.segments {
      match segment {
        Segment::Literal(literal) => result.push_str(literal),
        Segment::Template(property) => match property.resolve(store)? {
          Value::String(value) => result.push_str(&urlencoding::encode(&value)),
          Value::Null => {}
          value => result.push_str(&urlencoding::encode(&value.to_string())),
        },
      }
    }

    Ok(result)
  }
}
