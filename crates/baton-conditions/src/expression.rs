use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use baton_refs::{Key, Store};
use baton_specs::template::{REFERENCE_DELIMITER, TEMPLATE_CLOSE, TEMPLATE_OPEN, join_path};
use baton_specs::{Condition, Property, template};
use minijinja::{Environment, Value};
use tracing::debug;

use crate::ConditionError;

static ENVIRONMENT: LazyLock<Environment<'static>> = LazyLock::new(Environment::new);

const IDENTIFIER_PREFIX: &str = "__p";

/// Path prefix of condition parameters.
const CONDITION_PATH: &str = "condition";

/// Evaluation of a compiled condition against a runtime store.
pub trait Evaluate {
  fn evaluate(&self, store: &Store) -> Result<bool, ConditionError>;
}

/// Compile the given raw expression into a condition.
pub fn new_evaluable_expression(raw: &str) -> Result<Condition, ConditionError> {
  let unbalanced = || ConditionError::UnbalancedTemplate {
    expression: raw.to_string(),
  };

  let mut params = BTreeMap::new();
  let mut identifiers: BTreeMap<String, String> = BTreeMap::new();
  let mut rewritten = String::with_capacity(raw.len());
  let mut rest = raw;

  while let Some(open) = rest.find(TEMPLATE_OPEN) {
    let (before, after) = rest.split_at(open);
    if before.contains(TEMPLATE_CLOSE) {
      return Err(unbalanced());
    }

    let after = &after[TEMPLATE_OPEN.len()..];
    let close = after.find(TEMPLATE_CLOSE).ok_or_else(unbalanced)?;
    let content = after[..close].trim();
    if content.contains(TEMPLATE_OPEN) {
      return Err(unbalanced());
    }

    let (name, property) = parse_param(content)?;
    let next = identifiers.len();
    let identifier = identifiers
      .entry(name.clone())
      .or_insert_with(|| format!("{IDENTIFIER_PREFIX}{next}"))
      .clone();
    params.entry(name).or_insert(property);

    rewritten.push_str(&normalize_operators(before));
    rewritten.push(' ');
    rewritten.push_str(&identifier);
    rewritten.push(' ');
    rest = &after[close + TEMPLATE_CLOSE.len()..];
  }

  if rest.contains(TEMPLATE_CLOSE) {
    return Err(unbalanced());
  }
  rewritten.push_str(&normalize_operators(rest));

  let expression = rewritten.trim().to_string();
  let evaluator = ENVIRONMENT
    .compile_expression_owned(expression.clone())
    .map_err(|source| ConditionError::Compile {
      expression: raw.to_string(),
      source,
    })?;

  debug!(raw = %raw, expression = %expression, params = params.len(), "compiled condition");

  Ok(Condition {
    raw: raw.to_string(),
    expression,
    evaluator: Arc::new(evaluator),
    params,
    identifiers,
  })
}

/// Resolve a template into its canonical parameter name and property.
///
/// Bare names without a resource delimiter carry no reference. They read
/// the whole resource of that name.
fn parse_param(content: &str) -> Result<(String, Property), ConditionError> {
  let reference = template::parse_property_reference(content)?;
  let path = join_path(&[CONDITION_PATH, reference.resource.as_str(), reference.path.as_str()]);

  if !content.contains(REFERENCE_DELIMITER) {
    let name = reference.resource;
    return Ok((name.clone(), Property::new(name, path)));
  }

  let name = reference.key().to_string();
  let property = Property {
    reference: Some(reference),
    ..Property::new(name.clone(), path)
  };

  Ok((name, property))
}

/// Rewrite `&&`, `||` and `!` into their keyword form. String literals are
/// copied untouched and `!=` is kept.
fn normalize_operators(expression: &str) -> String {
  let mut result = String::with_capacity(expression.len());
  let mut chars = expression.chars().peekable();
  let mut quote: Option<char> = None;

  while let Some(c) = chars.next() {
    if let Some(open) = quote {
      result.push(c);
      if c == open {
        quote = None;
      }
      continue;
    }

    match c {
      '\'' | '"' => {
        quote = Some(c);
        result.push(c);
      }
      '&' if chars.peek() == Some(&'&') => {
        chars.next();
        result.push_str(" and ");
      }
      '|' if chars.peek() == Some(&'|') => {
        chars.next();
        result.push_str(" or ");
      }
      '!' if chars.peek() != Some(&'=') => result.push_str(" not "),
      _ => result.push(c),
    }
  }

  result
}

impl Evaluate for Condition {
  fn evaluate(&self, store: &Store) -> Result<bool, ConditionError> {
    let mut context = BTreeMap::new();

    for (name, identifier) in &self.identifiers {
      let value = match self.params.get(name).and_then(|p| p.reference.as_ref()) {
        Some(reference) => store.load(&reference.key())?,
        None => store.load(&Key::resource(name.clone()))?,
      };
      context.insert(identifier.clone(), Value::from_serialize(&value));
    }

    let result = self
      .evaluator
      .eval(context)
      .map_err(|source| ConditionError::Evaluation {
        expression: self.raw.clone(),
        source,
      })?;

    Ok(result.is_true())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn reference_of(condition: &Condition, name: &str) -> Option<(String, String)> {
    condition.params[name]
      .reference
      .as_ref()
      .map(|r| (r.resource.clone(), r.path.clone()))
  }

  #[test]
  fn test_bare_parameter_has_no_reference() {
    let condition = new_evaluable_expression("{{ id }} == 1").unwrap();

    assert_eq!(condition.params.len(), 1);
    assert!(condition.params["id"].reference.is_none());
    assert_eq!(condition.params["id"].path, "condition.id");
    assert_eq!(condition.resources().collect::<Vec<_>>(), vec!["id"]);
    assert_eq!(condition.expression, "__p0  == 1");
  }

  #[test]
  fn test_repeated_reference_yields_one_parameter() {
    let condition = new_evaluable_expression("{{ input:id }} == {{ input:id }}").unwrap();

    assert_eq!(condition.params.len(), 1);
    assert_eq!(
      reference_of(&condition, "input:id"),
      Some(("input".to_string(), "id".to_string()))
    );
    assert_eq!(condition.identifiers["input:id"], "__p0");
    assert_eq!(condition.params["input:id"].path, "condition.input.id");
  }

  #[test]
  fn test_grouped_expression_with_or() {
    let condition =
      new_evaluable_expression("({{ input:id }} == {{ input:id }}) || {{ input:name }}").unwrap();

    assert_eq!(condition.params.len(), 2);
    assert_eq!(
      reference_of(&condition, "input:name"),
      Some(("input".to_string(), "name".to_string()))
    );
    assert!(condition.expression.contains(" or "));
  }

  #[test]
  fn test_node_resource_reference() {
    let condition = new_evaluable_expression("({{ resource:id }} == {{ input:id }})").unwrap();

    assert_eq!(condition.params.len(), 2);
    assert_eq!(
      reference_of(&condition, "resource:id"),
      Some(("resource".to_string(), "id".to_string()))
    );
  }

  #[test]
  fn test_invalid_expressions() {
    for raw in ["( {{ input:id }}", "== {{ input:id }}"] {
      let err = new_evaluable_expression(raw).unwrap_err();
      assert!(matches!(err, ConditionError::Compile { .. }), "{raw}: {err}");
    }
  }

  #[test]
  fn test_invalid_reference() {
    let err = new_evaluable_expression("{{ input:id.. }}").unwrap_err();
    assert!(matches!(err, ConditionError::Reference(_)));
  }

  #[test]
  fn test_unbalanced_templates() {
    for raw in ["{{ input:id == 1", "input:id }} == 1", "{{ {{ input:id }} }}"] {
      let err = new_evaluable_expression(raw).unwrap_err();
      assert!(matches!(err, ConditionError::UnbalancedTemplate { .. }), "{raw}");
    }
  }

  #[test]
  fn test_evaluate_against_store() {
    let store = Store::new();
    store.set(Key::resource("input"), json!({ "id": 1, "name": "" }));

    let equal = new_evaluable_expression("{{ input:id }} == 1").unwrap();
    assert!(equal.evaluate(&store).unwrap());

    let differs = new_evaluable_expression("{{ input:id }} != 1").unwrap();
    assert!(!differs.evaluate(&store).unwrap());

    let empty = new_evaluable_expression("{{ input:name }}").unwrap();
    assert!(!empty.evaluate(&store).unwrap());
  }

  #[test]
  fn test_evaluate_normalized_operators() {
    let store = Store::new();
    store.set(Key::resource("input"), json!({ "admin": false, "id": 2 }));

    let condition = new_evaluable_expression("!{{ input:admin }} && {{ input:id }} > 1").unwrap();
    assert!(condition.evaluate(&store).unwrap());

    let condition = new_evaluable_expression("{{ input:admin }} || {{ input:id }} < 1").unwrap();
    assert!(!condition.evaluate(&store).unwrap());
  }

  #[test]
  fn test_operators_inside_strings_are_kept() {
    let store = Store::new();
    store.set(Key::resource("input"), json!({ "name": "a&&b" }));

    let condition = new_evaluable_expression("{{ input:name }} == 'a&&b'").unwrap();
    assert!(condition.evaluate(&store).unwrap());
  }

  #[test]
  fn test_evaluate_bare_parameter_reads_resource() {
    let store = Store::new();
    store.set(Key::resource("id"), json!(1));

    let condition = new_evaluable_expression("{{ id }} == 1").unwrap();
    assert!(condition.evaluate(&store).unwrap());
  }

  #[test]
  fn test_evaluate_unwritten_bare_parameter_fails() {
    let store = Store::new();
    store.set(Key::resource("input"), json!({}));

    let condition = new_evaluable_expression("{{ user }} is not none").unwrap();
    let err = condition.evaluate(&store).unwrap_err();
    assert!(matches!(err, ConditionError::Store(_)));

    store.set(Key::resource("user"), json!({ "id": 1 }));
    assert!(condition.evaluate(&store).unwrap());
  }

  #[test]
  fn test_compiled_once_evaluated_many_times() {
    let condition = new_evaluable_expression("{{ input:id }} > 1").unwrap();

    for (id, expected) in [(0, false), (2, true), (5, true)] {
      let store = Store::new();
      store.set(Key::resource("input"), json!({ "id": id }));
      assert_eq!(condition.evaluate(&store).unwrap(), expected);
    }
  }

  #[test]
  fn test_evaluate_unwritten_resource_fails() {
    let store = Store::new();

    let condition = new_evaluable_expression("{{ user:active }}").unwrap();
    let err = condition.evaluate(&store).unwrap_err();
    assert!(matches!(err, ConditionError::Store(_)));
  }
}
