//! Template and reference resolution.
//!
//! Value templates are strings wrapped in `{{` and `}}`. The content is
//! either a reference or a custom function invocation:
//!
//! ```text
//! {{ input:user.email }}          reference into the flow input
//! {{ fetch_user:name }}           reference into the response of a node
//! {{ upper(fetch_user:name) }}    custom function invocation
//! {{ concat(input:a, 'x') }}      quoted arguments are string constants
//! ```
//!
//! Function results are registered in the `stack` resource under a unique
//! id so they can be referenced like any other value.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::TemplateError;
use crate::function::{CustomFunctions, Function, Functions};
use crate::property::{Property, PropertyReference};

/// Opening tag of a template.
pub const TEMPLATE_OPEN: &str = "{{";
/// Closing tag of a template.
pub const TEMPLATE_CLOSE: &str = "}}";

/// Delimits the arguments of a function invocation.
pub const FUNCTION_ARGUMENT_DELIMITER: char = ',';
/// Delimits the resource and the path of a reference.
pub const REFERENCE_DELIMITER: char = baton_refs::RESOURCE_DELIMITER;
/// Delimits the segments of a path.
pub const PATH_DELIMITER: char = baton_refs::PATH_DELIMITER;

/// Resource holding the flow input.
pub const INPUT_RESOURCE: &str = "input";
/// Resource holding the inbound request headers.
pub const HEADER_RESOURCE: &str = "header";
/// Resource holding function results.
pub const STACK_RESOURCE: &str = "stack";

/// Matches custom function invocations, e.g. `upper(input:name)`.
static FUNCTION_PATTERN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^(\w+)\((.*)\)$").expect("function pattern is a valid regex"));

/// Check whether the given value is a template.
pub fn is_template(value: &str) -> bool {
  let value = value.trim();
  value.starts_with(TEMPLATE_OPEN) && value.ends_with(TEMPLATE_CLOSE)
}

/// Trim the opening and closing tags and surrounding whitespace.
pub fn template_content(value: &str) -> String {
  value
    .replacen(TEMPLATE_OPEN, "", 1)
    .replacen(TEMPLATE_CLOSE, "", 1)
    .trim()
    .to_string()
}

/// Join the given paths into a single canonical path.
///
/// Empty segments are skipped, consecutive delimiters are collapsed and
/// leading or trailing delimiters are stripped. Every property path is built
/// through this function so paths can be compared and looked up reliably.
pub fn join_path<S: AsRef<str>>(values: &[S]) -> String {
  let delimiter = PATH_DELIMITER.to_string();

  values
    .iter()
    .flat_map(|value| value.as_ref().split(PATH_DELIMITER))
    .filter(|segment| !segment.is_empty())
    .collect::<Vec<_>>()
    .join(delimiter.as_str())
}

/// Split the given path into its segments.
pub fn split_path(path: &str) -> Vec<&str> {
  path.split(PATH_DELIMITER).collect()
}

/// Generate a stack id that is not used yet by the given table.
///
/// Ids are 128 random bits rendered as hex. Collisions with ids of other
/// tables are possible in theory and accepted.
pub fn generate_stack_key(functions: &Functions) -> String {
  loop {
    let key = Uuid::new_v4().simple().to_string();
    if !functions.contains(&key) {
      return key;
    }
  }
}

fn is_identifier(segment: &str) -> bool {
  !segment.is_empty()
    && segment
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_valid_path(path: &str) -> bool {
  split_path(path).into_iter().all(is_identifier)
}

/// Parse the given value into a property reference.
///
/// The value is split once on the reference delimiter. A value without the
/// delimiter references the resource as a whole.
pub fn parse_property_reference(value: &str) -> Result<PropertyReference, TemplateError> {
  let (resource, path) = match value.split_once(REFERENCE_DELIMITER) {
    Some((resource, path)) => (resource.trim(), path.trim()),
    None => (value.trim(), ""),
  };

  if !is_valid_path(resource) || (!path.is_empty() && !is_valid_path(path)) {
    return Err(TemplateError::InvalidReference {
      reference: value.to_string(),
    });
  }

  Ok(PropertyReference::new(resource, path))
}

/// Parse the given value as a reference property.
pub fn parse_reference(path: &str, name: &str, value: &str) -> Result<Property, TemplateError> {
  Ok(Property {
    reference: Some(parse_property_reference(value)?),
    ..Property::new(name, join_path(&[path, name]))
  })
}

/// Parse the given custom function invocation and register it in `functions`.
pub fn parse_function(
  path: &str,
  name: &str,
  functions: &mut Functions,
  custom: &CustomFunctions,
  content: &str,
) -> Result<Property, TemplateError> {
  let invalid = || TemplateError::InvalidReference {
    reference: content.to_string(),
  };

  let captures = FUNCTION_PATTERN.captures(content).ok_or_else(invalid)?;
  let function = captures.get(1).ok_or_else(invalid)?.as_str();
  let args = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

  let handle = custom
    .get(function)
    .ok_or_else(|| TemplateError::UndefinedFunction {
      function: function.to_string(),
      content: content.to_string(),
    })?;

  let location = join_path(&[path, name]);
  let arguments = split_arguments(args)
    .into_iter()
    .enumerate()
    .map(|(index, arg)| {
      parse_template_content(&location, &format!("arg{index}"), functions, custom, arg)
    })
    .collect::<Result<Vec<_>, _>>()?;

  let (returns, executable) = handle(&arguments).map_err(|source| TemplateError::Function {
    function: function.to_string(),
    source,
  })?;

  let stack = generate_stack_key(functions);
  let function = Function {
    stack,
    arguments,
    executable,
    returns,
  };

  let result = Property {
    template: function.returns.template.clone(),
    default: function.returns.default.clone(),
    reference: Some(function.reference()),
    ..Property::new(name, join_path(&[path, name]))
  };

  functions.insert(function);

  Ok(result)
}

/// Parse the given template content without its surrounding tags.
pub fn parse_template_content(
  path: &str,
  name: &str,
  functions: &mut Functions,
  custom: &CustomFunctions,
  content: &str,
) -> Result<Property, TemplateError> {
  if FUNCTION_PATTERN.is_match(content) {
    return parse_function(path, name, functions, custom, content);
  }

  if let Some(literal) = parse_literal(content) {
    return Ok(Property::constant(
      name,
      join_path(&[path, name]),
      Value::String(literal.to_string()),
    ));
  }

  parse_reference(path, name, content)
}

/// Parse the given value template into a property.
pub fn parse_template(
  path: &str,
  name: &str,
  functions: &mut Functions,
  custom: &CustomFunctions,
  value: &str,
) -> Result<Property, TemplateError> {
  let content = template_content(value);
  debug!(path = %path, template = %content, "parsing property template");

  let result = parse_template_content(path, name, functions, custom, &content)?;

  debug!(
    path = %result.path,
    kind = ?result.kind(),
    default = ?result.default,
    reference = ?result.reference,
    functions = functions.len(),
    "template results in property"
  );

  Ok(result)
}

/// A piece of a string with embedded templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment<'a> {
  Literal(&'a str),
  /// A template including its tags.
  Template(&'a str),
}

/// Split the given value into literal text and embedded templates, e.g.
/// `/users/{{ input:id }}/orders`.
pub fn split_templates(value: &str) -> Result<Vec<Fragment<'_>>, TemplateError> {
  let mut result = Vec::new();
  let mut rest = value;

  while let Some(open) = rest.find(TEMPLATE_OPEN) {
    let (literal, after) = rest.split_at(open);
    if !literal.is_empty() {
      result.push(Fragment::Literal(literal));
    }

    let close = after
      .find(TEMPLATE_CLOSE)
      .ok_or_else(|| TemplateError::Unclosed {
        value: value.to_string(),
      })?;
    let end = close + TEMPLATE_CLOSE.len();
    result.push(Fragment::Template(&after[..end]));
    rest = &after[end..];
  }

  if !rest.is_empty() {
    result.push(Fragment::Literal(rest));
  }

  Ok(result)
}

/// Resources read by the templates embedded in the given value, including
/// the arguments of functions. The `stack` resource is left out.
pub fn embedded_resources(
  value: &str,
  custom: &CustomFunctions,
) -> Result<BTreeSet<String>, TemplateError> {
  let mut functions = Functions::new();
  let mut result = BTreeSet::new();

  for fragment in split_templates(value)? {
    let Fragment::Template(template) = fragment else {
      continue;
    };

    let property = parse_template("", "embedded", &mut functions, custom, template)?;
    result.extend(property.references().into_iter().map(|r| r.resource.clone()));
  }

  for function in functions.iter() {
    for argument in &function.arguments {
      result.extend(argument.references().into_iter().map(|r| r.resource.clone()));
    }
  }

  result.remove(STACK_RESOURCE);
  Ok(result)
}

/// Quoted arguments are string constants.
fn parse_literal(content: &str) -> Option<&str> {
  let content = content.trim();
  ['\'', '"'].into_iter().find_map(|quote| {
    content
      .strip_prefix(quote)
      .and_then(|rest| rest.strip_suffix(quote))
  })
}

/// Split function arguments on top level delimiters. Delimiters nested in
/// parentheses or quotes do not split.
fn split_arguments(args: &str) -> Vec<&str> {
  if args.trim().is_empty() {
    return Vec::new();
  }

  let mut result = Vec::new();
  let mut depth = 0usize;
  let mut quote: Option<char> = None;
  let mut start = 0;

  for (index, c) in args.char_indices() {
    match (quote, c) {
      (Some(open), c) if c == open => quote = None,
      (Some(_), _) => {}
      (None, '\'' | '"') => quote = Some(c),
      (None, '(') => depth += 1,
      (None, ')') => depth = depth.saturating_sub(1),
      (None, FUNCTION_ARGUMENT_DELIMITER) if depth == 0 => {
        result.push(args[start..index].trim());
        start = index + c.len_utf8();
      }
      _ => {}
    }
  }

  result.push(args[start..].trim());
  result
}

#[cfg(test)]
mod tests {
  use baton_refs::Store;
  use serde_json::json;

  use super::*;
  use crate::function::{CustomFunction, FunctionError, custom_function, executable};
  use crate::property::Type;

  /// Function joining all of its arguments as strings.
  fn concat() -> CustomFunction {
    custom_function(|args| {
      let args = args.to_vec();
      let executable = executable(move |store| {
        let mut result = String::new();
        for arg in &args {
          match arg.resolve(store)? {
            Value::String(value) => result.push_str(&value),
            value => result.push_str(&value.to_string()),
          }
        }
        Ok(Value::String(result))
      });
      Ok((Property::scalar(Type::String), executable))
    })
  }

  fn failing() -> CustomFunction {
    custom_function(|_| {
      Err(FunctionError::InvalidArguments {
        message: "always fails".to_string(),
      })
    })
  }

  fn custom() -> CustomFunctions {
    let mut custom = CustomFunctions::new();
    custom.insert("concat".to_string(), concat());
    custom.insert("failing".to_string(), failing());
    custom
  }

  #[test]
  fn test_join_path() {
    assert_eq!(join_path(&["a", "", "b."]), "a.b");
    assert_eq!(join_path::<&str>(&[]), "");
    assert_eq!(join_path(&["."]), "");
    assert_eq!(join_path(&[".a..b.", "c"]), "a.b.c");
    assert_eq!(join_path(&["flow", "node", "request"]), "flow.node.request");
  }

  #[test]
  fn test_is_template() {
    assert!(is_template("{{ input:id }}"));
    assert!(is_template("  {{input:id}}  "));
    assert!(!is_template("input:id"));
    assert!(!is_template("{{ input:id"));
  }

  #[test]
  fn test_template_content() {
    assert_eq!(template_content("{{ input:id }}"), "input:id");
    assert_eq!(template_content("{{upper(a:b)}}"), "upper(a:b)");
  }

  #[test]
  fn test_parse_reference() {
    let mut functions = Functions::new();
    let property =
      parse_template("flow.node", "id", &mut functions, &custom(), "{{ input:user.id }}").unwrap();

    let reference = property.reference.unwrap();
    assert_eq!(property.path, "flow.node.id");
    assert_eq!(reference.resource, "input");
    assert_eq!(reference.path, "user.id");
    assert!(reference.property.is_none());
    assert!(functions.is_empty());
  }

  #[test]
  fn test_parse_reference_without_path() {
    let mut functions = Functions::new();
    let property = parse_template("", "all", &mut functions, &custom(), "{{ fetch }}").unwrap();

    let reference = property.reference.unwrap();
    assert_eq!(reference.resource, "fetch");
    assert_eq!(reference.path, "");
  }

  #[test]
  fn test_parse_reference_splits_once() {
    let err = parse_property_reference("input:a:b").unwrap_err();
    assert!(matches!(err, TemplateError::InvalidReference { .. }));
  }

  #[test]
  fn test_invalid_reference_paths() {
    for value in ["input:id..", "input:.id", ":id", "", "in put:id"] {
      assert!(
        parse_property_reference(value).is_err(),
        "expected '{}' to be rejected",
        value
      );
    }
  }

  #[test]
  fn test_parse_function() {
    let mut functions = Functions::new();
    let property = parse_template(
      "flow",
      "greeting",
      &mut functions,
      &custom(),
      "{{ concat(input:first, ' ', input:last) }}",
    )
    .unwrap();

    assert_eq!(functions.len(), 1);
    assert_eq!(property.kind(), Type::String);

    let reference = property.reference.unwrap();
    assert_eq!(reference.resource, STACK_RESOURCE);
    assert!(functions.contains(&reference.path));
    assert_eq!(reference.property.unwrap().kind(), Type::String);

    let function = functions.get(&reference.path).unwrap();
    assert_eq!(function.arguments.len(), 3);
    assert_eq!(function.arguments[1].default, Some(json!(" ")));

    let paths: Vec<_> = function.arguments.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(
      paths,
      vec!["flow.greeting.arg0", "flow.greeting.arg1", "flow.greeting.arg2"]
    );
    assert_eq!(property.path, "flow.greeting");
  }

  #[test]
  fn test_nested_functions_execute_in_order() {
    let mut functions = Functions::new();
    let property = parse_template(
      "flow",
      "value",
      &mut functions,
      &custom(),
      "{{ concat(concat(input:a, input:b), 'c') }}",
    )
    .unwrap();

    assert_eq!(functions.len(), 2);

    let store = Store::new();
    store.set(baton_refs::Key::resource("input"), json!({ "a": "a", "b": "b" }));
    functions.execute(&store).unwrap();

    assert_eq!(property.resolve(&store).unwrap(), json!("abc"));
  }

  #[test]
  fn test_function_without_arguments() {
    let mut functions = Functions::new();
    parse_template("", "empty", &mut functions, &custom(), "{{ concat() }}").unwrap();

    let function = functions.iter().next().unwrap();
    assert!(function.arguments.is_empty());
  }

  #[test]
  fn test_undefined_function() {
    let mut functions = Functions::new();
    let err =
      parse_template("", "value", &mut functions, &custom(), "{{ missing(input:id) }}").unwrap_err();

    assert!(matches!(err, TemplateError::UndefinedFunction { .. }));
    assert_eq!(
      err.to_string(),
      "undefined custom function 'missing' in 'missing(input:id)'"
    );
  }

  #[test]
  fn test_rejected_arguments() {
    let mut functions = Functions::new();
    let err = parse_template("", "value", &mut functions, &custom(), "{{ failing() }}").unwrap_err();

    assert!(matches!(err, TemplateError::Function { .. }));
    assert!(functions.is_empty());
  }

  #[test]
  fn test_split_arguments() {
    assert_eq!(split_arguments("a, b"), vec!["a", "b"]);
    assert_eq!(split_arguments("f(a, b), c"), vec!["f(a, b)", "c"]);
    assert_eq!(split_arguments("',', b"), vec!["','", "b"]);
    assert!(split_arguments("  ").is_empty());
  }

  #[test]
  fn test_split_templates() {
    assert_eq!(
      split_templates("/users/{{ input:id }}/orders").unwrap(),
      vec![
        Fragment::Literal("/users/"),
        Fragment::Template("{{ input:id }}"),
        Fragment::Literal("/orders"),
      ]
    );
    assert_eq!(split_templates("").unwrap(), Vec::new());

    let err = split_templates("/users/{{ input:id").unwrap_err();
    assert!(matches!(err, TemplateError::Unclosed { .. }));
  }

  #[test]
  fn test_embedded_resources() {
    let resources = embedded_resources(
      "/users/{{ user:id }}/{{ concat(input:kind, header:tenant) }}",
      &custom(),
    )
    .unwrap();

    assert_eq!(
      resources.into_iter().collect::<Vec<_>>(),
      vec!["header", "input", "user"]
    );
    assert!(embedded_resources("/users", &custom()).unwrap().is_empty());
  }

  #[test]
  fn test_generated_stack_keys_are_unique() {
    let mut functions = Functions::new();
    for _ in 0..32 {
      parse_template("", "value", &mut functions, &custom(), "{{ concat() }}").unwrap();
    }

    let mut keys: Vec<_> = functions.iter().map(|f| f.stack.clone()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 32);
    assert!(keys.iter().all(|key| key.len() == 32));
  }
}
