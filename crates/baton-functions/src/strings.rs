use baton_refs::Store;
use baton_specs::{CustomFunction, FunctionError, Property, Type, custom_function, executable};
use serde_json::Value;

fn render(value: Value) -> String {
  match value {
    Value::String(value) => value,
    Value::Null => String::new(),
    value => value.to_string(),
  }
}

fn single_argument(name: &str, args: &[Property]) -> Result<Property, FunctionError> {
  match args {
    [argument] => Ok(argument.clone()),
    _ => Err(FunctionError::InvalidArguments {
      message: format!("{name} expects 1 argument, got {}", args.len()),
    }),
  }
}

fn map_string(name: &'static str, map: fn(&str) -> String) -> CustomFunction {
  custom_function(move |args| {
    let argument = single_argument(name, args)?;

    Ok((
      Property::scalar(Type::String),
      executable(move |store: &Store| {
        let value = render(argument.resolve(store)?);
        Ok(Value::String(map(&value)))
      }),
    ))
  })
}

pub fn upper() -> CustomFunction {
  map_string("upper", str::to_uppercase)
}

pub fn lower() -> CustomFunction {
  map_string("lower", str::to_lowercase)
}

pub fn concat() -> CustomFunction {
  custom_function(|args| {
    if args.is_empty() {
      return Err(FunctionError::InvalidArguments {
        message: "concat expects at least 1 argument".to_string(),
      });
    }

    let arguments = args.to_vec();
    Ok((
      Property::scalar(Type::String),
      executable(move |store: &Store| {
        let mut result = String::new();
        for argument in &arguments {
          result.push_str(&render(argument.resolve(store)?));
        }
        Ok(Value::String(result))
      }),
    ))
  })
}
