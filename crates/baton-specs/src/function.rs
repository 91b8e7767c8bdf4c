use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use baton_refs::{Key, Store, StoreError};
use serde_json::Value;

use crate::property::{Property, PropertyReference};
use crate::template::STACK_RESOURCE;

/// Errors raised by custom functions, both while binding and while executing.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
  #[error("invalid arguments: {message}")]
  InvalidArguments { message: String },

  #[error("failed to read argument: {0}")]
  Store(#[from] StoreError),

  #[error("{message}")]
  Execution { message: String },
}

/// Executable closure bound at parse time. It reads its arguments from the
/// store and returns the function result.
pub type Executable = Arc<dyn Fn(&Store) -> Result<Value, FunctionError> + Send + Sync>;

/// Handle of a custom function. Given the resolved argument properties it
/// returns the declared return shape and the executable closure.
pub type CustomFunction =
  Arc<dyn Fn(&[Property]) -> Result<(Property, Executable), FunctionError> + Send + Sync>;

/// Custom functions available to templates, keyed by function name.
pub type CustomFunctions = HashMap<String, CustomFunction>;

/// Wrap a closure into a [`CustomFunction`] handle.
pub fn custom_function<F>(handle: F) -> CustomFunction
where
  F: Fn(&[Property]) -> Result<(Property, Executable), FunctionError> + Send + Sync + 'static,
{
  Arc::new(handle)
}

/// Wrap a closure into an [`Executable`].
pub fn executable<F>(run: F) -> Executable
where
  F: Fn(&Store) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
  Arc::new(run)
}

/// A function invocation bound into the `stack` resource.
#[derive(Clone)]
pub struct Function {
  /// Unique id of the function result inside the `stack` resource.
  pub stack: String,
  pub arguments: Vec<Property>,
  pub executable: Executable,
  pub returns: Property,
}

impl Function {
  /// Reference addressing the result of this function.
  pub fn reference(&self) -> PropertyReference {
    PropertyReference {
      resource: STACK_RESOURCE.to_string(),
      path: self.stack.clone(),
      property: Some(Box::new(self.returns.clone())),
    }
  }

  /// Execute the function and write its result into the store.
  pub fn execute(&self, store: &Store) -> Result<(), FunctionError> {
    let value = (self.executable)(store)?;
    store.set(Key::new(STACK_RESOURCE, self.stack.clone()), value);
    Ok(())
  }
}

impl fmt::Debug for Function {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Function")
      .field("stack", &self.stack)
      .field("arguments", &self.arguments)
      .field("returns", &self.returns)
      .finish_non_exhaustive()
  }
}

/// Insertion-ordered function table.
///
/// Nested invocations are registered before the invocation consuming their
/// result, so executing the table in order satisfies every data dependency.
#[derive(Debug, Clone, Default)]
pub struct Functions {
  entries: Vec<Function>,
}

impl Functions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, function: Function) {
    self.entries.push(function);
  }

  pub fn get(&self, stack: &str) -> Option<&Function> {
    self.entries.iter().find(|function| function.stack == stack)
  }

  pub fn contains(&self, stack: &str) -> bool {
    self.get(stack).is_some()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Function> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Execute every function in registration order.
  pub fn execute(&self, store: &Store) -> Result<(), FunctionError> {
    for function in &self.entries {
      function.execute(store)?;
    }
    Ok(())
  }
}
