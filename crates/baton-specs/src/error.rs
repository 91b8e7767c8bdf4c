use thiserror::Error;

use crate::function::FunctionError;

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("undefined custom function '{function}' in '{content}'")]
  UndefinedFunction { function: String, content: String },

  #[error("unclosed template in '{value}'")]
  Unclosed { value: String },

  #[error("invalid reference '{reference}'")]
  InvalidReference { reference: String },

  #[error("custom function '{function}' rejected its arguments: {source}")]
  Function {
    function: String,
    #[source]
    source: FunctionError,
  },
}
