use baton_refs::StoreError;
use baton_specs::TemplateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConditionError {
  #[error("unbalanced template delimiters in condition '{expression}'")]
  UnbalancedTemplate { expression: String },

  #[error("invalid condition reference: {0}")]
  Reference(#[from] TemplateError),

  #[error("failed to compile condition '{expression}': {source}")]
  Compile {
    expression: String,
    #[source]
    source: minijinja::Error,
  },

  #[error("failed to evaluate condition '{expression}': {source}")]
  Evaluation {
    expression: String,
    #[source]
    source: minijinja::Error,
  },

  #[error("failed to read condition parameter: {0}")]
  Store(#[from] StoreError),
}
