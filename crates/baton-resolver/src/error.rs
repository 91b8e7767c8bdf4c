use baton_conditions::ConditionError;
use baton_dependencies::DependencyError;
use baton_specs::TemplateError;
use thiserror::Error;

/// Errors that can occur during manifest resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// Two flows or proxies share a name.
  #[error("duplicate flow name: {name}")]
  DuplicateFlow { name: String },

  /// Two nodes of one flow share a name.
  #[error("duplicate node name: {owner}.{node}")]
  DuplicateNode { owner: String, node: String },

  /// The called service is not described in the manifest.
  #[error("{location}: service '{service}' not found")]
  ServiceNotFound { location: String, service: String },

  /// The called method is not advertised by the service.
  #[error("{location}: method '{method}' not found in service '{service}'")]
  MethodNotFound {
    location: String,
    service: String,
    method: String,
  },

  /// A value template could not be parsed.
  #[error("{location}: {source}")]
  Template {
    location: String,
    #[source]
    source: TemplateError,
  },

  /// A condition could not be compiled.
  #[error("{location}: {source}")]
  Condition {
    location: String,
    #[source]
    source: ConditionError,
  },

  /// A schema definition is malformed.
  #[error("{location}: invalid schema: {message}")]
  InvalidSchema { location: String, message: String },

  /// A value definition is malformed.
  #[error("{location}: invalid value: {message}")]
  InvalidValue { location: String, message: String },

  #[error(transparent)]
  Dependency(#[from] DependencyError),
}
