use thiserror::Error;

#[derive(Debug, Error)]
pub enum DependencyError {
  #[error("circular dependency detected: {owner}.{node} <-> {owner}.{edge}")]
  CircularDependency {
    owner: String,
    node: String,
    edge: String,
  },
}
