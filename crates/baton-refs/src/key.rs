use std::fmt;

/// Delimiter between the resource and the path of a reference.
pub const RESOURCE_DELIMITER: char = ':';

/// Delimiter between the segments of a path.
pub const PATH_DELIMITER: char = '.';

/// Address of a value inside the runtime store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
  pub resource: String,
  pub path: String,
}

impl Key {
  pub fn new(resource: impl Into<String>, path: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      path: path.into(),
    }
  }

  /// Key addressing a resource as a whole.
  pub fn resource(resource: impl Into<String>) -> Self {
    Self::new(resource, "")
  }

  /// Parse a `resource:path` string. A value without a delimiter addresses
  /// the whole resource.
  pub fn parse(value: &str) -> Self {
    match value.split_once(RESOURCE_DELIMITER) {
      Some((resource, path)) => Self::new(resource, path),
      None => Self::resource(value),
    }
  }

  /// Whether this key addresses a resource as a whole.
  pub fn is_root(&self) -> bool {
    self.path.is_empty()
  }

  /// Path segments, empty for a root key.
  pub fn segments(&self) -> Vec<&str> {
    if self.is_root() {
      return Vec::new();
    }

    self.path.split(PATH_DELIMITER).collect()
  }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_root() {
      return write!(f, "{}", self.resource);
    }

    write!(f, "{}{}{}", self.resource, RESOURCE_DELIMITER, self.path)
  }
}
