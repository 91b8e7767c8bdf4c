mod error;
mod resolver;
mod value;

pub use error::ResolveError;
pub use resolver::{Resolver, StandardResolver};
pub use value::{parse_type, schema_to_property, value_to_property};
