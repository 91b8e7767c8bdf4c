//! Baton Functions
//!
//! Standard custom functions available to templates:
//!
//! - `upper(value)` / `lower(value)`: change the case of a string
//! - `concat(a, b, ...)`: join the string form of every argument

mod strings;

use baton_specs::CustomFunctions;

pub use strings::{concat, lower, upper};

/// The standard function table.
pub fn standard() -> CustomFunctions {
  let mut functions = CustomFunctions::new();
  functions.insert("upper".to_string(), upper());
  functions.insert("lower".to_string(), lower());
  functions.insert("concat".to_string(), concat());
  functions
}
