//! Baton Conditions
//!
//! Compiles branch guard expressions such as
//! `{{ input:id }} == 1 && {{ user:active }}` into a [`Condition`]. Every
//! template is replaced with a synthesized identifier and resolved into a
//! parameter. Evaluation looks the parameters up in the runtime store and
//! evaluates the rewritten expression with minijinja.

mod error;
mod expression;

pub use baton_specs::Condition;
pub use error::ConditionError;
pub use expression::{Evaluate, new_evaluable_expression};
