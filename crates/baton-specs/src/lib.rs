//! Baton Specs
//!
//! This crate provides the resolved manifest representation for baton. A
//! resolved manifest is the validated form of a manifest definition that is
//! ready to be served.
//!
//! Key differences from `baton-config`:
//! - Every value template is parsed into a [`Property`] carrying a typed
//!   [`PropertyReference`] or a constant default
//! - Custom function invocations are bound into per-node [`Functions`] tables
//!   living in the `stack` resource
//! - Dependency edges are materialized into [`Dependency::Resolved`] indices
//! - Conditions are compiled into expressions with parameter tables

mod condition;
mod error;
mod flow;
mod function;
mod node;
mod property;
mod schema;
pub mod template;

pub use condition::Condition;
pub use error::TemplateError;
pub use flow::{FlowResourceManager, Flow, Manifest, Proxy};
pub use function::{
  CustomFunction, CustomFunctions, Executable, Function, FunctionError, Functions, custom_function,
  executable,
};
pub use node::{Call, Dependency, Node};
pub use property::{Enum, Label, Message, Property, PropertyReference, Scalar, Template, Type};
pub use schema::{MethodDescriptor, Options, SchemaStore, Service};
