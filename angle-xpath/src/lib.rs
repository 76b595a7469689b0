//! XPath 3.x compiler, evaluator and function library.
//!
//! Queries compile to an expression tree ([`ast::Expr`]) which the
//! [`Evaluator`] walks against a [`Context`] (item, position, size) and an
//! [`Environment`] (variables, functions, namespaces, cancellation). Every
//! expression evaluates to a [`Sequence`] of nodes and atomic values.

pub mod ast;
mod atomic;
mod cancel;
mod context;
mod error;
mod evaluator;
pub mod functions;
mod parser;
mod pattern;
mod sequence;
mod types;

pub use atomic::{compare_atomics, Atomic, MapKey};
pub use cancel::Cancellation;
pub use context::{Context, Environment, GroupState};
pub use error::{Error, EvaluationCause, Result};
pub use evaluator::Evaluator;
pub use functions::{FunctionGroup, FunctionLibrary};
pub use parser::{parse, CompileMode, CompileOptions};
pub use pattern::Pattern;
pub use sequence::{Item, Sequence};
pub use types::XdmType;
