//! Atomic values and the rules for casting, comparing and doing arithmetic
//! on them.

mod atomic_core;
mod cast;
mod compare;
mod map_key;
mod ops;

pub use atomic_core::{format_number, Atomic};
pub use compare::compare_atomics;
pub use map_key::MapKey;
pub use ops::{op_arithmetic, op_unary_minus, ArithOp};
