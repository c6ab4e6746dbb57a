//! # Lingo values
//!
//! Runtime data shared by the compiler (literal operands) and the reference
//! evaluator (the value stack).
//!
//! ## Documentation conventions
//!
//! - Stack effects are written as `( before -- after )`.
//! - `[a, b]` denotes a linear list, `[#k: v]` a property list.

pub mod value;
