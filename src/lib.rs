//! Lingo compiler and event dispatch.
//!
//! Source text goes through [`lexer`] and [`parser`], which drives the
//! [`bytecode::assembler`] to produce a [`bytecode::ScriptContext`]. The
//! [`events`] module decides which compiled handlers see a raised event, and
//! [`runtime`] holds a small interpreter that can run them.

pub mod bytecode;
pub mod config;
pub mod events;
pub mod frontend;
pub mod lang;
pub mod lexer;
pub mod parser;
pub mod parser_error;
pub mod runtime;
pub mod token;
