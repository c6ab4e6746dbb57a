pub mod assembler;
pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod scope;
pub mod stack_check;

pub use compile::{CompileResult, Compiler, CompilerOptions, compile};
pub use compile_error::CompileError;
pub use ir::{Handler, ScriptContext, ScriptType};
pub use op::Op;
