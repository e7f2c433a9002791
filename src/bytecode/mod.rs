pub mod backpatch;
pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod namespace;
pub mod op;

pub use compile::{CompileOptions, Compiler};
pub use compile_error::{CompileError, CompileErrorKind};
pub use ir::{Pools, Program};
pub use op::Op;
