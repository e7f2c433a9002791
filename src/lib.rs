//! Compiler and stack virtual machine for the `eso` language.
//!
//! Source text is compiled into one flat [`Program`] with every procedure,
//! macro and import copied inline, then executed by [`runtime::Vm`] against
//! a stack of frames.

pub mod bytecode;
pub mod frontend;
pub mod runtime;

use std::path::Path;

pub use bytecode::{CompileError, CompileOptions, Compiler, Op, Program};
pub use runtime::{NoTelemetry, RuntimeError, Vm, VmConfig};

/// Compile a snippet with `impl` paths resolved against the working directory.
pub fn compile(source: &str) -> Result<Program, CompileError> {
    Compiler::with_options(CompileOptions::default()).compile_source(source)
}

pub fn compile_file(path: &Path) -> Result<Program, CompileError> {
    Compiler::new(&path.display().to_string()).compile_file(path)
}

/// Run on stdin/stdout with the default configuration.
pub fn execute(program: Program) -> Result<(), RuntimeError> {
    Vm::new(VmConfig::default()).run(program, &mut NoTelemetry)
}
