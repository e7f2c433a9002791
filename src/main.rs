use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use eso::{
    Program, RuntimeError, Vm, VmConfig,
    bytecode::{Compiler, disasm::print_program},
    frontend::{Lexer, token_dumper::TokenDumper},
    runtime::{NoTelemetry, OpCounter},
};

/// Extension of programs written with `--emit`.
const BINARY_EXTENSION: &str = "esob";

#[derive(Parser, Debug)]
#[command(name = "eso", version, about = "Compile and run eso stack programs")]
struct Args {
    /// Source file (.eso) or compiled program (.esob); starts a REPL when omitted
    file: Option<PathBuf>,

    /// Print the compiled program before running it
    #[arg(long)]
    dump: bool,

    /// Suppress program output
    #[arg(long)]
    quiet: bool,

    /// Stop after N executed instructions
    #[arg(long = "max-ops", value_name = "N")]
    max_ops: Option<usize>,

    /// Print per-op execution counts and the final root stack
    #[arg(long)]
    stats: bool,

    /// Dump tokens and exit
    #[arg(long)]
    tokens: bool,

    /// Plain token dump
    #[arg(long = "no-color")]
    no_color: bool,

    /// Skip `test` blocks
    #[arg(long = "no-tests")]
    no_tests: bool,

    /// Write the compiled program to PATH instead of running it
    #[arg(long, value_name = "PATH")]
    emit: Option<PathBuf>,
}

impl Args {
    fn vm_config(&self) -> VmConfig {
        VmConfig {
            run_tests: !self.no_tests,
            suppress_output: self.quiet,
            max_steps: self.max_ops,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match &args.file {
        Some(path) => run_file(&args, path),
        None => {
            repl(&args);
            ExitCode::SUCCESS
        }
    }
}

fn run_file(args: &Args, path: &Path) -> ExitCode {
    if path.extension().and_then(|e| e.to_str()) == Some(BINARY_EXTENSION) {
        return match load_binary(path) {
            Ok(program) => report(run(args, program)),
            Err(message) => {
                eprintln!("{}", message);
                ExitCode::FAILURE
            }
        };
    }

    if args.tokens {
        return dump_tokens(args, path);
    }

    let program = match Compiler::new(&path.display().to_string()).compile_file(path) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(out) = &args.emit {
        return emit(&program, out);
    }

    report(run(args, program))
}

fn load_binary(path: &Path) -> Result<Program, String> {
    let bytes =
        fs::read(path).map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;
    let program = Program::from_bytes(&bytes)
        .map_err(|e| format!("failed to load '{}': {}", path.display(), e))?;

    debug!(path = %path.display(), instructions = program.len(), "loaded compiled program");
    Ok(program)
}

fn emit(program: &Program, out: &Path) -> ExitCode {
    let written = program
        .to_bytes()
        .map_err(|e| e.to_string())
        .and_then(|bytes| fs::write(out, &bytes).map(|_| bytes.len()).map_err(|e| e.to_string()));

    match written {
        Ok(len) => {
            info!(path = %out.display(), bytes = len, "wrote compiled program");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to write '{}': {}", out.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn dump_tokens(args: &Args, path: &Path) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("failed to read '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match Lexer::new(&source).tokenize() {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();
            if args.no_color {
                dumper = dumper.no_color();
            }
            dumper.dump(&tokens);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, program: Program) -> Result<(), RuntimeError> {
    if args.dump {
        print_program(&program);
        println!("\n=== OUTPUT ===");
    }

    let mut vm = Vm::new(args.vm_config());

    if args.stats {
        let mut counter = OpCounter::new();
        let result = vm.run(program, &mut counter);
        println!();
        print!("{}", counter.report());
        result
    } else {
        vm.run(program, &mut NoTelemetry)
    }
}

fn report(result: Result<(), RuntimeError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Each line is compiled and run as an independent program.
fn repl(args: &Args) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("failed to start line editor: {}", e);
            return;
        }
    };

    loop {
        match editor.readline("Repl> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() || input == "q" {
                    break;
                }
                let _ = editor.add_history_entry(input);

                match eso::compile(input) {
                    Ok(program) => {
                        if let Err(e) = run(args, program) {
                            eprintln!("\n{}", e);
                        } else {
                            println!();
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }
}
