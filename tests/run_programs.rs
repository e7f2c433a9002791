use std::fs;

use eso::runtime::{OpCounter, RuntimeErrorKind};
use eso::{NoTelemetry, Program, RuntimeError, Vm, VmConfig, compile, compile_file};

fn run_with(program: Program, config: VmConfig, input: &str) -> Result<String, RuntimeError> {
    let mut vm = Vm::with_io(config, input.as_bytes(), Vec::new());
    vm.run(program, &mut NoTelemetry)?;
    Ok(String::from_utf8(vm.into_output()).expect("utf-8 output"))
}

fn run(source: &str) -> Result<String, RuntimeError> {
    let program = compile(source).expect("should compile");
    run_with(program, VmConfig::default(), "")
}

#[test]
fn countdown_loop() {
    assert_eq!(run("3 [ dup . pop 1 - ] pop").unwrap(), "3 2 1 ");
}

#[test]
fn balanced_and_unbalanced_stacks() {
    assert_eq!(run("2 3 + . pop").unwrap(), "5 ");

    let err = run("2 3").unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::StackNotEmpty(vec![2, 3]));
}

#[test]
fn division_by_zero_reports_op() {
    let err = run("5 0 /").unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::DivisionByZero);
    assert_eq!(err.to_string(), "runtime error: cannot divide by 0 on op <2:DIV>");
}

#[test]
fn procedure_arity() {
    let source = "proc add 2 1 ; + end";

    let err = run(&format!("{} 1 add", source)).unwrap_err();
    assert_eq!(
        err.kind,
        RuntimeErrorKind::ArgumentCount {
            expected: 2,
            found: 1
        }
    );

    assert_eq!(run(&format!("{} 1 2 add . pop", source)).unwrap(), "3 ");
}

#[test]
fn fizzbuzz_style_program() {
    let source = r"
        # print 1..5, marking multiples of 3
        macro mark ; dup 3 = if 'three ' . end end
        proc next 1 1 ; 1 + end

        1 [
            !mark
            dup 3 = 0 = if dup . end
            next
            dup 6 < if end
            dup 6 = if break end
        ] pop
    ";
    assert_eq!(run(source).unwrap(), "1 2 three 4 5 ");
}

#[test]
fn print_macros_take_caller_strings() {
    let source = r"
        macro say ; . end
        macro println ; . '\n' . end

        'hello ' !say
        'world' !println
        1 if 'picked' end !println
        42 !say pop
    ";
    assert_eq!(run(source).unwrap(), "hello world\npicked\n42 ");
}

#[test]
fn nested_break_leaves_only_inner_loop() {
    let source = "2 [ 3 [ 'i' . break ] pop 'o' . 1 - ] pop";
    assert_eq!(run(source).unwrap(), "ioio");
}

#[test]
fn tests_run_and_can_be_disabled() {
    let source = "test 'double' ; 2 dup + 4 = assert 'two twos' end 'done' .";

    let program = compile(source).unwrap();
    assert_eq!(
        run_with(program, VmConfig::default(), "").unwrap(),
        "\"double\" passed!\ndone"
    );

    let program = compile(source).unwrap();
    let config = VmConfig {
        run_tests: false,
        ..VmConfig::default()
    };
    assert_eq!(run_with(program, config, "").unwrap(), "done");
}

#[test]
fn input_feeds_the_stack() {
    let program = compile("? pop + . pop").unwrap();
    assert_eq!(run_with(program, VmConfig::default(), "4 5\n").unwrap(), "9 ");
}

#[test]
fn program_survives_postcard_roundtrip() {
    let program = compile("proc sq 1 1 ; dup * end 7 sq . pop").unwrap();
    let bytes = program.to_bytes().unwrap();
    let decoded = Program::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, program);
    assert_eq!(run_with(decoded, VmConfig::default(), "").unwrap(), "49 ");
}

#[test]
fn files_and_imports() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    fs::write(
        dir.path().join("lib").join("math.eso"),
        "proc square 1 1 ; dup * end\nmacro twice ; 2 * end\n",
    )
    .unwrap();

    let main = dir.path().join("main.eso");
    fs::write(&main, "impl 'lib.math'\n3 square !twice . pop\n").unwrap();

    let program = eso::Compiler::with_options(eso::CompileOptions {
        file_name: "main.eso".to_string(),
        base_dir: dir.path().to_path_buf(),
    })
    .compile_file(&main)
    .unwrap();
    assert_eq!(run_with(program, VmConfig::default(), "").unwrap(), "18 ");
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = compile_file(&dir.path().join("absent.eso")).unwrap_err();
    assert!(err.to_string().contains("compile error: cannot read"));
}

#[test]
fn stats_counter_with_step_cap() {
    let program = compile("1 [ 1 + ]").unwrap();
    let config = VmConfig {
        max_steps: Some(20),
        ..VmConfig::default()
    };
    let mut vm = Vm::with_io(config, "".as_bytes(), Vec::new());
    let mut counter = OpCounter::new();

    vm.run(program, &mut counter).unwrap();
    assert_eq!(counter.total(), 20);
    assert_eq!(counter.final_stack().len(), 1);
}
