use crate::bytecode::{Op, Program};

/// Print disassembly of a compiled program
pub fn print_program(program: &Program) {
    print!("{}", program_to_string(program));
}

/// Full listing: instructions, then both literal pools.
pub fn program_to_string(program: &Program) -> String {
    let mut output = String::from("=== BYTECODE PROGRAM ===\n\n");

    output.push_str("════════════════════════════════════════\n");
    output.push_str(" main\n");
    output.push_str(&format!(" {} instructions\n", program.len()));
    output.push_str("════════════════════════════════════════\n");
    output.push_str(&disassemble_to_string(program));
    output.push('\n');

    output.push_str(&format!("-- constants ({}) --\n", program.int_constants.len()));
    for (i, value) in program.int_constants.iter().enumerate() {
        output.push_str(&format!("  [{:>3}] {}\n", i, value));
    }

    output.push_str(&format!("-- strings ({}) --\n", program.strings.len()));
    for (i, value) in program.strings.iter().enumerate() {
        output.push_str(&format!("  [{:>3}] {:?}\n", i, value));
    }

    output
}

/// Instruction listing with a marker above every jump target.
pub fn disassemble_to_string(program: &Program) -> String {
    let ops = &program.instructions;
    let mut output = String::new();
    let jump_targets = collect_jump_targets(ops);

    for (ip, op) in ops.iter().enumerate() {
        if jump_targets.contains(&ip) {
            output.push_str("      ┌──────────────────────────────────\n");
        }

        output.push_str(&format!("{:04} ", ip));

        if jump_targets.contains(&ip) {
            output.push_str("► ");
        } else {
            output.push_str("  ");
        }

        output.push_str(&format_op(op, ip, program));
        output.push('\n');
    }

    // exits of trailing loops and ifs point one past the last op
    if jump_targets.contains(&ops.len()) {
        output.push_str("      ┌──────────────────────────────────\n");
        output.push_str(&format!("{:04} ► <end>\n", ops.len()));
    }

    output
}

fn collect_jump_targets(ops: &[Op]) -> Vec<usize> {
    let mut targets = Vec::new();

    for op in ops {
        if let Some(target) = op.jump_target() {
            // a backward edge re-enters just after LOOP_START
            let target = if matches!(op, Op::LoopEnd(_)) {
                target + 1
            } else {
                target
            };
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    targets
}

fn format_target(ip: usize, target: Option<usize>) -> String {
    match target {
        Some(t) => {
            let direction = if t <= ip { "↑" } else { "↓" };
            format!("{} (→ {:04})", direction, t)
        }
        None => "(→ ????)".to_string(),
    }
}

fn string_at(program: &Program, index: usize) -> String {
    match program.strings.get(index) {
        Some(s) => format!("{:?}", s),
        None => "<missing>".to_string(),
    }
}

fn format_op(op: &Op, ip: usize, program: &Program) -> String {
    let name = op.mnemonic();

    match op {
        Op::Push { index, negate } => {
            let value = match program.int_constants.get(*index) {
                Some(v) if *negate => format!("{}", v.wrapping_neg()),
                Some(v) => format!("{}", v),
                None => "<missing>".to_string(),
            };
            format!("{:<16}#{} ; {}", name, index, value)
        }
        Op::Str(index)
        | Op::PrintStr(index)
        | Op::PrintStrCodes(index)
        | Op::Assert(index) => {
            format!("{:<16}#{} ; {}", name, index, string_at(program, *index))
        }
        Op::If(target) | Op::Break(target) | Op::LoopEnd(target) => {
            format!("{:<16}{}", name, format_target(ip, *target))
        }
        Op::ProcCall { argc, retc } => format!("{:<16}argc={} retc={}", name, argc, retc),
        Op::TestCall { name: test, end } => format!(
            "{:<16}{} {}",
            name,
            string_at(program, *test),
            format_target(ip, *end)
        ),
        _ => name.to_string(),
    }
}
