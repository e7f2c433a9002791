use serde::{Deserialize, Serialize};

// =============================================================================
// OP - Bytecode instructions
// =============================================================================

/// A single instruction. Operands live inside the variant, so an index into
/// `Program::instructions` always lands on a whole instruction.
///
/// Jump targets are absolute indices into the flattened program once
/// compilation finishes; `None` means the target was never resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    // literals
    /// Push `int_constants[index]`, negated when `negate` is set (`neg 5`).
    Push { index: usize, negate: bool },
    /// A string literal that is not consumed by a print. No stack effect.
    Str(usize),

    // stack ops
    Pop,
    Swap,
    Duplicate,
    /// ( values... n -- reversed-values... )
    Reverse,

    // arithmetic
    Add,
    Sub,
    Mul,
    Div,

    // comparison
    Less,
    Greater,
    EqualTo,

    // ==========================================================================
    // Control flow
    // ==========================================================================
    /// Pop condition, jump to target if it is zero.
    If(Option<usize>),
    /// Unconditional jump to the exit of the enclosing loop.
    Break(Option<usize>),
    LoopStart,
    /// Jump back to the loop start while the top of stack is positive.
    LoopEnd(Option<usize>),

    // procedures and tests
    /// Open a frame and move `argc` arguments into it. `retc == -1` returns
    /// the whole callee frame.
    ProcCall { argc: usize, retc: i64 },
    Return,
    /// Open a gated test frame; skips to `end` when tests are disabled.
    TestCall { name: usize, end: Option<usize> },
    /// Pop condition, fail with `strings[message]` if it is zero.
    Assert(usize),

    // I/O
    Input,
    /// Print the top of stack followed by a space.
    Print,
    /// Print `strings[index]` verbatim.
    PrintStr(usize),
    /// Print the top of stack as a character.
    PrintChar,
    /// Print the character codes of `strings[index]`.
    PrintStrCodes(usize),
}

impl Op {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Push { .. } => "PUSH",
            Op::Str(_) => "STR",
            Op::Pop => "POP",
            Op::Swap => "SWAP",
            Op::Duplicate => "DUPLICATE",
            Op::Reverse => "REVERSE",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Less => "LESS",
            Op::Greater => "GREATER",
            Op::EqualTo => "EQUAL_TO",
            Op::If(_) => "IF",
            Op::Break(_) => "BREAK",
            Op::LoopStart => "LOOP_START",
            Op::LoopEnd(_) => "LOOP_END",
            Op::ProcCall { .. } => "PROC_CALL",
            Op::Return => "RETURN",
            Op::TestCall { .. } => "TEST_CALL",
            Op::Assert(_) => "ASSERT",
            Op::Input => "INPUT",
            Op::Print => "PRINT",
            Op::PrintStr(_) => "PRINT_STR",
            Op::PrintChar => "PRINT_CHAR",
            Op::PrintStrCodes(_) => "PRINT_STR_CODES",
        }
    }

    /// The forward/backward target carried by a jump-bearing instruction.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Op::If(target) | Op::Break(target) | Op::LoopEnd(target) => *target,
            Op::TestCall { end, .. } => *end,
            _ => None,
        }
    }

    /// The string form of a print when it directly follows `Str(index)`.
    pub fn string_form(self, index: usize) -> Option<Op> {
        match self {
            Op::Print => Some(Op::PrintStr(index)),
            Op::PrintChar => Some(Op::PrintStrCodes(index)),
            _ => None,
        }
    }

    /// Shift block-relative targets resolved at compile time (`If`,
    /// `TestCall`) by `offset` when a block is copied into another buffer.
    /// `Break`/`LoopEnd` are left alone: the backpatch passes own them.
    pub fn relocated(self, offset: usize) -> Op {
        match self {
            Op::If(Some(target)) => Op::If(Some(target + offset)),
            Op::TestCall {
                name,
                end: Some(end),
            } => Op::TestCall {
                name,
                end: Some(end + offset),
            },
            other => other,
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonics() {
        assert_eq!(Op::EqualTo.mnemonic(), "EQUAL_TO");
        assert_eq!(Op::ProcCall { argc: 1, retc: 1 }.to_string(), "PROC_CALL");
    }

    #[test]
    fn test_relocation_only_touches_compile_time_targets() {
        assert_eq!(Op::If(Some(3)).relocated(10), Op::If(Some(13)));
        assert_eq!(
            Op::TestCall {
                name: 0,
                end: Some(4)
            }
            .relocated(2),
            Op::TestCall {
                name: 0,
                end: Some(6)
            }
        );
        assert_eq!(Op::LoopEnd(Some(1)).relocated(5), Op::LoopEnd(Some(1)));
        assert_eq!(Op::Break(None).relocated(5), Op::Break(None));
        assert_eq!(Op::Add.relocated(5), Op::Add);
    }

    #[test]
    fn test_string_form() {
        assert_eq!(Op::Print.string_form(3), Some(Op::PrintStr(3)));
        assert_eq!(Op::PrintChar.string_form(3), Some(Op::PrintStrCodes(3)));
        assert_eq!(Op::Pop.string_form(3), None);
    }

    #[test]
    fn test_jump_target() {
        assert_eq!(Op::Break(Some(9)).jump_target(), Some(9));
        assert_eq!(Op::If(None).jump_target(), None);
        assert_eq!(Op::Print.jump_target(), None);
    }
}
