use std::io::{self, BufRead, StdinLock, Stdout, Write};

use tracing::{debug, warn};

use crate::bytecode::{Op, Program};
use crate::runtime::frame::{Frame, FrameKind};
use crate::runtime::runtime_error::{RuntimeError, RuntimeErrorKind};
use crate::runtime::telemetry::Telemetry;

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Execute `test` blocks instead of jumping over them.
    pub run_tests: bool,
    pub suppress_output: bool,
    /// Stop (successfully) after this many instructions.
    pub max_steps: Option<usize>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            run_tests: true,
            suppress_output: false,
            max_steps: None,
        }
    }
}

pub struct Vm<R = StdinLock<'static>, W = Stdout> {
    config: VmConfig,
    input: R,
    output: W,
    frames: Vec<Frame>,
    steps: usize,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Self::with_io(config, io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Vm<R, W> {
    pub fn with_io(config: VmConfig, input: R, output: W) -> Self {
        Self {
            config,
            input,
            output,
            frames: Vec::new(),
            steps: 0,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run `program` to completion. The program is consumed, and the frame
    /// stack is cleared on every exit path.
    pub fn run(
        &mut self,
        program: Program,
        telemetry: &mut dyn Telemetry,
    ) -> Result<(), RuntimeError> {
        self.frames.clear();
        self.frames.push(Frame::root());
        self.steps = 0;

        debug!(
            instructions = program.len(),
            constants = program.int_constants.len(),
            strings = program.strings.len(),
            "running program"
        );

        let result = self.exec(&program, telemetry);

        let root = self
            .frames
            .first()
            .map(|f| f.operands.clone())
            .unwrap_or_default();
        telemetry.on_finish(&root);
        self.frames.clear();

        let flushed = self
            .output
            .flush()
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::Io(e.to_string())));

        debug!(steps = self.steps, ok = result.is_ok(), "program finished");
        result.and(flushed)
    }

    fn exec(
        &mut self,
        program: &Program,
        telemetry: &mut dyn Telemetry,
    ) -> Result<(), RuntimeError> {
        let ops = &program.instructions;
        let mut ip = 0;

        while ip < ops.len() {
            if let Some(max) = self.config.max_steps {
                if self.steps >= max {
                    warn!(steps = self.steps, ip, "step limit reached, stopping early");
                    return Ok(());
                }
            }
            self.steps += 1;

            let op = ops[ip];
            telemetry.on_op(ip, &op);
            ip = self
                .step(program, ip, op)
                .map_err(|kind| RuntimeError::at(kind, ip, &op))?;
        }

        match self.frames.first() {
            Some(root) if !root.is_empty() => Err(RuntimeError::new(
                RuntimeErrorKind::StackNotEmpty(root.operands.clone()),
            )),
            _ => Ok(()),
        }
    }

    /// Execute one instruction and return the next `ip`.
    fn step(&mut self, program: &Program, ip: usize, op: Op) -> Result<usize, RuntimeErrorKind> {
        match op {
            // Literals
            Op::Push { index, negate } => {
                let value = constant(program, index)?;
                self.push(if negate { value.wrapping_neg() } else { value })?;
            }
            Op::Str(_) | Op::LoopStart => {}

            // Stack operations
            Op::Pop => {
                self.frame_mut()?.operands.pop();
            }
            Op::Swap => {
                let operands = &mut self.frame_mut()?.operands;
                let n = operands.len();
                if n >= 2 {
                    operands.swap(n - 1, n - 2);
                }
            }
            Op::Duplicate => {
                let top = self.peek()?;
                self.push(top)?;
            }
            Op::Reverse => {
                let count = self.pop()?;
                if let Ok(count) = usize::try_from(count) {
                    let operands = &mut self.frame_mut()?.operands;
                    let n = operands.len();
                    if count > n {
                        return Err(RuntimeErrorKind::StackEmpty);
                    }
                    operands[n - count..].reverse();
                }
            }

            // Arithmetic
            Op::Add => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
            Op::Sub => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
            Op::Mul => self.binary(|a, b| Ok(a.wrapping_mul(b)))?,
            Op::Div => self.binary(|a, b| {
                if b == 0 {
                    Err(RuntimeErrorKind::DivisionByZero)
                } else {
                    Ok(a.wrapping_div(b))
                }
            })?,

            // Comparison
            Op::Less => self.binary(|a, b| Ok((a < b) as i64))?,
            Op::Greater => self.binary(|a, b| Ok((a > b) as i64))?,
            Op::EqualTo => self.binary(|a, b| Ok((a == b) as i64))?,

            // Control flow
            Op::If(target) => {
                let target = target.ok_or(RuntimeErrorKind::UnresolvedJump("if"))?;
                if self.pop()? == 0 {
                    return Ok(target);
                }
            }
            Op::Break(target) => {
                return target.ok_or(RuntimeErrorKind::UnresolvedJump("break"));
            }
            Op::LoopEnd(target) => {
                let target = target.ok_or(RuntimeErrorKind::UnresolvedJump("loop end"))?;
                if self.frame()?.peek().is_some_and(|top| top > 0) {
                    return Ok(target);
                }
            }

            // Procedures and tests
            Op::ProcCall { argc, retc } => {
                let caller = self.frame_mut()?;
                let available = caller.len();
                if available < argc {
                    return Err(RuntimeErrorKind::ArgumentCount {
                        expected: argc,
                        found: available,
                    });
                }
                let args = caller.operands.split_off(available - argc);
                let depth = caller.depth + 1;
                self.frames.push(Frame::procedure(depth, args, retc));
            }
            Op::Return => self.return_from_frame(program)?,
            Op::TestCall { name, end } => {
                let end = end.ok_or(RuntimeErrorKind::UnresolvedJump("test"))?;
                if !self.config.run_tests {
                    return Ok(end);
                }
                let depth = self.frame()?.depth + 1;
                self.frames.push(Frame::test(depth, name));
            }
            Op::Assert(message) => {
                if self.pop()? == 0 {
                    let message = string(program, message)?.to_string();
                    return Err(match self.innermost_test() {
                        Some(name) => RuntimeErrorKind::TestAssertionFailed {
                            test: string(program, name)?.to_string(),
                            message,
                        },
                        None => RuntimeErrorKind::AssertionFailed(message),
                    });
                }
            }

            // I/O
            Op::Input => self.input()?,
            Op::Print => {
                let top = self.peek()?;
                self.write(&format!("{} ", top))?;
            }
            Op::PrintStr(index) => {
                let text = string(program, index)?;
                self.write(text)?;
            }
            Op::PrintChar => {
                let top = self.peek()?;
                let ch = u32::try_from(top)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(RuntimeErrorKind::InvalidChar(top))?;
                self.write(ch.encode_utf8(&mut [0; 4]))?;
            }
            Op::PrintStrCodes(index) => {
                let mut codes: String = string(program, index)?
                    .chars()
                    .map(|c| format!("{} ", c as u32))
                    .collect();
                codes.push('\n');
                self.write(&codes)?;
            }
        }

        Ok(ip + 1)
    }

    fn return_from_frame(&mut self, program: &Program) -> Result<(), RuntimeErrorKind> {
        if self.frames.len() < 2 {
            return Err(RuntimeErrorKind::NoFrame);
        }
        let callee = self.frames.pop().ok_or(RuntimeErrorKind::NoFrame)?;

        match callee.kind {
            FrameKind::Test { name } => {
                let name = string(program, name)?;
                let line = format!("\"{}\" passed!\n", name);
                if !self.config.suppress_output {
                    self.output
                        .write_all(line.as_bytes())
                        .map_err(|e| RuntimeErrorKind::Io(e.to_string()))?;
                }
            }
            FrameKind::Procedure | FrameKind::Root => {
                let caller = self.frame_mut()?;
                if callee.return_arity < 0 {
                    caller.operands.extend(callee.operands.into_iter().rev());
                } else if callee.len() as i64 != callee.return_arity {
                    return Err(RuntimeErrorKind::ReturnCount {
                        expected: callee.return_arity,
                        found: callee.len(),
                    });
                } else {
                    caller.operands.extend(callee.operands);
                }
            }
        }
        Ok(())
    }

    /// Read one line; push every integer token as-is and every other
    /// alphanumeric token as its character codes, then the token count.
    fn input(&mut self) -> Result<(), RuntimeErrorKind> {
        self.output
            .flush()
            .map_err(|e| RuntimeErrorKind::Io(e.to_string()))?;

        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .map_err(|e| RuntimeErrorKind::Io(e.to_string()))?;

        let mut count = 0i64;
        for token in line.split_whitespace() {
            count += 1;
            if token.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(value) = token.parse::<i64>() {
                    self.push(value)?;
                    continue;
                }
            }
            if token.chars().all(char::is_alphanumeric) {
                for c in token.chars() {
                    self.push(c as i64)?;
                }
            }
        }

        self.push(count)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn silenced(&self) -> bool {
        self.config.suppress_output || self.innermost_test().is_some()
    }

    fn innermost_test(&self) -> Option<usize> {
        self.frames.iter().rev().find_map(|f| match f.kind {
            FrameKind::Test { name } => Some(name),
            _ => None,
        })
    }

    fn write(&mut self, text: &str) -> Result<(), RuntimeErrorKind> {
        if self.silenced() {
            return Ok(());
        }
        self.output
            .write_all(text.as_bytes())
            .map_err(|e| RuntimeErrorKind::Io(e.to_string()))
    }

    fn frame(&self) -> Result<&Frame, RuntimeErrorKind> {
        self.frames.last().ok_or(RuntimeErrorKind::NoFrame)
    }

    fn frame_mut(&mut self) -> Result<&mut Frame, RuntimeErrorKind> {
        self.frames.last_mut().ok_or(RuntimeErrorKind::NoFrame)
    }

    fn push(&mut self, value: i64) -> Result<(), RuntimeErrorKind> {
        self.frame_mut()?.operands.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<i64, RuntimeErrorKind> {
        self.frame_mut()?
            .operands
            .pop()
            .ok_or(RuntimeErrorKind::StackEmpty)
    }

    fn peek(&self) -> Result<i64, RuntimeErrorKind> {
        self.frame()?.peek().ok_or(RuntimeErrorKind::StackEmpty)
    }

    /// Pop b, pop a, push f(a, b).
    fn binary(
        &mut self,
        f: impl FnOnce(i64, i64) -> Result<i64, RuntimeErrorKind>,
    ) -> Result<(), RuntimeErrorKind> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b)?)
    }
}

fn constant(program: &Program, index: usize) -> Result<i64, RuntimeErrorKind> {
    program
        .int_constants
        .get(index)
        .copied()
        .ok_or(RuntimeErrorKind::InvalidPoolIndex {
            pool: "constant",
            index,
        })
}

fn string(program: &Program, index: usize) -> Result<&str, RuntimeErrorKind> {
    program
        .strings
        .get(index)
        .map(String::as_str)
        .ok_or(RuntimeErrorKind::InvalidPoolIndex {
            pool: "string",
            index,
        })
}
