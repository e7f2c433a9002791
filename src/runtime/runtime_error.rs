use thiserror::Error;

use crate::bytecode::Op;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeErrorKind {
    #[error("cannot pop stack, stack is empty")]
    StackEmpty,

    #[error("cannot divide by 0")]
    DivisionByZero,

    #[error("procedure expected {expected} argument(s) but got {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("return expected {expected} value(s) but got {found}")]
    ReturnCount { expected: i64, found: usize },

    #[error("{0} jump point was not set")]
    UnresolvedJump(&'static str),

    #[error("stack is not empty on exit: {0:?}")]
    StackNotEmpty(Vec<i64>),

    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("[test \"{test}\"] assertion failed: {message}")]
    TestAssertionFailed { test: String, message: String },

    #[error("{0} is not a valid character code")]
    InvalidChar(i64),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("return without an open frame")]
    NoFrame,

    #[error("{pool} pool has no entry {index}")]
    InvalidPoolIndex { pool: &'static str, index: usize },
}

/// A fatal runtime error, tagged with the instruction that raised it when
/// there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub ip: Option<usize>,
    pub mnemonic: Option<&'static str>,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.kind)?;

        if let (Some(ip), Some(mnemonic)) = (self.ip, self.mnemonic) {
            write!(f, " on op <{}:{}>", ip, mnemonic)?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind) -> Self {
        RuntimeError {
            kind,
            ip: None,
            mnemonic: None,
        }
    }

    pub fn at(kind: RuntimeErrorKind, ip: usize, op: &Op) -> Self {
        RuntimeError {
            kind,
            ip: Some(ip),
            mnemonic: Some(op.mnemonic()),
        }
    }
}

impl From<RuntimeErrorKind> for RuntimeError {
    fn from(kind: RuntimeErrorKind) -> Self {
        RuntimeError::new(kind)
    }
}
