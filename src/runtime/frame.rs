#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Root,
    Procedure,
    /// A gated test block; `name` indexes the string pool.
    Test { name: usize },
}

/// One call-local operand stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub depth: usize,
    pub operands: Vec<i64>,
    /// Values to hand back to the caller on `Return`; -1 means all of them.
    pub return_arity: i64,
    pub kind: FrameKind,
}

impl Frame {
    pub fn root() -> Self {
        Frame {
            depth: 0,
            operands: Vec::new(),
            return_arity: 0,
            kind: FrameKind::Root,
        }
    }

    pub fn procedure(depth: usize, args: Vec<i64>, return_arity: i64) -> Self {
        Frame {
            depth,
            operands: args,
            return_arity,
            kind: FrameKind::Procedure,
        }
    }

    pub fn test(depth: usize, name: usize) -> Self {
        Frame {
            depth,
            operands: Vec::new(),
            return_arity: 0,
            kind: FrameKind::Test { name },
        }
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    pub fn peek(&self) -> Option<i64> {
        self.operands.last().copied()
    }
}
