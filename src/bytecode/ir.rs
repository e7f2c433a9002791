use crate::bytecode::Op;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A compiled program: one flat instruction stream plus the two literal pools
/// it indexes into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Op>,
    /// Deduplicated integer literals (always stored as written, unsigned).
    pub int_constants: Vec<i64>,
    /// Deduplicated string literals.
    pub strings: Vec<String>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Program, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// Value-deduplicating literal pools shared by every buffer of one
/// compilation (including imported files).
#[derive(Debug, Clone, Default)]
pub struct Pools {
    int_constants: Vec<i64>,
    int_index: HashMap<i64, usize>,
    strings: Vec<String>,
    string_index: HashMap<String, usize>,
}

impl Pools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_int(&mut self, value: i64) -> usize {
        if let Some(&idx) = self.int_index.get(&value) {
            return idx;
        }
        let idx = self.int_constants.len();
        self.int_constants.push(value);
        self.int_index.insert(value, idx);
        idx
    }

    pub fn intern_str(&mut self, value: &str) -> usize {
        if let Some(&idx) = self.string_index.get(value) {
            return idx;
        }
        let idx = self.strings.len();
        self.strings.push(value.to_string());
        self.string_index.insert(value.to_string(), idx);
        idx
    }

    pub fn into_parts(self) -> (Vec<i64>, Vec<String>) {
        (self.int_constants, self.strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_dedup() {
        let mut pools = Pools::new();
        assert_eq!(pools.intern_int(5), 0);
        assert_eq!(pools.intern_int(7), 1);
        assert_eq!(pools.intern_int(5), 0);
        let (ints, strings) = pools.into_parts();
        assert_eq!(ints, vec![5, 7]);
        assert!(strings.is_empty());
    }

    #[test]
    fn test_string_dedup() {
        let mut pools = Pools::new();
        assert_eq!(pools.intern_str("a"), 0);
        assert_eq!(pools.intern_str("b"), 1);
        assert_eq!(pools.intern_str("a"), 0);
    }

    #[test]
    fn test_postcard_roundtrip_preserves_program() {
        let program = Program {
            instructions: vec![
                Op::Push {
                    index: 0,
                    negate: true,
                },
                Op::If(Some(3)),
                Op::PrintStr(0),
                Op::Pop,
            ],
            int_constants: vec![4],
            strings: vec!["hi".to_string()],
        };
        let bytes = program.to_bytes().unwrap();
        assert_eq!(Program::from_bytes(&bytes).unwrap(), program);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(Program::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }
}
