use std::collections::HashMap;

use crate::bytecode::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Procedure,
    Macro,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Procedure => write!(f, "procedure"),
            EntryKind::Macro => write!(f, "macro"),
        }
    }
}

/// A named, fully compiled block.
///
/// Jump targets inside `body` are relative to the start of `body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// `body` already ends with `Op::Return`.
    Procedure { argc: usize, retc: i64, body: Vec<Op> },
    Macro { body: Vec<Op> },
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Procedure { .. } => EntryKind::Procedure,
            Entry::Macro { .. } => EntryKind::Macro,
        }
    }

    /// Copy this block onto the end of `dest`, relocating compile-time jump
    /// targets so the copy is independent of every other expansion.
    ///
    /// A leading print that lands right after a string literal takes its
    /// string form, exactly as if it had been written after the literal.
    pub fn splice_into(&self, dest: &mut Vec<Op>) {
        let body = match self {
            Entry::Procedure { argc, retc, body } => {
                dest.push(Op::ProcCall {
                    argc: *argc,
                    retc: *retc,
                });
                body
            }
            Entry::Macro { body } => body,
        };

        let folded = match (dest.last(), body.first()) {
            (Some(Op::Str(index)), Some(first)) => first.string_form(*index),
            _ => None,
        };

        let offset = dest.len();
        dest.extend(body.iter().map(|op| op.relocated(offset)));
        if let Some(op) = folded {
            dest[offset] = op;
        }
    }
}

/// Write-once table of named blocks, keyed by name and kind.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: HashMap<(String, EntryKind), Entry>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str, kind: EntryKind) -> bool {
        self.entries.contains_key(&(name.to_string(), kind))
    }

    pub fn get(&self, name: &str, kind: EntryKind) -> Option<&Entry> {
        self.entries.get(&(name.to_string(), kind))
    }

    /// Returns `false` (and leaves the table untouched) if the name is taken.
    pub fn define(&mut self, name: &str, entry: Entry) -> bool {
        let key = (name.to_string(), entry.kind());
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, entry);
        true
    }

    pub fn undefine(&mut self, name: &str, kind: EntryKind) -> Option<Entry> {
        self.entries.remove(&(name.to_string(), kind))
    }

    /// Merge `other` into `self`, keeping existing entries on conflict.
    /// Returns the names that were skipped.
    pub fn merge(&mut self, other: Namespace) -> Vec<(String, EntryKind)> {
        let mut skipped = Vec::new();
        for (key, entry) in other.entries {
            if self.entries.contains_key(&key) {
                skipped.push(key);
            } else {
                self.entries.insert(key, entry);
            }
        }
        skipped.sort_by(|a, b| a.0.cmp(&b.0));
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(index: usize) -> Op {
        Op::Push {
            index,
            negate: false,
        }
    }

    #[test]
    fn test_define_is_write_once() {
        let mut ns = Namespace::new();
        assert!(ns.define("sq", Entry::Macro { body: vec![Op::Duplicate, Op::Mul] }));
        assert!(!ns.define("sq", Entry::Macro { body: vec![] }));
        assert_eq!(
            ns.get("sq", EntryKind::Macro),
            Some(&Entry::Macro {
                body: vec![Op::Duplicate, Op::Mul]
            })
        );
    }

    #[test]
    fn test_same_name_different_kind() {
        let mut ns = Namespace::new();
        assert!(ns.define("f", Entry::Macro { body: vec![] }));
        assert!(ns.define(
            "f",
            Entry::Procedure {
                argc: 0,
                retc: 0,
                body: vec![Op::Return]
            }
        ));
        assert!(ns.contains("f", EntryKind::Macro));
        assert!(ns.contains("f", EntryKind::Procedure));
    }

    #[test]
    fn test_undefine() {
        let mut ns = Namespace::new();
        ns.define("m", Entry::Macro { body: vec![Op::Pop] });
        assert!(ns.undefine("m", EntryKind::Macro).is_some());
        assert!(!ns.contains("m", EntryKind::Macro));
        assert!(ns.undefine("m", EntryKind::Macro).is_none());
    }

    #[test]
    fn test_procedure_splice_prefixes_call_and_relocates() {
        let entry = Entry::Procedure {
            argc: 1,
            retc: 1,
            body: vec![Op::If(Some(2)), push(0), Op::Return],
        };
        let mut dest = vec![push(1), push(1)];
        entry.splice_into(&mut dest);
        assert_eq!(
            dest,
            vec![
                push(1),
                push(1),
                Op::ProcCall { argc: 1, retc: 1 },
                Op::If(Some(5)),
                push(0),
                Op::Return,
            ]
        );
    }

    #[test]
    fn test_macro_splices_twice_independently() {
        let entry = Entry::Macro {
            body: vec![Op::If(Some(2)), Op::Print],
        };
        let mut dest = Vec::new();
        entry.splice_into(&mut dest);
        entry.splice_into(&mut dest);
        assert_eq!(dest[0], Op::If(Some(2)));
        assert_eq!(dest[2], Op::If(Some(4)));
    }

    #[test]
    fn test_macro_leading_print_takes_preceding_string() {
        let entry = Entry::Macro {
            body: vec![Op::Print, Op::If(Some(2))],
        };
        let mut dest = vec![Op::Str(4)];
        entry.splice_into(&mut dest);
        assert_eq!(dest, vec![Op::Str(4), Op::PrintStr(4), Op::If(Some(3))]);

        let mut dest = vec![push(0)];
        entry.splice_into(&mut dest);
        assert_eq!(dest, vec![push(0), Op::Print, Op::If(Some(3))]);
    }

    #[test]
    fn test_merge_keeps_first() {
        let mut a = Namespace::new();
        a.define("x", Entry::Macro { body: vec![Op::Add] });
        let mut b = Namespace::new();
        b.define("x", Entry::Macro { body: vec![Op::Sub] });
        b.define("y", Entry::Macro { body: vec![Op::Mul] });

        let skipped = a.merge(b);
        assert_eq!(skipped, vec![("x".to_string(), EntryKind::Macro)]);
        assert_eq!(
            a.get("x", EntryKind::Macro),
            Some(&Entry::Macro { body: vec![Op::Add] })
        );
        assert!(a.contains("y", EntryKind::Macro));
    }
}
