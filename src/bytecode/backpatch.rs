//! Whole-program jump resolution.
//!
//! Both passes run once over the fully flattened stream, after every
//! procedure, macro and import has been copied in, so the targets they write
//! are absolute indices into the final program.

use crate::bytecode::Op;
use crate::bytecode::compile_error::CompileErrorKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub loops: usize,
    pub breaks: usize,
}

pub fn resolve_jumps(ops: &mut [Op]) -> Result<PatchSummary, CompileErrorKind> {
    let loops = patch_loops(ops)?;
    let breaks = patch_breaks(ops)?;
    Ok(PatchSummary { loops, breaks })
}

/// Point every `LoopEnd` back at its matching `LoopStart`.
pub fn patch_loops(ops: &mut [Op]) -> Result<usize, CompileErrorKind> {
    let mut starts = Vec::new();
    let mut patched = 0;

    for ip in 0..ops.len() {
        match ops[ip] {
            Op::LoopStart => starts.push(ip),
            Op::LoopEnd(_) => {
                let start = starts
                    .pop()
                    .ok_or(CompileErrorKind::UnmatchedLoopEnd(ip))?;
                ops[ip] = Op::LoopEnd(Some(start));
                patched += 1;
            }
            _ => {}
        }
    }

    Ok(patched)
}

/// Point every `Break` at the instruction after the `LoopEnd` of the
/// innermost loop that lexically contains it.
pub fn patch_breaks(ops: &mut [Op]) -> Result<usize, CompileErrorKind> {
    let mut depth = 0usize;
    // (loop depth, break index)
    let mut pending: Vec<(usize, usize)> = Vec::new();
    let mut stray = 0usize;
    let mut patched = 0;

    for ip in 0..ops.len() {
        match ops[ip] {
            Op::LoopStart => depth += 1,
            Op::Break(_) => {
                if depth > 0 {
                    pending.push((depth, ip));
                } else {
                    stray += 1;
                }
            }
            Op::LoopEnd(_) => {
                while let Some(&(d, break_ip)) = pending.last() {
                    if d != depth {
                        break;
                    }
                    ops[break_ip] = Op::Break(Some(ip + 1));
                    pending.pop();
                    patched += 1;
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    let unresolved = stray + pending.len();
    if unresolved > 0 {
        return Err(CompileErrorKind::UnresolvedBreak(unresolved));
    }

    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_loop() {
        let mut ops = vec![Op::LoopStart, Op::Duplicate, Op::LoopEnd(None)];
        let summary = resolve_jumps(&mut ops).unwrap();
        assert_eq!(summary, PatchSummary { loops: 1, breaks: 0 });
        assert_eq!(ops[2], Op::LoopEnd(Some(0)));
    }

    #[test]
    fn test_nested_loops_resolve_innermost_first() {
        // 0 [ 1 [ 2 3 ] 4 ]
        let mut ops = vec![
            Op::LoopStart,
            Op::LoopStart,
            Op::Duplicate,
            Op::LoopEnd(None),
            Op::Pop,
            Op::LoopEnd(None),
        ];
        patch_loops(&mut ops).unwrap();
        assert_eq!(ops[3], Op::LoopEnd(Some(1)));
        assert_eq!(ops[5], Op::LoopEnd(Some(0)));
    }

    #[test]
    fn test_break_targets_its_own_loop() {
        let mut ops = vec![
            Op::LoopStart,      // 0
            Op::Break(None),    // 1 -> 7
            Op::LoopStart,      // 2
            Op::Break(None),    // 3 -> 5
            Op::LoopEnd(None),  // 4
            Op::Pop,            // 5
            Op::LoopEnd(None),  // 6
            Op::Pop,            // 7
        ];
        let summary = resolve_jumps(&mut ops).unwrap();
        assert_eq!(summary.breaks, 2);
        assert_eq!(ops[1], Op::Break(Some(7)));
        assert_eq!(ops[3], Op::Break(Some(5)));
    }

    #[test]
    fn test_break_after_inner_loop_targets_outer_exit() {
        let mut ops = vec![
            Op::LoopStart,     // 0
            Op::LoopStart,     // 1
            Op::Pop,           // 2
            Op::LoopEnd(None), // 3
            Op::Break(None),   // 4 -> 6
            Op::LoopEnd(None), // 5
        ];
        resolve_jumps(&mut ops).unwrap();
        assert_eq!(ops[4], Op::Break(Some(6)));
    }

    #[test]
    fn test_repatching_is_stable() {
        let mut ops = vec![Op::LoopStart, Op::Break(None), Op::LoopEnd(None)];
        resolve_jumps(&mut ops).unwrap();
        let first = ops.clone();
        resolve_jumps(&mut ops).unwrap();
        assert_eq!(ops, first);
    }

    #[test]
    fn test_stray_break_is_internal_error() {
        let mut ops = vec![Op::Break(None)];
        assert_eq!(
            resolve_jumps(&mut ops),
            Err(CompileErrorKind::UnresolvedBreak(1))
        );
    }

    #[test]
    fn test_unmatched_loop_end() {
        let mut ops = vec![Op::Pop, Op::LoopEnd(None)];
        assert_eq!(
            patch_loops(&mut ops),
            Err(CompileErrorKind::UnmatchedLoopEnd(1))
        );
    }
}
