//! Execution observers injected into `Vm::run`.

use std::collections::HashMap;

use crate::bytecode::Op;

pub trait Telemetry {
    /// Called before each instruction executes.
    fn on_op(&mut self, ip: usize, op: &Op);

    /// Called once with the root frame as execution stops, whatever the outcome.
    fn on_finish(&mut self, _root: &[i64]) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTelemetry;

impl Telemetry for NoTelemetry {
    fn on_op(&mut self, _ip: usize, _op: &Op) {}
}

/// Counts executed instructions per mnemonic and keeps the final root stack.
#[derive(Debug, Default, Clone)]
pub struct OpCounter {
    counts: HashMap<&'static str, usize>,
    total: usize,
    final_stack: Vec<i64>,
}

impl OpCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn count(&self, mnemonic: &str) -> usize {
        self.counts.get(mnemonic).copied().unwrap_or(0)
    }

    pub fn final_stack(&self) -> &[i64] {
        &self.final_stack
    }

    /// Most frequent first; ties by name.
    pub fn sorted(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<_> = self.counts.iter().map(|(k, v)| (*k, *v)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        counts
    }

    pub fn report(&self) -> String {
        let mut out = String::from("=== EXECUTION STATISTICS ===\n\n");
        out.push_str(&format!("Instructions executed: {}\n\n", self.total));
        out.push_str("Op frequency:\n");

        for (name, count) in self.sorted() {
            let pct = if self.total == 0 {
                0.0
            } else {
                (count as f64 / self.total as f64) * 100.0
            };
            out.push_str(&format!("  {:<16} {:>6} ({:>5.1}%)\n", name, count, pct));
        }

        out.push_str(&format!("\nstack :: {:?}\n", self.final_stack));
        out
    }
}

impl Telemetry for OpCounter {
    fn on_op(&mut self, _ip: usize, op: &Op) {
        *self.counts.entry(op.mnemonic()).or_insert(0) += 1;
        self.total += 1;
    }

    fn on_finish(&mut self, root: &[i64]) {
        self.final_stack = root.to_vec();
    }
}
