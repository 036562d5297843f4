//! Use counts for one method.
//!
//! Counts how many times each variable is read anywhere in the body. A call
//! whose destination is never read can drop its result with `pop` instead of
//! storing it. Labels no jump refers to are not emitted.

use jmm_ir::{IrMethod, Label};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Default)]
pub struct UseCounts {
    reads: FxHashMap<String, u32>,
    targets: FxHashSet<Label>,
}

impl UseCounts {
    pub fn of(method: &IrMethod) -> Self {
        let mut reads: FxHashMap<String, u32> = FxHashMap::default();
        let mut targets = FxHashSet::default();
        for instr in &method.instrs {
            for var in instr.used_vars() {
                *reads.entry(var).or_default() += 1;
            }
            if let Some(target) = instr.jump_target() {
                targets.insert(target.clone());
            }
        }
        UseCounts { reads, targets }
    }

    pub fn is_jump_target(&self, label: &Label) -> bool {
        self.targets.contains(label)
    }

    pub fn reads(&self, name: &str) -> u32 {
        self.reads.get(name).copied().unwrap_or(0)
    }

    /// Whether a value written to `name` can never be observed.
    pub fn is_dead(&self, name: &str) -> bool {
        self.reads(name) == 0
    }
}
