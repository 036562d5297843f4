//! Instruction buffer with operand-stack accounting.
//!
//! Every opcode is written together with how many values it pops and pushes,
//! so the `.limit stack` directive is the exact maximum depth reached.

use std::fmt::Write as _;

/// Body text of one method plus its stack bookkeeping.
pub struct Emitter {
    /// Generated instruction text.
    output: String,
    /// Current operand-stack depth.
    depth: u16,
    /// Highest depth seen so far.
    max_depth: u16,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            output: String::with_capacity(1024),
            depth: 0,
            max_depth: 0,
        }
    }

    /// Write one instruction that pops `pops` values and then pushes `pushes`.
    pub fn op(&mut self, text: &str, pops: u16, pushes: u16) {
        self.output.push_str("    ");
        self.output.push_str(text);
        self.output.push('\n');
        self.pop_stack(pops);
        self.push_stack(pushes);
    }

    /// Same as [`op`](Self::op) with a formatted operand.
    pub fn op_with(&mut self, mnemonic: &str, operand: impl std::fmt::Display, pops: u16, pushes: u16) {
        let _ = writeln!(self.output, "    {mnemonic} {operand}");
        self.pop_stack(pops);
        self.push_stack(pushes);
    }

    pub fn label(&mut self, name: &str) {
        self.output.push_str(name);
        self.output.push_str(":\n");
    }

    fn push_stack(&mut self, count: u16) {
        self.depth += count;
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn pop_stack(&mut self, count: u16) {
        debug_assert!(self.depth >= count, "operand stack underflow");
        self.depth = self.depth.saturating_sub(count);
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn max_depth(&self) -> u16 {
        self.max_depth
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}
