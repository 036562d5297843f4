//! Temporary and label allocation.
//!
//! One [`LowerCtx`] lives for one compilation unit. Its counters only ever
//! increase, so every temporary and every label it hands out is unique
//! within the unit. Nothing is shared between units.

use jmm_ir::Label;
use tracing::trace;

/// Kind of control-flow label. Each kind has its own counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// `then` branch of an `if`.
    If,
    /// Join point after an `if`.
    EndIf,
    WhileCond,
    WhileLoop,
    WhileEnd,
    /// Taken side of a materialized boolean.
    True,
    /// Join point of a materialized boolean.
    End,
}

impl LabelKind {
    const COUNT: usize = 7;

    pub fn prefix(self) -> &'static str {
        match self {
            LabelKind::If => "if",
            LabelKind::EndIf => "endif",
            LabelKind::WhileCond => "whileCond",
            LabelKind::WhileLoop => "whileLoop",
            LabelKind::WhileEnd => "whileEnd",
            LabelKind::True => "true_",
            LabelKind::End => "end_",
        }
    }

    fn index(self) -> usize {
        match self {
            LabelKind::If => 0,
            LabelKind::EndIf => 1,
            LabelKind::WhileCond => 2,
            LabelKind::WhileLoop => 3,
            LabelKind::WhileEnd => 4,
            LabelKind::True => 5,
            LabelKind::End => 6,
        }
    }
}

/// Per-unit lowering state.
#[derive(Debug, Default)]
pub struct LowerCtx {
    next_temp: u32,
    labels: [u32; LabelKind::COUNT],
}

impl LowerCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next `tmpN` name.
    pub fn fresh_temp(&mut self) -> String {
        let name = format!("tmp{}", self.next_temp);
        self.next_temp += 1;
        trace!(temp = %name, "allocated temporary");
        name
    }

    /// Next label of the given kind.
    pub fn fresh_label(&mut self, kind: LabelKind) -> Label {
        let counter = &mut self.labels[kind.index()];
        let label = Label(format!("{}{}", kind.prefix(), counter));
        *counter += 1;
        trace!(label = %label, "allocated label");
        label
    }

    /// Number of temporaries handed out so far.
    pub fn temps_allocated(&self) -> u32 {
        self.next_temp
    }
}
