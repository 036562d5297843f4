//! Per-method lowering state.
//!
//! [`MethodCtx`] owns the slot table of the method being lowered. Slots are
//! handed out in a fixed order: `this` (instance methods only), then
//! parameters, then locals in declaration order, then temporaries as they
//! are created. Every name gets its own slot.

use jmm_ir::{CompileError, CompileResult, IrType, MethodSymbols, Operand, Span, VarInfo};
use rustc_hash::FxHashMap;

use crate::LowerCtx;

const THIS: &str = "this";

pub(crate) struct MethodCtx {
    pub(crate) name: String,
    pub(crate) class_name: String,
    pub(crate) is_static: bool,
    pub(crate) return_type: IrType,
    vars: FxHashMap<String, VarInfo>,
    next_slot: u16,
}

impl MethodCtx {
    pub(crate) fn new(class_name: &str, method: &MethodSymbols, span: Span) -> CompileResult<Self> {
        let mut ctx = MethodCtx {
            name: method.name.clone(),
            class_name: class_name.to_owned(),
            is_static: method.is_static,
            return_type: ir_type(&method.return_type, &method.name, span)?,
            vars: FxHashMap::default(),
            next_slot: 0,
        };

        if !method.is_static {
            ctx.declare(THIS, IrType::Class(class_name.to_owned()));
        }
        for param in &method.params {
            let ty = ir_type(&param.ty, &param.name, span)?;
            ctx.declare(&param.name, ty);
        }
        for local in &method.locals {
            let ty = ir_type(&local.ty, &local.name, span)?;
            ctx.declare(&local.name, ty);
        }
        Ok(ctx)
    }

    fn declare(&mut self, name: &str, ty: IrType) {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.vars.insert(name.to_owned(), VarInfo { slot, ty });
    }

    /// Type of a declared name.
    pub(crate) fn var_type(&self, name: &str) -> Option<&IrType> {
        self.vars.get(name).map(|info| &info.ty)
    }

    /// Allocate a temporary of type `ty` and give it a slot. Skips counter
    /// values whose name is already taken by a user variable.
    pub(crate) fn fresh_temp(&mut self, ctx: &mut LowerCtx, ty: IrType) -> String {
        loop {
            let name = ctx.fresh_temp();
            if !self.vars.contains_key(&name) {
                self.declare(&name, ty);
                return name;
            }
        }
    }

    /// The receiver operand; an error in static methods.
    pub(crate) fn this_operand(&self, span: Span) -> CompileResult<Operand> {
        if self.is_static {
            return Err(CompileError::unsupported(
                format!("`this` in static method `{}`", self.name),
                span,
            ));
        }
        Ok(Operand::This {
            class: self.class_name.clone(),
        })
    }

    pub(crate) fn into_var_table(self) -> FxHashMap<String, VarInfo> {
        self.vars
    }
}

/// Map a declared type, failing on the undefined sentinel.
pub(crate) fn ir_type(ty: &jmm_ir::Type, what: &str, span: Span) -> CompileResult<IrType> {
    IrType::from_type(ty).ok_or_else(|| CompileError::unresolved_type(format!("`{what}`"), span))
}
