//! Statement lowering: assignments, returns, and structured control flow.
//!
//! Control flow becomes labels and jumps:
//!
//! ```text
//! if (c) then else            while (c) body
//!
//!     if (c) goto ifN;            whileCondN:
//!     <else>                      if (c) goto whileLoopN;
//!     goto endifN;                goto whileEndN;
//! ifN:                        whileLoopN:
//!     <then>                      <body>
//! endifN:                         goto whileCondN;
//!                             whileEndN:
//! ```
//!
//! `goto endifN` is omitted when the else arm ends in a return, and `endifN`
//! itself when both arms do.

use jmm_ir::{
    ensure_sufficient_stack, CompileError, CompileResult, Expr, ExprKind, Instr, IrType, Rhs, Span,
    Stmt, StmtKind, VarOrigin,
};

use crate::expr::{element_type, Lowerer};
use crate::scope::ir_type;
use crate::LabelKind;

impl Lowerer<'_> {
    pub(crate) fn lower_stmts(&mut self, stmts: &[Stmt], out: &mut Vec<Instr>) -> CompileResult<()> {
        for stmt in stmts {
            self.lower_stmt(stmt, out)?;
        }
        Ok(())
    }

    pub(crate) fn lower_stmt(&mut self, stmt: &Stmt, out: &mut Vec<Instr>) -> CompileResult<()> {
        ensure_sufficient_stack(|| self.lower_stmt_inner(stmt, out))
    }

    fn lower_stmt_inner(&mut self, stmt: &Stmt, out: &mut Vec<Instr>) -> CompileResult<()> {
        match &stmt.kind {
            // Declarations live in the slot table already.
            StmtKind::VarDecl(_) => Ok(()),
            StmtKind::Block(stmts) => self.lower_stmts(stmts, out),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref(), out),
            StmtKind::While { cond, body } => self.lower_while(cond, body, out),
            StmtKind::Assign { target, value } => self.lower_assign(target, value, stmt.span, out),
            StmtKind::Expr(expr) => self.lower_expr_stmt(expr, out),
            StmtKind::Return(value) => {
                let ty = self.method.return_type.clone();
                let value = match value {
                    Some(expr) => Some(self.lower_into(expr, Some(&ty), out)?),
                    None => None,
                };
                out.push(Instr::Return { ty, value });
                Ok(())
            }
        }
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
        out: &mut Vec<Instr>,
    ) -> CompileResult<()> {
        let then_label = self.ctx.fresh_label(LabelKind::If);
        let end_label = self.ctx.fresh_label(LabelKind::EndIf);

        let cond = self.lower_cond(cond, out)?;
        out.push(Instr::Branch {
            cond,
            target: then_label.clone(),
        });
        if let Some(else_branch) = else_branch {
            self.lower_stmt(else_branch, out)?;
        }
        let else_returns = ends_in_return(out);
        if !else_returns {
            out.push(Instr::Goto(end_label.clone()));
        }
        out.push(Instr::Label(then_label));
        self.lower_stmt(then_branch, out)?;
        // Nothing reaches the join point when both arms return.
        if !(else_returns && ends_in_return(out)) {
            out.push(Instr::Label(end_label));
        }
        Ok(())
    }

    /// The condition is re-tested at the top of every iteration.
    fn lower_while(&mut self, cond: &Expr, body: &Stmt, out: &mut Vec<Instr>) -> CompileResult<()> {
        let cond_label = self.ctx.fresh_label(LabelKind::WhileCond);
        let loop_label = self.ctx.fresh_label(LabelKind::WhileLoop);
        let end_label = self.ctx.fresh_label(LabelKind::WhileEnd);

        out.push(Instr::Label(cond_label.clone()));
        let cond = self.lower_cond(cond, out)?;
        out.push(Instr::Branch {
            cond,
            target: loop_label.clone(),
        });
        out.push(Instr::Goto(end_label.clone()));
        out.push(Instr::Label(loop_label));
        self.lower_stmt(body, out)?;
        out.push(Instr::Goto(cond_label));
        out.push(Instr::Label(end_label));
        Ok(())
    }

    fn lower_assign(
        &mut self,
        target: &Expr,
        value: &Expr,
        span: Span,
        out: &mut Vec<Instr>,
    ) -> CompileResult<()> {
        match &target.unparen().kind {
            ExprKind::Ident(name) => {
                let symbols = self.symbols;
                match symbols.resolve_var(&self.method.name, name) {
                    Some((VarOrigin::Field, ty)) => {
                        let ty = ir_type(ty, name, span)?;
                        let object = self.method.this_operand(span)?;
                        let value = self.lower_into(value, Some(&ty), out)?;
                        out.push(Instr::PutField {
                            object,
                            field: name.clone(),
                            value,
                        });
                    }
                    Some(_) => {
                        let ty = self
                            .method
                            .var_type(name)
                            .cloned()
                            .ok_or_else(|| CompileError::unknown_variable(name.as_str(), span))?;
                        let value = self.lower_rhs(value, &ty, out)?;
                        out.push(Instr::Assign {
                            dest: name.clone(),
                            ty,
                            value,
                        });
                    }
                    None => return Err(CompileError::unknown_variable(name.as_str(), target.span)),
                }
                Ok(())
            }
            ExprKind::Index { array, index } => {
                let array = self.lower_into(array, None, out)?;
                let index = self.lower_into(index, Some(&IrType::Int32), out)?;
                let elem = element_type(&array, target.span)?;
                let value = self.lower_into(value, Some(&elem), out)?;
                out.push(Instr::ArrayStore {
                    array,
                    index,
                    value,
                });
                Ok(())
            }
            _ => Err(CompileError::unsupported("assignment target", target.span)),
        }
    }

    /// Right hand side of a move into a named variable. A call is bound
    /// directly instead of through an extra temporary.
    fn lower_rhs(&mut self, value: &Expr, ty: &IrType, out: &mut Vec<Instr>) -> CompileResult<Rhs> {
        let inner = value.unparen();
        if matches!(inner.kind, ExprKind::MethodCall { .. }) {
            let call = self.lower_call(inner, Some(ty), out)?;
            if !call.ret.is_void() {
                return Ok(Rhs::Call(call));
            }
            return Err(CompileError::unsupported(
                format!("result of void call `{}` used as a value", call.method),
                inner.span,
            ));
        }
        Ok(Rhs::Operand(self.lower_into(value, Some(ty), out)?))
    }

    /// Calls are emitted unbound; any other expression only keeps its
    /// computation.
    fn lower_expr_stmt(&mut self, expr: &Expr, out: &mut Vec<Instr>) -> CompileResult<()> {
        let inner = expr.unparen();
        if matches!(inner.kind, ExprKind::MethodCall { .. }) {
            let call = self.lower_call(inner, Some(&IrType::Void), out)?;
            out.push(Instr::Call(call));
            return Ok(());
        }
        let result = self.lower_expr(expr, None)?;
        out.extend(result.computation);
        Ok(())
    }
}

fn ends_in_return(instrs: &[Instr]) -> bool {
    matches!(instrs.last(), Some(Instr::Return { .. }))
}
