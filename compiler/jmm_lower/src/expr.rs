//! Expression lowering.
//!
//! [`Lowerer`] turns one expression into an [`ExprResult`]: an operand that
//! holds the value plus the instructions that must run first. Anything more
//! than a literal or a variable read goes through a fresh temporary, so the
//! operand is always a single load at codegen.
//!
//! # Expected types
//!
//! Calls into classes outside this unit have no declared return type. The
//! caller passes the type its context expects (assignment destination,
//! `i32` inside arithmetic, `bool` in a condition, `V` in statement
//! position) and the call is typed with that.

use jmm_ir::{
    ensure_sufficient_stack, BinaryOp, Call, CallTarget, CompileError, CompileResult, Cond, Expr,
    ExprKind, Instr, InvokeKind, IrType, MethodSymbols, Operand, Rhs, Span, SymbolTable, VarOrigin,
};
use smallvec::SmallVec;
use tracing::trace;

use crate::scope::{ir_type, MethodCtx};
use crate::{LabelKind, LowerCtx, TypeResolver};

/// Lowered expression: `code` is valid once `computation` has run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExprResult {
    pub code: Operand,
    pub computation: Vec<Instr>,
}

/// Lowers the body of one method.
pub(crate) struct Lowerer<'a> {
    pub(crate) symbols: &'a SymbolTable,
    pub(crate) ctx: &'a mut LowerCtx,
    pub(crate) method: MethodCtx,
}

impl Lowerer<'_> {
    pub(crate) fn resolver(&self) -> TypeResolver<'_> {
        TypeResolver::new(self.symbols, &self.method.name)
    }

    /// Assign `value` to a fresh temporary and return the temporary.
    fn materialize(&mut self, ty: IrType, value: Rhs, out: &mut Vec<Instr>) -> Operand {
        let dest = self.method.fresh_temp(self.ctx, ty.clone());
        out.push(Instr::Assign {
            dest: dest.clone(),
            ty: ty.clone(),
            value,
        });
        Operand::var(dest, ty)
    }

    pub(crate) fn lower_expr(
        &mut self,
        expr: &Expr,
        expected: Option<&IrType>,
    ) -> CompileResult<ExprResult> {
        let mut computation = Vec::new();
        let code = self.lower_into(expr, expected, &mut computation)?;
        Ok(ExprResult { code, computation })
    }

    /// Lower `expr`, appending its computation to `out`.
    pub(crate) fn lower_into(
        &mut self,
        expr: &Expr,
        expected: Option<&IrType>,
        out: &mut Vec<Instr>,
    ) -> CompileResult<Operand> {
        ensure_sufficient_stack(|| self.lower_inner(expr, expected, out))
    }

    fn lower_inner(
        &mut self,
        expr: &Expr,
        expected: Option<&IrType>,
        out: &mut Vec<Instr>,
    ) -> CompileResult<Operand> {
        let span = expr.span;
        match &expr.kind {
            // ── Leaves ─────────────────────────────────────────
            ExprKind::Int(v) => Ok(Operand::Int(*v)),
            ExprKind::Bool(b) => Ok(Operand::Bool(*b)),
            ExprKind::Ident(name) => self.lower_ident(name, span, out),
            ExprKind::This => self.method.this_operand(span),
            ExprKind::Paren(inner) => self.lower_into(inner, expected, out),

            // ── Operators ──────────────────────────────────────
            ExprKind::Not(inner) => {
                let value = self.lower_into(inner, Some(&IrType::Bool), out)?;
                Ok(self.materialize(IrType::Bool, Rhs::Not(value), out))
            }
            ExprKind::Binary { op, left, right } => {
                if op.is_logical() {
                    self.lower_short_circuit(*op, left, right, out)
                } else if op.is_comparison() {
                    let cond = self.lower_cond(expr, out)?;
                    Ok(self.materialize_cond(cond, out))
                } else {
                    let lhs = self.lower_into(left, Some(&IrType::Int32), out)?;
                    let rhs = self.lower_into(right, Some(&IrType::Int32), out)?;
                    Ok(self.materialize(IrType::Int32, Rhs::Binary { op: *op, lhs, rhs }, out))
                }
            }

            // ── Arrays ─────────────────────────────────────────
            ExprKind::Index { array, index } => {
                let array = self.lower_into(array, None, out)?;
                let index = self.lower_into(index, Some(&IrType::Int32), out)?;
                let elem = element_type(&array, span)?;
                Ok(self.materialize(elem, Rhs::ArrayLoad { array, index }, out))
            }
            ExprKind::Length(array) => {
                let array = self.lower_into(array, None, out)?;
                Ok(self.materialize(IrType::Int32, Rhs::ArrayLength(array), out))
            }
            ExprKind::NewArray { elem, size } => {
                let elem = ir_type(elem, "array element", span)?;
                let size = self.lower_into(size, Some(&IrType::Int32), out)?;
                Ok(self.materialize(
                    IrType::Array(Box::new(elem.clone())),
                    Rhs::NewArray { elem, size },
                    out,
                ))
            }
            ExprKind::ArrayLiteral(elems) => self.lower_array_literal(elems, span, out),

            // ── Objects and calls ──────────────────────────────
            ExprKind::NewObject(class) => {
                let ty = IrType::Class(class.clone());
                let object = self.materialize(ty, Rhs::New(class.clone()), out);
                out.push(Instr::Call(Call::init(object.clone())));
                Ok(object)
            }
            ExprKind::MethodCall { method, .. } => {
                let call = self.lower_call(expr, expected, out)?;
                if call.ret.is_void() {
                    return Err(CompileError::unsupported(
                        format!("result of void call `{method}` used as a value"),
                        span,
                    ));
                }
                Ok(self.materialize(call.ret.clone(), Rhs::Call(call), out))
            }
        }
    }

    /// A local or parameter is read directly; a field goes through
    /// `getfield` on `this`.
    fn lower_ident(
        &mut self,
        name: &str,
        span: Span,
        out: &mut Vec<Instr>,
    ) -> CompileResult<Operand> {
        let symbols = self.symbols;
        match symbols.resolve_var(&self.method.name, name) {
            Some((VarOrigin::Field, ty)) => {
                let ty = ir_type(ty, name, span)?;
                let object = self.method.this_operand(span)?;
                let value = Rhs::GetField {
                    object,
                    field: name.to_owned(),
                    ty: ty.clone(),
                };
                Ok(self.materialize(ty, value, out))
            }
            Some((VarOrigin::Local | VarOrigin::Param(_), _)) => {
                let ty = self
                    .method
                    .var_type(name)
                    .cloned()
                    .ok_or_else(|| CompileError::unknown_variable(name, span))?;
                Ok(Operand::var(name, ty))
            }
            None if self.resolver().resolve_name(name).is_undefined() => {
                Err(CompileError::unknown_variable(name, span))
            }
            None => Err(CompileError::unsupported(
                format!("class name `{name}` used as a value"),
                span,
            )),
        }
    }

    /// `&&` and `||` with the right operand evaluated only when needed.
    fn lower_short_circuit(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        out: &mut Vec<Instr>,
    ) -> CompileResult<Operand> {
        let lhs = self.lower_into(left, Some(&IrType::Bool), out)?;
        let taken = self.ctx.fresh_label(LabelKind::True);
        let end = self.ctx.fresh_label(LabelKind::End);
        let result = self.method.fresh_temp(self.ctx, IrType::Bool);
        let assign = |value: Operand| Instr::Assign {
            dest: result.clone(),
            ty: IrType::Bool,
            value: Rhs::Operand(value),
        };

        out.push(Instr::Branch {
            cond: Cond::Bool(lhs),
            target: taken.clone(),
        });
        if op == BinaryOp::And {
            out.push(assign(Operand::Bool(false)));
            out.push(Instr::Goto(end.clone()));
            out.push(Instr::Label(taken));
            let rhs = self.lower_into(right, Some(&IrType::Bool), out)?;
            out.push(assign(rhs));
        } else {
            let rhs = self.lower_into(right, Some(&IrType::Bool), out)?;
            out.push(assign(rhs));
            out.push(Instr::Goto(end.clone()));
            out.push(Instr::Label(taken));
            out.push(assign(Operand::Bool(true)));
        }
        out.push(Instr::Label(end));

        trace!(op = %op, temp = %result, "lowered short-circuit operator");
        Ok(Operand::var(result, IrType::Bool))
    }

    /// Lower a branch guard. Relational operators become a compare-and-branch;
    /// everything else is a boolean operand.
    pub(crate) fn lower_cond(&mut self, expr: &Expr, out: &mut Vec<Instr>) -> CompileResult<Cond> {
        match &expr.unparen().kind {
            ExprKind::Binary { op, left, right } if op.is_comparison() => {
                let expected = match op {
                    BinaryOp::Eq | BinaryOp::NotEq => None,
                    _ => Some(&IrType::Int32),
                };
                let lhs = self.lower_into(left, expected, out)?;
                let rhs = self.lower_into(right, expected, out)?;
                Ok(Cond::Compare { op: *op, lhs, rhs })
            }
            _ => Ok(Cond::Bool(self.lower_into(expr, Some(&IrType::Bool), out)?)),
        }
    }

    /// Turn a guard into a boolean value through a branch.
    fn materialize_cond(&mut self, cond: Cond, out: &mut Vec<Instr>) -> Operand {
        let taken = self.ctx.fresh_label(LabelKind::True);
        let end = self.ctx.fresh_label(LabelKind::End);
        let result = self.method.fresh_temp(self.ctx, IrType::Bool);
        let assign = |value: bool| Instr::Assign {
            dest: result.clone(),
            ty: IrType::Bool,
            value: Rhs::Operand(Operand::Bool(value)),
        };

        out.push(Instr::Branch {
            cond,
            target: taken.clone(),
        });
        out.push(assign(false));
        out.push(Instr::Goto(end.clone()));
        out.push(Instr::Label(taken));
        out.push(assign(true));
        out.push(Instr::Label(end));
        Operand::var(result, IrType::Bool)
    }

    fn lower_array_literal(
        &mut self,
        elems: &[Expr],
        span: Span,
        out: &mut Vec<Instr>,
    ) -> CompileResult<Operand> {
        let array = self.new_int_array(elems.len(), span, out)?;
        self.store_elements(&array, elems, out)?;
        Ok(array)
    }

    fn new_int_array(
        &mut self,
        len: usize,
        span: Span,
        out: &mut Vec<Instr>,
    ) -> CompileResult<Operand> {
        let size = i32::try_from(len)
            .map_err(|_| CompileError::unsupported("array literal with too many elements", span))?;
        Ok(self.materialize(
            IrType::int_array(),
            Rhs::NewArray {
                elem: IrType::Int32,
                size: Operand::Int(size),
            },
            out,
        ))
    }

    fn store_elements(
        &mut self,
        array: &Operand,
        elems: &[Expr],
        out: &mut Vec<Instr>,
    ) -> CompileResult<()> {
        for (i, elem) in (0_i32..).zip(elems) {
            let value = self.lower_into(elem, Some(&IrType::Int32), out)?;
            out.push(Instr::ArrayStore {
                array: array.clone(),
                index: Operand::Int(i),
                value,
            });
        }
        Ok(())
    }

    // ── Calls ──────────────────────────────────────────────────

    /// Lower a call expression to a [`Call`], leaving it unbound.
    ///
    /// The receiver is lowered first, then arguments left to right, each
    /// materialized before the call.
    pub(crate) fn lower_call(
        &mut self,
        expr: &Expr,
        expected: Option<&IrType>,
        out: &mut Vec<Instr>,
    ) -> CompileResult<Call> {
        let span = expr.span;
        let ExprKind::MethodCall {
            receiver,
            method,
            args,
        } = &expr.kind
        else {
            return Err(CompileError::unsupported("call lowering of a non-call", span));
        };

        let resolver = self.resolver();
        let resolved_ret = resolver.resolve(expr);
        let static_receiver = match &receiver.unparen().kind {
            ExprKind::Ident(name) if resolver.is_static_receiver(receiver) => Some(name.clone()),
            _ => None,
        };

        let (kind, target, own_class) = match static_receiver {
            Some(class) => {
                let own = class == self.method.class_name;
                (InvokeKind::Static, CallTarget::Class(class), own)
            }
            None => {
                let object = self.lower_into(receiver, None, out)?;
                let IrType::Class(class) = object.ty() else {
                    return Err(CompileError::malformed_call(
                        method.as_str(),
                        format!("receiver of type `{}` is not an object", object.ty()),
                        span,
                    ));
                };
                let own = class == self.method.class_name;
                (InvokeKind::Virtual, CallTarget::Instance(object), own)
            }
        };

        let callee = if own_class {
            self.symbols.method(method).cloned()
        } else {
            None
        };

        let args = match &callee {
            Some(sig) => self.lower_own_args(sig, args, span, out)?,
            None => {
                let mut operands = SmallVec::new();
                for arg in args {
                    operands.push(self.lower_into(arg, None, out)?);
                }
                operands
            }
        };

        let ret = match (&callee, expected) {
            (Some(sig), _) => ir_type(&sig.return_type, method, span)?,
            (None, Some(expected)) => expected.clone(),
            (None, None) => IrType::from_type(&resolved_ret).ok_or_else(|| {
                CompileError::unresolved_type(format!("return value of `{method}`"), span)
            })?,
        };

        trace!(method = %method, kind = kind.mnemonic(), ret = %ret, "lowered call");
        Ok(Call {
            kind,
            target,
            method: method.clone(),
            args,
            ret,
        })
    }

    /// Arguments for a method declared in this class. Trailing arguments of
    /// a vararg method are packed into a fresh `int[]` unless a single array
    /// is passed in that position.
    fn lower_own_args(
        &mut self,
        sig: &MethodSymbols,
        args: &[Expr],
        span: Span,
        out: &mut Vec<Instr>,
    ) -> CompileResult<SmallVec<[Operand; 4]>> {
        let param_types = sig
            .params
            .iter()
            .map(|p| ir_type(&p.ty, &p.name, span))
            .collect::<CompileResult<Vec<_>>>()?;

        let packs_varargs = sig.is_vararg()
            && !(args.len() == sig.params.len()
                && args
                    .last()
                    .is_some_and(|last| self.resolver().resolve(last).is_array));

        let fixed = if packs_varargs {
            sig.params.len() - 1
        } else {
            sig.params.len()
        };
        let arity_ok = if packs_varargs {
            args.len() >= fixed
        } else {
            args.len() == fixed
        };
        if !arity_ok {
            return Err(CompileError::malformed_call(
                sig.name.as_str(),
                format!("expected {} arguments, found {}", sig.params.len(), args.len()),
                span,
            ));
        }

        let mut operands = SmallVec::new();
        for (arg, ty) in args[..fixed].iter().zip(&param_types) {
            operands.push(self.lower_into(arg, Some(ty), out)?);
        }
        if packs_varargs {
            let rest = &args[fixed..];
            let array = self.new_int_array(rest.len(), span, out)?;
            self.store_elements(&array, rest, out)?;
            operands.push(array);
        }
        Ok(operands)
    }
}

pub(crate) fn element_type(array: &Operand, span: Span) -> CompileResult<IrType> {
    array.ty().element().cloned().ok_or_else(|| {
        CompileError::unresolved_type(format!("element of non-array `{array}`"), span)
    })
}
