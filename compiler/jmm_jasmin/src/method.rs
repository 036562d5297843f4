//! Instruction selection for one method body.
//!
//! Each IR instruction starts and ends with an empty operand stack, so a
//! single linear pass gives the exact maximum depth even across branches.

use std::fmt::Write as _;

use jmm_ir::{
    BinaryOp, Call, CallTarget, CompileError, CompileResult, Cond, Instr, InvokeKind, IrClass,
    IrMethod, IrType, Label, Operand, Rhs, Span, VarInfo,
};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::descriptor::Descriptors;
use crate::emitter::Emitter;
use crate::uses::UseCounts;

pub(crate) struct MethodGen<'a> {
    class: &'a IrClass,
    desc: &'a Descriptors<'a>,
    method: &'a IrMethod,
    uses: UseCounts,
    code: Emitter,
}

impl<'a> MethodGen<'a> {
    pub(crate) fn new(class: &'a IrClass, desc: &'a Descriptors<'a>, method: &'a IrMethod) -> Self {
        MethodGen {
            class,
            desc,
            method,
            uses: UseCounts::of(method),
            code: Emitter::new(),
        }
    }

    /// Full `.method ... .end method` block.
    pub(crate) fn generate(mut self) -> CompileResult<String> {
        let method = self.method;
        self.check_jump_targets()?;

        // Whether control can fall past the last emitted instruction.
        let mut falls_through = true;
        let mut instrs = method.instrs.iter().peekable();
        while let Some(instr) = instrs.next() {
            if let Instr::Label(label) = instr {
                if !self.uses.is_jump_target(label) {
                    trace!(%label, "skip unreferenced label");
                    continue;
                }
            }
            falls_through = !matches!(instr, Instr::Return { .. } | Instr::Goto(_));
            // `tmp := new(C)` followed by `invokespecial(tmp, "<init>")`
            if let (
                Instr::Assign {
                    dest,
                    value: Rhs::New(class),
                    ..
                },
                Some(Instr::Call(init)),
            ) = (instr, instrs.peek())
            {
                if is_init_of(init, dest) {
                    self.construct(dest, class)?;
                    instrs.next();
                    continue;
                }
            }
            self.instr(instr)?;
            debug_assert_eq!(self.code.depth(), 0, "unbalanced stack after {instr}");
        }
        if falls_through {
            if !method.return_type.is_void() {
                return Err(CompileError::unsupported(
                    format!("control reaches the end of non-void method `{}`", method.name),
                    Span::DUMMY,
                ));
            }
            self.code.op("return", 0, 0);
        }

        let descriptor = self
            .desc
            .method_desc(self.method.params.iter().map(|p| &p.ty), &self.method.return_type)?;
        let stack = self.code.max_depth();
        let locals = self.method.locals_limit();
        debug!(method = %self.method.name, stack, locals, "generated method");

        let mut out = String::with_capacity(256);
        let _ = writeln!(
            out,
            ".method {}{}{descriptor}",
            self.method.modifiers.keywords(),
            self.method.name
        );
        let _ = writeln!(out, "    .limit stack {stack}");
        let _ = writeln!(out, "    .limit locals {locals}");
        out.push_str(&self.code.take_output());
        out.push_str(".end method\n");
        Ok(out)
    }

    fn check_jump_targets(&self) -> CompileResult<()> {
        let defined: FxHashSet<&Label> = self.method.labels().collect();
        match self
            .method
            .instrs
            .iter()
            .filter_map(Instr::jump_target)
            .find(|target| !defined.contains(target))
        {
            Some(missing) => Err(CompileError::unsupported(
                format!("jump to undefined label `{missing}` in `{}`", self.method.name),
                Span::DUMMY,
            )),
            None => Ok(()),
        }
    }

    // ── Instructions ────────────────────────────────────────────────

    fn instr(&mut self, instr: &Instr) -> CompileResult<()> {
        trace!(%instr, "select");
        match instr {
            Instr::Assign { dest, value, .. } => {
                if let Rhs::Call(call) = value {
                    if self.uses.is_dead(dest) {
                        return self.call_discarding(call);
                    }
                }
                self.rhs(value)?;
                self.store(dest)
            }
            Instr::ArrayStore {
                array,
                index,
                value,
            } => {
                let elem = array_element(array)?;
                self.load(array)?;
                self.load(index)?;
                self.load(value)?;
                self.code.op(&format!("{}astore", array_prefix(&elem)), 3, 0);
                Ok(())
            }
            Instr::PutField {
                object,
                field,
                value,
            } => {
                let field_ref = self.field_ref(object, field, &value.ty())?;
                self.load(object)?;
                self.load(value)?;
                self.code.op_with("putfield", field_ref, 2, 0);
                Ok(())
            }
            Instr::Call(call) => self.call_discarding(call),
            Instr::Branch { cond, target } => self.branch(cond, target),
            Instr::Goto(target) => {
                self.code.op_with("goto", target, 0, 0);
                Ok(())
            }
            Instr::Label(label) => {
                self.code.label(label.as_str());
                Ok(())
            }
            Instr::Return { ty, value } => {
                match value {
                    Some(value) => {
                        self.load(value)?;
                        let op = if ty.is_int_family() { "ireturn" } else { "areturn" };
                        self.code.op(op, 1, 0);
                    }
                    None => self.code.op("return", 0, 0),
                }
                Ok(())
            }
        }
    }

    /// `new C; dup; invokespecial C/<init>()V; astore dest`
    fn construct(&mut self, dest: &str, class: &str) -> CompileResult<()> {
        let path = self.desc.class_path(class)?;
        self.code.op_with("new", &path, 0, 1);
        self.code.op("dup", 1, 2);
        self.code
            .op_with("invokespecial", format!("{path}/<init>()V"), 1, 0);
        self.store(dest)
    }

    fn rhs(&mut self, rhs: &Rhs) -> CompileResult<()> {
        match rhs {
            Rhs::Operand(op) => self.load(op),
            Rhs::Binary { op, lhs, rhs } => {
                let mnemonic = arith_mnemonic(*op)?;
                self.load(lhs)?;
                self.load(rhs)?;
                self.code.op(mnemonic, 2, 1);
                Ok(())
            }
            Rhs::Not(op) => {
                self.load(op)?;
                self.code.op("iconst_1", 0, 1);
                self.code.op("ixor", 2, 1);
                Ok(())
            }
            Rhs::Call(call) => {
                if call.ret.is_void() {
                    return Err(CompileError::unsupported(
                        format!("void call `{}` used as a value", call.method),
                        Span::DUMMY,
                    ));
                }
                self.call(call)
            }
            Rhs::GetField { object, field, ty } => {
                let field_ref = self.field_ref(object, field, ty)?;
                self.load(object)?;
                self.code.op_with("getfield", field_ref, 1, 1);
                Ok(())
            }
            Rhs::ArrayLoad { array, index } => {
                let elem = array_element(array)?;
                self.load(array)?;
                self.load(index)?;
                self.code.op(&format!("{}aload", array_prefix(&elem)), 2, 1);
                Ok(())
            }
            Rhs::ArrayLength(array) => {
                self.load(array)?;
                self.code.op("arraylength", 1, 1);
                Ok(())
            }
            Rhs::New(class) => {
                let path = self.desc.class_path(class)?;
                self.code.op_with("new", path, 0, 1);
                Ok(())
            }
            Rhs::NewArray { elem, size } => {
                self.load(size)?;
                match elem {
                    IrType::Int32 => self.code.op_with("newarray", "int", 1, 1),
                    IrType::Bool => self.code.op_with("newarray", "boolean", 1, 1),
                    IrType::Class(name) => {
                        let path = self.desc.class_path(name)?;
                        self.code.op_with("anewarray", path, 1, 1);
                    }
                    IrType::Array(_) => {
                        let desc = self.desc.type_desc(elem)?;
                        self.code.op_with("anewarray", desc, 1, 1);
                    }
                    IrType::Void => {
                        return Err(CompileError::unsupported("array of void", Span::DUMMY));
                    }
                }
                Ok(())
            }
        }
    }

    fn branch(&mut self, cond: &Cond, target: &Label) -> CompileResult<()> {
        match cond {
            Cond::Bool(op) => {
                self.load(op)?;
                self.code.op_with("ifne", target, 1, 0);
            }
            Cond::Compare { op, lhs, rhs } => {
                let references = !lhs.ty().is_int_family() || !rhs.ty().is_int_family();
                let mnemonic = compare_mnemonic(*op, references)?;
                self.load(lhs)?;
                self.load(rhs)?;
                self.code.op_with(mnemonic, target, 2, 0);
            }
        }
        Ok(())
    }

    // ── Calls ───────────────────────────────────────────────────────

    /// Emit a call whose result, if any, is dropped.
    fn call_discarding(&mut self, call: &Call) -> CompileResult<()> {
        self.call(call)?;
        if !call.ret.is_void() {
            self.code.op("pop", 1, 0);
        }
        Ok(())
    }

    fn call(&mut self, call: &Call) -> CompileResult<()> {
        let owner = match &call.target {
            CallTarget::Class(name) => self.desc.class_path(name)?,
            CallTarget::Instance(receiver) => {
                let owner = self.receiver_owner(call, receiver)?;
                self.load(receiver)?;
                owner
            }
        };
        for arg in &call.args {
            self.load(arg)?;
        }

        let declared = match &call.target {
            CallTarget::Class(name) | CallTarget::Instance(Operand::This { class: name })
                if *name == self.class.name =>
            {
                self.class.method(&call.method)
            }
            CallTarget::Instance(Operand::Var {
                ty: IrType::Class(name),
                ..
            }) if *name == self.class.name => self.class.method(&call.method),
            _ => None,
        };
        let descriptor = match declared {
            Some(callee) if callee.params.len() == call.args.len() => self
                .desc
                .method_desc(callee.params.iter().map(|p| &p.ty), &call.ret)?,
            _ => {
                let args: Vec<IrType> = call.args.iter().map(Operand::ty).collect();
                self.desc.method_desc(&args, &call.ret)?
            }
        };

        let receiver = u16::from(matches!(call.target, CallTarget::Instance(_)));
        let argc = u16::try_from(call.args.len()).map_err(|_| {
            CompileError::malformed_call(&call.method, "too many arguments", Span::DUMMY)
        })?;
        let pushes = u16::from(!call.ret.is_void());

        let mut text = format!("{owner}/{}{descriptor}", call.method);
        if call.kind == InvokeKind::Interface {
            let _ = write!(text, " {}", argc + 1);
        }
        self.code
            .op_with(call.kind.mnemonic(), text, argc + receiver, pushes);
        Ok(())
    }

    fn receiver_owner(&self, call: &Call, receiver: &Operand) -> CompileResult<String> {
        if call.kind == InvokeKind::Special
            && call.method == "<init>"
            && self.method.is_constructor
            && matches!(receiver, Operand::This { .. })
        {
            return self.desc.super_path();
        }
        match receiver.ty() {
            IrType::Class(name) => self.desc.class_path(&name),
            other => Err(CompileError::malformed_call(
                &call.method,
                format!("receiver of type {other} is not an object"),
                Span::DUMMY,
            )),
        }
    }

    /// `Owner/field Desc`, taking the declared type for own fields.
    fn field_ref(&self, object: &Operand, field: &str, fallback: &IrType) -> CompileResult<String> {
        let IrType::Class(owner) = object.ty() else {
            return Err(CompileError::unsupported(
                format!("field `{field}` accessed on a non-object"),
                Span::DUMMY,
            ));
        };
        let ty = if owner == self.class.name {
            self.class
                .fields
                .iter()
                .find(|f| f.name == field)
                .map_or(fallback, |f| &f.ty)
        } else {
            fallback
        };
        Ok(format!(
            "{}/{field} {}",
            self.desc.class_path(&owner)?,
            self.desc.type_desc(ty)?
        ))
    }

    // ── Loads and stores ────────────────────────────────────────────

    fn load(&mut self, op: &Operand) -> CompileResult<()> {
        match op {
            Operand::Int(value) => self.push_int(*value),
            Operand::Bool(value) => {
                self.code.op(if *value { "iconst_1" } else { "iconst_0" }, 0, 1);
            }
            Operand::This { .. } => {
                if self.method.is_static() {
                    return Err(CompileError::unsupported(
                        format!("`this` in static method `{}`", self.method.name),
                        Span::DUMMY,
                    ));
                }
                self.code.op("aload_0", 0, 1);
            }
            Operand::Var { name, .. } => {
                let info = self.var(name)?;
                let (slot, prefix) = (info.slot, type_prefix(&info.ty));
                self.local_op(prefix, "load", slot, 0, 1);
            }
        }
        Ok(())
    }

    fn store(&mut self, dest: &str) -> CompileResult<()> {
        let info = self.var(dest)?;
        let (slot, prefix) = (info.slot, type_prefix(&info.ty));
        self.local_op(prefix, "store", slot, 1, 0);
        Ok(())
    }

    /// `iload_2`, `astore 7`: slots 0-3 use the short form.
    fn local_op(&mut self, prefix: &str, action: &str, slot: u16, pops: u16, pushes: u16) {
        if slot <= 3 {
            self.code
                .op(&format!("{prefix}{action}_{slot}"), pops, pushes);
        } else {
            self.code
                .op_with(&format!("{prefix}{action}"), slot, pops, pushes);
        }
    }

    fn push_int(&mut self, value: i32) {
        match value {
            -1 => self.code.op("iconst_m1", 0, 1),
            0..=5 => self.code.op(&format!("iconst_{value}"), 0, 1),
            -128..=127 => self.code.op_with("bipush", value, 0, 1),
            -32768..=32767 => self.code.op_with("sipush", value, 0, 1),
            _ => self.code.op_with("ldc", value, 0, 1),
        }
    }

    fn var(&self, name: &str) -> CompileResult<&'a VarInfo> {
        self.method
            .var_table
            .get(name)
            .ok_or_else(|| CompileError::unknown_variable(name, Span::DUMMY))
    }
}

// ── Selection tables ────────────────────────────────────────────────

fn is_init_of(call: &Call, dest: &str) -> bool {
    call.kind == InvokeKind::Special
        && call.method == "<init>"
        && call.args.is_empty()
        && matches!(&call.target, CallTarget::Instance(recv) if recv.var_name() == Some(dest))
}

fn type_prefix(ty: &IrType) -> &'static str {
    if ty.is_int_family() {
        "i"
    } else {
        "a"
    }
}

fn array_prefix(elem: &IrType) -> &'static str {
    match elem {
        IrType::Int32 => "i",
        IrType::Bool => "b",
        IrType::Array(_) | IrType::Class(_) | IrType::Void => "a",
    }
}

fn array_element(array: &Operand) -> CompileResult<IrType> {
    array.ty().element().cloned().ok_or_else(|| {
        CompileError::unsupported(
            format!("indexing non-array operand {array}"),
            Span::DUMMY,
        )
    })
}

fn arith_mnemonic(op: BinaryOp) -> CompileResult<&'static str> {
    Ok(match op {
        BinaryOp::Add => "iadd",
        BinaryOp::Sub => "isub",
        BinaryOp::Mul => "imul",
        BinaryOp::Div => "idiv",
        BinaryOp::And => "iand",
        BinaryOp::Or => "ior",
        BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq
        | BinaryOp::Eq
        | BinaryOp::NotEq => {
            return Err(CompileError::unsupported(
                format!("relational `{op}` as a value outside a branch"),
                Span::DUMMY,
            ));
        }
    })
}

fn compare_mnemonic(op: BinaryOp, references: bool) -> CompileResult<&'static str> {
    Ok(match (op, references) {
        (BinaryOp::Eq, true) => "if_acmpeq",
        (BinaryOp::NotEq, true) => "if_acmpne",
        (BinaryOp::Eq, false) => "if_icmpeq",
        (BinaryOp::NotEq, false) => "if_icmpne",
        (BinaryOp::Lt, false) => "if_icmplt",
        (BinaryOp::LtEq, false) => "if_icmple",
        (BinaryOp::Gt, false) => "if_icmpgt",
        (BinaryOp::GtEq, false) => "if_icmpge",
        _ => {
            return Err(CompileError::unsupported(
                format!("`{op}` as a branch condition"),
                Span::DUMMY,
            ));
        }
    })
}
