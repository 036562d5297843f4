//! OLLIR text rendering.
//!
//! ```text
//! import io;
//!
//! Simple {
//!     .field public count.i32;
//!
//!     .method public add(a.i32, b.i32).i32 {
//!         tmp0.i32 :=.i32 a.i32 +.i32 b.i32;
//!         ret.i32 tmp0.i32;
//!     }
//!
//!     .construct Simple().V {
//!         invokespecial(this, "<init>").V;
//!     }
//! }
//! ```

use std::fmt::{self, Display, Formatter};

use super::{
    Call, CallTarget, Cond, Instr, IrClass, IrField, IrMethod, IrParam, IrType, Label, Operand,
    Rhs,
};
use crate::BinaryOp;

impl Display for IrType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Int32 => f.write_str("i32"),
            IrType::Bool => f.write_str("bool"),
            IrType::Array(elem) => write!(f, "array.{elem}"),
            IrType::Class(name) => f.write_str(name),
            IrType::Void => f.write_str("V"),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(v) => write!(f, "{v}.i32"),
            Operand::Bool(v) => write!(f, "{}.bool", u8::from(*v)),
            Operand::Var { name, ty } => write!(f, "{name}.{ty}"),
            Operand::This { .. } => f.write_str("this"),
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operator result suffix: `+.i32`, `<.bool`.
fn op_type(op: BinaryOp) -> IrType {
    if op.is_arithmetic() {
        IrType::Int32
    } else {
        IrType::Bool
    }
}

impl Display for Call {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind.mnemonic())?;
        match &self.target {
            CallTarget::Class(name) => f.write_str(name)?,
            CallTarget::Instance(receiver) => write!(f, "{receiver}")?,
        }
        write!(f, ", \"{}\"", self.method)?;
        for arg in &self.args {
            write!(f, ", {arg}")?;
        }
        write!(f, ").{}", self.ret)
    }
}

impl Display for Rhs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Rhs::Operand(op) => write!(f, "{op}"),
            Rhs::Binary { op, lhs, rhs } => {
                write!(f, "{lhs} {}.{} {rhs}", op.as_symbol(), op_type(*op))
            }
            Rhs::Not(op) => write!(f, "!.bool {op}"),
            Rhs::Call(call) => write!(f, "{call}"),
            Rhs::GetField { object, field, ty } => {
                write!(f, "getfield({object}, {field}.{ty}).{ty}")
            }
            Rhs::ArrayLoad { array, index } => {
                let elem = array.ty().element().cloned().unwrap_or(IrType::Int32);
                match array {
                    Operand::Var { name, ty } => write!(f, "{name}.{ty}[{index}].{elem}"),
                    other => write!(f, "{other}[{index}].{elem}"),
                }
            }
            Rhs::ArrayLength(array) => write!(f, "arraylength({array}).i32"),
            Rhs::New(class) => write!(f, "new({class}).{class}"),
            Rhs::NewArray { elem, size } => write!(f, "new(array, {size}).array.{elem}"),
        }
    }
}

impl Display for Cond {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Cond::Bool(op) => write!(f, "{op}"),
            Cond::Compare { op, lhs, rhs } => {
                write!(f, "{lhs} {}.{} {rhs}", op.as_symbol(), op_type(*op))
            }
        }
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Assign { dest, ty, value } => write!(f, "{dest}.{ty} :=.{ty} {value};"),
            Instr::ArrayStore {
                array,
                index,
                value,
            } => {
                let elem = value.ty();
                write!(f, "{array}[{index}].{elem} :=.{elem} {value};")
            }
            Instr::PutField {
                object,
                field,
                value,
            } => write!(f, "putfield({object}, {field}.{}, {value}).V;", value.ty()),
            Instr::Call(call) => write!(f, "{call};"),
            Instr::Branch { cond, target } => write!(f, "if ({cond}) goto {target};"),
            Instr::Goto(target) => write!(f, "goto {target};"),
            Instr::Label(label) => write!(f, "{label}:"),
            Instr::Return { ty, value: Some(v) } => write!(f, "ret.{ty} {v};"),
            Instr::Return { ty, value: None } => write!(f, "ret.{ty};"),
        }
    }
}

impl Display for IrParam {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.ty)
    }
}

impl Display for IrField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, ".field {}{}.{};", self.modifiers.keywords(), self.name, self.ty)
    }
}

struct Params<'a>(&'a [IrParam]);

impl Display for Params<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, param) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        Ok(())
    }
}

impl IrMethod {
    fn write_text(&self, class: &str, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_constructor {
            writeln!(f, "    .construct {class}({}).V {{", Params(&self.params))?;
        } else {
            writeln!(
                f,
                "    .method {}{}({}).{} {{",
                self.modifiers.keywords(),
                self.name,
                Params(&self.params),
                self.return_type
            )?;
        }
        for instr in &self.instrs {
            match instr {
                Instr::Label(_) => writeln!(f, "    {instr}")?,
                _ => writeln!(f, "        {instr}")?,
            }
        }
        writeln!(f, "    }}")
    }
}

impl Display for IrClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for import in &self.imports {
            writeln!(f, "import {import};")?;
        }
        if !self.imports.is_empty() {
            writeln!(f)?;
        }

        match &self.superclass {
            Some(sup) => writeln!(f, "{} extends {sup} {{", self.name)?,
            None => writeln!(f, "{} {{", self.name)?,
        }
        for field in &self.fields {
            writeln!(f, "    {field}")?;
        }
        for method in &self.methods {
            writeln!(f)?;
            method.write_text(&self.name, f)?;
        }
        writeln!(f, "}}")
    }
}
