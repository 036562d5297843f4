//! Three-address IR.
//!
//! The output of statement/expression lowering and the input of Jasmin
//! generation. A method is a flat, ordered list of [`Instr`]s with explicit
//! labels and jumps; every intermediate value lives in a named temporary.
//!
//! # Operand invariant
//!
//! [`Operand`] has no call variant. A call can only appear as the right
//! hand side of an [`Instr::Assign`] or as a bare [`Instr::Call`], so an
//! operand is always something a stack machine can push with one load.
//!
//! The textual OLLIR form lives in `text.rs` as `Display` impls.

mod text;

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{BinaryOp, Type};

/// IR-level type, rendered as an operand suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum IrType {
    Int32,
    Bool,
    Array(Box<IrType>),
    /// Class or imported type, by simple name.
    Class(String),
    Void,
}

impl IrType {
    pub fn int_array() -> Self {
        IrType::Array(Box::new(IrType::Int32))
    }

    /// Map a semantic type. Returns `None` for the undefined sentinel.
    pub fn from_type(ty: &Type) -> Option<Self> {
        if ty.is_undefined() {
            return None;
        }
        let base = match ty.name.as_str() {
            "int" => IrType::Int32,
            "boolean" => IrType::Bool,
            "void" => IrType::Void,
            other => IrType::Class(other.to_owned()),
        };
        Some(if ty.is_array {
            IrType::Array(Box::new(base))
        } else {
            base
        })
    }

    /// Element type; `None` for non-arrays.
    pub fn element(&self) -> Option<&IrType> {
        match self {
            IrType::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Whether values of this type are held as JVM ints (`int`, `boolean`).
    pub fn is_int_family(&self) -> bool {
        matches!(self, IrType::Int32 | IrType::Bool)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }
}

/// Value that can be pushed with a single load or constant instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    Int(i32),
    Bool(bool),
    Var { name: String, ty: IrType },
    /// The receiver of an instance method.
    This { class: String },
}

impl Operand {
    pub fn var(name: impl Into<String>, ty: IrType) -> Self {
        Operand::Var {
            name: name.into(),
            ty,
        }
    }

    pub fn ty(&self) -> IrType {
        match self {
            Operand::Int(_) => IrType::Int32,
            Operand::Bool(_) => IrType::Bool,
            Operand::Var { ty, .. } => ty.clone(),
            Operand::This { class } => IrType::Class(class.clone()),
        }
    }

    /// Variable name read by this operand, if any.
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Operand::Var { name, .. } => Some(name),
            Operand::Int(_) | Operand::Bool(_) | Operand::This { .. } => None,
        }
    }
}

/// Dispatch kind of a call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum InvokeKind {
    Static,
    Virtual,
    Special,
    Interface,
}

impl InvokeKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            InvokeKind::Static => "invokestatic",
            InvokeKind::Virtual => "invokevirtual",
            InvokeKind::Special => "invokespecial",
            InvokeKind::Interface => "invokeinterface",
        }
    }
}

/// Who receives a call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CallTarget {
    /// Static call on a class, by simple name.
    Class(String),
    /// Instance call; the operand is pushed as the receiver.
    Instance(Operand),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Call {
    pub kind: InvokeKind,
    pub target: CallTarget,
    pub method: String,
    pub args: SmallVec<[Operand; 4]>,
    pub ret: IrType,
}

impl Call {
    /// `invokespecial(obj, "<init>").V`
    pub fn init(object: Operand) -> Self {
        Call {
            kind: InvokeKind::Special,
            target: CallTarget::Instance(object),
            method: "<init>".to_owned(),
            args: SmallVec::new(),
            ret: IrType::Void,
        }
    }

    fn used_vars(&self, out: &mut Vec<String>) {
        if let CallTarget::Instance(receiver) = &self.target {
            push_var(receiver, out);
        }
        for arg in &self.args {
            push_var(arg, out);
        }
    }
}

/// Right hand side of an assignment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Rhs {
    Operand(Operand),
    Binary {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    Not(Operand),
    Call(Call),
    GetField {
        object: Operand,
        field: String,
        ty: IrType,
    },
    ArrayLoad {
        array: Operand,
        index: Operand,
    },
    ArrayLength(Operand),
    New(String),
    NewArray {
        elem: IrType,
        size: Operand,
    },
}

/// Guard of a conditional branch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Cond {
    /// Taken when the boolean operand is true.
    Bool(Operand),
    /// Relational compare-and-branch.
    Compare {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
}

/// Control-flow label.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Label(pub String);

impl Label {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Instr {
    /// `dest.ty :=.ty value;`
    Assign {
        dest: String,
        ty: IrType,
        value: Rhs,
    },
    ArrayStore {
        array: Operand,
        index: Operand,
        value: Operand,
    },
    PutField {
        object: Operand,
        field: String,
        value: Operand,
    },
    /// Call whose result, if any, is discarded.
    Call(Call),
    Branch {
        cond: Cond,
        target: Label,
    },
    Goto(Label),
    Label(Label),
    Return {
        ty: IrType,
        value: Option<Operand>,
    },
}

fn push_var(operand: &Operand, out: &mut Vec<String>) {
    if let Some(name) = operand.var_name() {
        out.push(name.to_owned());
    }
}

impl Instr {
    /// The label this instruction may jump to.
    pub fn jump_target(&self) -> Option<&Label> {
        match self {
            Instr::Branch { target, .. } | Instr::Goto(target) => Some(target),
            _ => None,
        }
    }

    /// All variables read by this instruction, in evaluation order.
    ///
    /// The destination of an assignment is a definition, not a use; the
    /// base of an array store is a use.
    pub fn used_vars(&self) -> Vec<String> {
        let mut out = Vec::new();
        match self {
            Instr::Assign { value, .. } => match value {
                Rhs::Operand(op) | Rhs::Not(op) | Rhs::ArrayLength(op) => push_var(op, &mut out),
                Rhs::Binary { lhs, rhs, .. } => {
                    push_var(lhs, &mut out);
                    push_var(rhs, &mut out);
                }
                Rhs::Call(call) => call.used_vars(&mut out),
                Rhs::GetField { object, .. } => push_var(object, &mut out),
                Rhs::ArrayLoad { array, index } => {
                    push_var(array, &mut out);
                    push_var(index, &mut out);
                }
                Rhs::NewArray { size, .. } => push_var(size, &mut out),
                Rhs::New(_) => {}
            },
            Instr::ArrayStore {
                array,
                index,
                value,
            } => {
                push_var(array, &mut out);
                push_var(index, &mut out);
                push_var(value, &mut out);
            }
            Instr::PutField { object, value, .. } => {
                push_var(object, &mut out);
                push_var(value, &mut out);
            }
            Instr::Call(call) => call.used_vars(&mut out),
            Instr::Branch { cond, .. } => match cond {
                Cond::Bool(op) => push_var(op, &mut out),
                Cond::Compare { lhs, rhs, .. } => {
                    push_var(lhs, &mut out);
                    push_var(rhs, &mut out);
                }
            },
            Instr::Return { value, .. } => {
                if let Some(value) = value {
                    push_var(value, &mut out);
                }
            }
            Instr::Goto(_) | Instr::Label(_) => {}
        }
        out
    }
}

/// Slot and type of a method-local name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct VarInfo {
    pub slot: u16,
    pub ty: IrType,
}

bitflags! {
    /// Access and storage modifiers on methods and fields.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct Modifiers: u8 {
        const PUBLIC = 1 << 0;
        const STATIC = 1 << 1;
    }
}

impl Modifiers {
    /// Space-separated keywords, each followed by a space.
    pub fn keywords(self) -> String {
        let mut out = String::new();
        if self.contains(Modifiers::PUBLIC) {
            out.push_str("public ");
        }
        if self.contains(Modifiers::STATIC) {
            out.push_str("static ");
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct IrParam {
    pub name: String,
    pub ty: IrType,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct IrField {
    pub name: String,
    pub ty: IrType,
    pub modifiers: Modifiers,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct IrMethod {
    pub name: String,
    pub modifiers: Modifiers,
    pub params: Vec<IrParam>,
    pub return_type: IrType,
    pub instrs: Vec<Instr>,
    /// Every name the body touches (params, locals, temporaries, and
    /// `this` for instance methods) mapped to its slot.
    pub var_table: FxHashMap<String, VarInfo>,
    pub is_constructor: bool,
}

impl IrMethod {
    /// `.construct C().V { invokespecial(this, "<init>").V; }`
    pub fn default_constructor(class: &str) -> Self {
        let this_ty = IrType::Class(class.to_owned());
        let mut var_table = FxHashMap::default();
        var_table.insert(
            "this".to_owned(),
            VarInfo {
                slot: 0,
                ty: this_ty,
            },
        );
        IrMethod {
            name: "<init>".to_owned(),
            modifiers: Modifiers::PUBLIC,
            params: Vec::new(),
            return_type: IrType::Void,
            instrs: vec![Instr::Call(Call::init(Operand::This {
                class: class.to_owned(),
            }))],
            var_table,
            is_constructor: true,
        }
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains(Modifiers::STATIC)
    }

    /// Number of local slots the frame needs: highest slot + 1.
    pub fn locals_limit(&self) -> u16 {
        self.var_table
            .values()
            .map(|info| info.slot + 1)
            .max()
            .unwrap_or(0)
    }

    /// Labels defined in the body, in order.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.instrs.iter().filter_map(|instr| match instr {
            Instr::Label(label) => Some(label),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct IrClass {
    pub name: String,
    pub superclass: Option<String>,
    /// Dotted import paths.
    pub imports: Vec<String>,
    pub fields: Vec<IrField>,
    pub methods: Vec<IrMethod>,
}

impl IrClass {
    pub fn has_constructor(&self) -> bool {
        self.methods.iter().any(|m| m.is_constructor)
    }

    pub fn method(&self, name: &str) -> Option<&IrMethod> {
        self.methods.iter().find(|m| m.name == name)
    }
}
