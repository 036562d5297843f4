//! Type-checked Java-- syntax tree.
//!
//! Produced once by the upstream parser and semantic analysis; the back end
//! only reads it. Every node carries a [`Span`] so lowering errors can point
//! back at the source.
//!
//! Statement and expression kinds are closed enums: a lowering pass that
//! forgets a kind fails to compile instead of failing at run time.

use std::fmt;

use crate::{Span, Type};

/// `import a.b.C;`
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportDecl {
    /// Dotted path split on `.`; the last segment is the imported name.
    pub path: Vec<String>,
    pub span: Span,
}

impl ImportDecl {
    pub fn new(path: &str) -> Self {
        ImportDecl {
            path: path.split('.').map(str::to_owned).collect(),
            span: Span::DUMMY,
        }
    }

    /// The path re-joined with dots.
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// Field, parameter, or local variable declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

impl VarDecl {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        VarDecl {
            name: name.into(),
            ty,
            span: Span::DUMMY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodDecl {
    pub name: String,
    pub is_public: bool,
    pub is_static: bool,
    pub return_type: Type,
    pub params: Vec<VarDecl>,
    /// Body in source order. Local declarations appear as
    /// [`StmtKind::VarDecl`] and are skipped by lowering.
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl MethodDecl {
    /// A public instance method with an empty body.
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        MethodDecl {
            name: name.into(),
            is_public: true,
            is_static: false,
            return_type,
            params: Vec::new(),
            body: Vec::new(),
            span: Span::DUMMY,
        }
    }

    /// `public static void main(String[] args)` with the given body.
    pub fn main(body: Vec<Stmt>) -> Self {
        MethodDecl {
            is_static: true,
            params: vec![VarDecl::new("args", Type::string().into_array())],
            body,
            ..MethodDecl::new("main", Type::void())
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, ty: Type) -> Self {
        self.params.push(VarDecl::new(name, ty));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Vec<Stmt>) -> Self {
        self.body = body;
        self
    }

    /// Local declarations in the body, in source order (nested blocks
    /// included).
    pub fn locals(&self) -> Vec<&VarDecl> {
        fn walk<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a VarDecl>) {
            for stmt in stmts {
                match &stmt.kind {
                    StmtKind::VarDecl(decl) => out.push(decl),
                    StmtKind::Block(inner) => walk(inner, out),
                    StmtKind::If {
                        then_branch,
                        else_branch,
                        ..
                    } => {
                        walk(std::slice::from_ref(then_branch.as_ref()), out);
                        if let Some(else_branch) = else_branch {
                            walk(std::slice::from_ref(else_branch.as_ref()), out);
                        }
                    }
                    StmtKind::While { body, .. } => {
                        walk(std::slice::from_ref(body.as_ref()), out);
                    }
                    StmtKind::Assign { .. } | StmtKind::Expr(_) | StmtKind::Return(_) => {}
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.body, &mut out);
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

/// One compilation unit: imports plus a single class.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    pub imports: Vec<ImportDecl>,
    pub class: ClassDecl,
}

impl Program {
    /// A program with no imports, fields or methods.
    pub fn new(class_name: impl Into<String>) -> Self {
        Program {
            imports: Vec::new(),
            class: ClassDecl {
                name: class_name.into(),
                superclass: None,
                fields: Vec::new(),
                methods: Vec::new(),
                span: Span::DUMMY,
            },
        }
    }

    #[must_use]
    pub fn with_import(mut self, path: &str) -> Self {
        self.imports.push(ImportDecl::new(path));
        self
    }

    #[must_use]
    pub fn with_superclass(mut self, name: &str) -> Self {
        self.class.superclass = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, ty: Type) -> Self {
        self.class.fields.push(VarDecl::new(name, ty));
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.class.methods.push(method);
        self
    }
}

// Statements

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum StmtKind {
    /// Local declaration; contributes to the slot table only.
    VarDecl(VarDecl),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    /// `target = value;` where `target` is a name or `a[i]`.
    Assign {
        target: Expr,
        value: Expr,
    },
    /// Expression evaluated for its side effects.
    Expr(Expr),
    Return(Option<Expr>),
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Stmt {
            kind,
            span: Span::DUMMY,
        }
    }

    pub fn local(name: &str, ty: Type) -> Self {
        Self::new(StmtKind::VarDecl(VarDecl::new(name, ty)))
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Block(stmts))
    }

    pub fn if_else(cond: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
        Self::new(StmtKind::If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_loop(cond: Expr, body: Stmt) -> Self {
        Self::new(StmtKind::While {
            cond,
            body: Box::new(body),
        })
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::new(StmtKind::Assign { target, value })
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return(value))
    }
}

// Expressions

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    Int(i32),
    Bool(bool),
    /// Local, parameter, field, or imported class name.
    Ident(String),
    This,
    Paren(Box<Expr>),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Length(Box<Expr>),
    /// `new int[size]`; `elem` is the element type.
    NewArray {
        elem: Type,
        size: Box<Expr>,
    },
    NewObject(String),
    /// `[e1, e2, ...]`, always `int[]`.
    ArrayLiteral(Vec<Expr>),
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn int(value: i32) -> Self {
        Self::new(ExprKind::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value))
    }

    pub fn ident(name: &str) -> Self {
        Self::new(ExprKind::Ident(name.to_owned()))
    }

    pub fn this() -> Self {
        Self::new(ExprKind::This)
    }

    pub fn paren(inner: Expr) -> Self {
        Self::new(ExprKind::Paren(Box::new(inner)))
    }

    pub fn negate(inner: Expr) -> Self {
        Self::new(ExprKind::Not(Box::new(inner)))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn index(array: Expr, index: Expr) -> Self {
        Self::new(ExprKind::Index {
            array: Box::new(array),
            index: Box::new(index),
        })
    }

    pub fn length(array: Expr) -> Self {
        Self::new(ExprKind::Length(Box::new(array)))
    }

    pub fn new_int_array(size: Expr) -> Self {
        Self::new(ExprKind::NewArray {
            elem: Type::int(),
            size: Box::new(size),
        })
    }

    pub fn new_object(class: &str) -> Self {
        Self::new(ExprKind::NewObject(class.to_owned()))
    }

    pub fn array_literal(elems: Vec<Expr>) -> Self {
        Self::new(ExprKind::ArrayLiteral(elems))
    }

    pub fn call(receiver: Expr, method: &str, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::MethodCall {
            receiver: Box::new(receiver),
            method: method.to_owned(),
            args,
        })
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        let mut expr = self;
        while let ExprKind::Paren(inner) = &expr.kind {
            expr = inner;
        }
        expr
    }
}

/// Binary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    And,
    Or,
}

impl BinaryOp {
    /// Source/IR spelling of the operator.
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }

    /// Relational operators: only valid as branch guards at codegen.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::Eq
                | BinaryOp::NotEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}
