//! Java-- IR - shared data model for the compiler back end.
//!
//! This crate holds everything the two lowering stages agree on:
//! - Spans for source locations
//! - The type-checked AST (closed enums, produced upstream by the parser)
//! - Semantic [`Type`]s and [`Symbol`]s
//! - The read-only [`SymbolTable`] service (plus a collector that fills it
//!   from an AST)
//! - The three-address IR ([`IrClass`], [`IrMethod`], [`Instr`]) and its
//!   OLLIR-style text rendering
//! - The [`CompileError`] taxonomy shared by both passes
//!
//! # Data flow
//!
//! ```text
//! Program (AST) + SymbolTable
//!        ↓  jmm_lower
//!     IrClass
//!        ↓  jmm_jasmin
//!   Jasmin text
//! ```
//!
//! Nothing in here mutates after construction; every pass produces a fresh
//! value from the previous one.

pub mod ast;
mod error;
pub mod ir;
mod span;
mod stack;
mod symbols;
mod types;

pub use ast::{
    BinaryOp, ClassDecl, Expr, ExprKind, ImportDecl, MethodDecl, Program, Stmt, StmtKind, VarDecl,
};
pub use error::{CompileError, CompileResult};
pub use ir::{
    Call, CallTarget, Cond, Instr, InvokeKind, IrClass, IrField, IrMethod, IrParam, IrType, Label,
    Modifiers, Operand, Rhs, VarInfo,
};
pub use span::Span;
pub use stack::ensure_sufficient_stack;
pub use symbols::{MethodSymbols, SymbolTable, VarOrigin};
pub use types::{Symbol, Type};
