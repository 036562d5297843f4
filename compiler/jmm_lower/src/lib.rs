//! AST → three-address IR lowering for Java--.
//!
//! # Entry Point
//!
//! [`lower_program`] takes a type-checked [`Program`](jmm_ir::Program) and
//! its [`SymbolTable`](jmm_ir::SymbolTable) and produces an
//! [`IrClass`](jmm_ir::IrClass).
//!
//! # Architecture
//!
//! - [`LowerCtx`] (in `context.rs`): per-unit counters for `tmpN` names and
//!   control-flow labels.
//! - [`TypeResolver`] (in `types.rs`): semantic type of an expression.
//! - `MethodCtx` (in `scope.rs`): slot table of the method being lowered.
//! - `Lowerer` (in `expr.rs` and `stmt.rs`): walks one method body.
//! - `class.rs`: method signatures, the class shell and the default
//!   constructor.
//!
//! All mutable state is passed explicitly, so independent units can be
//! lowered in parallel with one `LowerCtx` each.

mod class;
mod context;
mod expr;
mod scope;
mod stmt;
mod types;

pub use class::{lower_program, lower_program_with};
pub use context::{LabelKind, LowerCtx};
pub use expr::ExprResult;
pub use types::TypeResolver;
