//! Expression type resolution.
//!
//! [`TypeResolver`] answers "what is the semantic type of this expression"
//! inside one method. It never fails: anything it cannot work out comes back
//! as [`Type::undefined`], and the caller decides whether that is fatal.

use jmm_ir::{ensure_sufficient_stack, Expr, ExprKind, SymbolTable, Type};

/// Resolves expression types against a symbol table, scoped to a method.
#[derive(Copy, Clone)]
pub struct TypeResolver<'a> {
    symbols: &'a SymbolTable,
    method: &'a str,
}

impl<'a> TypeResolver<'a> {
    pub fn new(symbols: &'a SymbolTable, method: &'a str) -> Self {
        TypeResolver { symbols, method }
    }

    pub fn resolve(&self, expr: &Expr) -> Type {
        ensure_sufficient_stack(|| self.resolve_inner(expr))
    }

    fn resolve_inner(&self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Int(_) | ExprKind::Length(_) => Type::int(),
            ExprKind::Bool(_) | ExprKind::Not(_) => Type::boolean(),
            ExprKind::Binary { op, .. } => {
                if op.is_arithmetic() {
                    Type::int()
                } else {
                    Type::boolean()
                }
            }
            ExprKind::Ident(name) => self.resolve_name(name),
            ExprKind::This => Type::named(self.symbols.class_name()),
            ExprKind::Paren(inner) => self.resolve(inner),
            ExprKind::Index { array, .. } => {
                let array = self.resolve(array);
                if array.is_array {
                    array.element()
                } else {
                    Type::undefined()
                }
            }
            ExprKind::NewArray { elem, .. } => elem.clone().into_array(),
            ExprKind::NewObject(class) => Type::named(class.as_str()),
            ExprKind::ArrayLiteral(_) => Type::int_array(),
            ExprKind::MethodCall {
                receiver, method, ..
            } => self.resolve_call(receiver, method),
        }
    }

    /// Local, parameter, field; then a class name used as a static receiver.
    pub fn resolve_name(&self, name: &str) -> Type {
        if let Some((_, ty)) = self.symbols.resolve_var(self.method, name) {
            return ty.clone();
        }
        if name == self.symbols.class_name() || self.symbols.is_imported_class(name) {
            return Type::named(name);
        }
        Type::undefined()
    }

    /// Declared return type for a method of this class; the receiver's own
    /// type when the receiver is imported; the superclass type for a method
    /// this class inherits; undefined otherwise.
    fn resolve_call(&self, receiver: &Expr, method: &str) -> Type {
        let receiver = self.resolve(receiver);
        if receiver.is_array {
            return Type::undefined();
        }
        if receiver.name == self.symbols.class_name() {
            return match (self.symbols.return_type(method), self.symbols.superclass()) {
                (Some(declared), _) => declared.clone(),
                // Inherited: typed like a call on an imported receiver.
                (None, Some(superclass)) => Type::named(superclass),
                (None, None) => Type::undefined(),
            };
        }
        if self.symbols.is_imported_class(&receiver.name) {
            return receiver;
        }
        Type::undefined()
    }

    /// Whether `receiver` names a class rather than a value.
    pub fn is_static_receiver(&self, receiver: &Expr) -> bool {
        match &receiver.unparen().kind {
            ExprKind::Ident(name) => {
                self.symbols.resolve_var(self.method, name).is_none()
                    && (name == self.symbols.class_name()
                        || self.symbols.is_imported_class(name))
            }
            _ => false,
        }
    }
}
