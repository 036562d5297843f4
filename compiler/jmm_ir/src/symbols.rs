//! Read-only symbol table for one compilation unit.
//!
//! Exposes what the back end needs to know about the class being compiled:
//! its name, superclass, imports, fields, and for each method its return
//! type, parameters and locals. [`SymbolTable::collect`] builds one from an
//! already-validated [`Program`]; it performs no checking of its own.
//!
//! # Lookup precedence
//!
//! [`SymbolTable::resolve_var`] is the single place name resolution
//! happens. The order is always local, then parameter, then field.

use rustc_hash::FxHashMap;

use crate::{Program, Symbol, Type};

/// Per-method symbols.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodSymbols {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Symbol>,
    pub locals: Vec<Symbol>,
    pub is_static: bool,
}

impl MethodSymbols {
    fn local(&self, name: &str) -> Option<&Symbol> {
        self.locals.iter().find(|s| s.name == name)
    }

    fn param(&self, name: &str) -> Option<(usize, &Symbol)> {
        self.params.iter().enumerate().find(|(_, s)| s.name == name)
    }

    /// Whether the last parameter is a vararg.
    pub fn is_vararg(&self) -> bool {
        self.params.last().is_some_and(|p| p.ty.is_vararg)
    }
}

/// Where a resolved variable name lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarOrigin {
    Local,
    /// Zero-based parameter position.
    Param(usize),
    Field,
}

/// Symbol table for a single class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolTable {
    class_name: String,
    superclass: Option<String>,
    /// Dotted import paths, in declaration order.
    imports: Vec<String>,
    fields: Vec<Symbol>,
    /// Declaration order is preserved for deterministic output.
    methods: Vec<MethodSymbols>,
    method_index: FxHashMap<String, usize>,
}

impl SymbolTable {
    pub fn new(class_name: impl Into<String>, superclass: Option<String>) -> Self {
        SymbolTable {
            class_name: class_name.into(),
            superclass,
            ..SymbolTable::default()
        }
    }

    /// Build the table from a parsed program.
    pub fn collect(program: &Program) -> Self {
        let class = &program.class;
        let mut table = SymbolTable::new(class.name.clone(), class.superclass.clone());

        for import in &program.imports {
            table.add_import(&import.dotted());
        }
        for field in &class.fields {
            table.add_field(Symbol::new(field.name.clone(), field.ty.clone()));
        }
        for method in &class.methods {
            table.add_method(MethodSymbols {
                name: method.name.clone(),
                return_type: method.return_type.clone(),
                params: method
                    .params
                    .iter()
                    .map(|p| Symbol::new(p.name.clone(), p.ty.clone()))
                    .collect(),
                locals: method
                    .locals()
                    .into_iter()
                    .map(|l| Symbol::new(l.name.clone(), l.ty.clone()))
                    .collect(),
                is_static: method.is_static,
            });
        }
        table
    }

    pub fn add_import(&mut self, dotted: &str) {
        self.imports.push(dotted.to_owned());
    }

    pub fn add_field(&mut self, field: Symbol) {
        self.fields.push(field);
    }

    /// Register a method. A later method with the same name replaces the
    /// earlier one in lookups.
    pub fn add_method(&mut self, method: MethodSymbols) {
        self.method_index
            .insert(method.name.clone(), self.methods.len());
        self.methods.push(method);
    }

    // Queries

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn fields(&self) -> &[Symbol] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Symbol> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> &[MethodSymbols] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodSymbols> {
        self.method_index.get(name).map(|&i| &self.methods[i])
    }

    /// Declared return type of a method of this class.
    pub fn return_type(&self, method: &str) -> Option<&Type> {
        self.method(method).map(|m| &m.return_type)
    }

    /// Dotted import path whose last segment is `name`.
    pub fn import_path(&self, name: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|path| path.rsplit('.').next() == Some(name))
            .map(String::as_str)
    }

    /// Whether `name` is the simple name of an imported class.
    pub fn is_imported_class(&self, name: &str) -> bool {
        self.import_path(name).is_some()
    }

    /// Resolve a variable name inside `method`: local, then parameter, then
    /// field.
    pub fn resolve_var(&self, method: &str, name: &str) -> Option<(VarOrigin, &Type)> {
        if let Some(m) = self.method(method) {
            if let Some(local) = m.local(name) {
                return Some((VarOrigin::Local, &local.ty));
            }
            if let Some((index, param)) = m.param(name) {
                return Some((VarOrigin::Param(index), &param.ty));
            }
        }
        self.field(name).map(|f| (VarOrigin::Field, &f.ty))
    }
}
