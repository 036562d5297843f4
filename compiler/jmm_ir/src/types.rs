//! Semantic types and symbols.
//!
//! A [`Type`] is the front end's view of a value: a base name (`int`,
//! `boolean`, `void`, `String` or a class name), an array flag, and a vararg
//! marker. The sentinel [`Type::undefined`] stands for "could not be
//! resolved"; consumers must turn it into an error rather than guess.

use std::fmt;

const INT: &str = "int";
const BOOLEAN: &str = "boolean";
const VOID: &str = "void";
const STRING: &str = "String";
const UNDEFINED: &str = "undefined";

/// Semantic type of a declaration or expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Type {
    /// Base name; for arrays this is the element name.
    pub name: String,
    pub is_array: bool,
    /// Set on a trailing `int...` parameter. Implies `is_array`.
    pub is_vararg: bool,
}

impl Type {
    /// A non-array type with the given base name.
    pub fn named(name: impl Into<String>) -> Self {
        Type {
            name: name.into(),
            is_array: false,
            is_vararg: false,
        }
    }

    pub fn int() -> Self {
        Self::named(INT)
    }

    pub fn boolean() -> Self {
        Self::named(BOOLEAN)
    }

    pub fn void() -> Self {
        Self::named(VOID)
    }

    pub fn string() -> Self {
        Self::named(STRING)
    }

    /// The "could not resolve" sentinel.
    pub fn undefined() -> Self {
        Self::named(UNDEFINED)
    }

    /// `int[]`.
    pub fn int_array() -> Self {
        Self::int().into_array()
    }

    /// `int...` (an `int[]` carrying the vararg marker).
    pub fn int_vararg() -> Self {
        Type {
            name: INT.to_owned(),
            is_array: true,
            is_vararg: true,
        }
    }

    /// The array type whose elements are `self`.
    #[must_use]
    pub fn into_array(self) -> Self {
        Type {
            is_array: true,
            ..self
        }
    }

    /// Element type of an array type (identity for non-arrays).
    #[must_use]
    pub fn element(&self) -> Self {
        Self::named(self.name.clone())
    }

    pub fn is_int(&self) -> bool {
        !self.is_array && self.name == INT
    }

    pub fn is_boolean(&self) -> bool {
        !self.is_array && self.name == BOOLEAN
    }

    pub fn is_void(&self) -> bool {
        !self.is_array && self.name == VOID
    }

    pub fn is_undefined(&self) -> bool {
        self.name == UNDEFINED
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.is_vararg {
            f.write_str("...")
        } else if self.is_array {
            f.write_str("[]")
        } else {
            Ok(())
        }
    }
}

/// A named, typed declaration: field, parameter or local.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Symbol {
            name: name.into(),
            ty,
        }
    }
}
