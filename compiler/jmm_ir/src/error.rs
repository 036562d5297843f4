//! Errors shared by IR lowering and Jasmin generation.
//!
//! Every failure is fatal for the compilation unit: callers propagate with
//! `?` and no partial output is returned.

use thiserror::Error;

use crate::Span;

/// Failure while lowering a compilation unit.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    /// A type needed for instruction or descriptor selection is undefined.
    #[error("cannot resolve type of {what}{}", at(*.span))]
    UnresolvedType { what: String, span: Option<Span> },

    /// No lowering rule exists for this construct.
    #[error("unsupported construct: {construct}{}", at(*.span))]
    UnsupportedConstruct {
        construct: String,
        span: Option<Span>,
    },

    /// A call that upstream analysis should have rejected.
    #[error("malformed invocation of `{method}`: {reason}{}", at(*.span))]
    MalformedInvocation {
        method: String,
        reason: String,
        span: Option<Span>,
    },

    /// A name found in no scope or var table.
    #[error("unknown variable `{name}`{}", at(*.span))]
    UnknownVariable { name: String, span: Option<Span> },
}

/// Result alias used across the back end.
pub type CompileResult<T> = Result<T, CompileError>;

fn at(span: Option<Span>) -> String {
    span.map(|s| format!(" at {s}")).unwrap_or_default()
}

impl CompileError {
    pub fn unresolved_type(what: impl Into<String>, span: Span) -> Self {
        CompileError::UnresolvedType {
            what: what.into(),
            span: span.located(),
        }
    }

    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        CompileError::UnsupportedConstruct {
            construct: construct.into(),
            span: span.located(),
        }
    }

    pub fn malformed_call(method: impl Into<String>, reason: impl Into<String>, span: Span) -> Self {
        CompileError::MalformedInvocation {
            method: method.into(),
            reason: reason.into(),
            span: span.located(),
        }
    }

    pub fn unknown_variable(name: impl Into<String>, span: Span) -> Self {
        CompileError::UnknownVariable {
            name: name.into(),
            span: span.located(),
        }
    }

    /// Source location, if the failing node carried one.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::UnresolvedType { span, .. }
            | CompileError::UnsupportedConstruct { span, .. }
            | CompileError::MalformedInvocation { span, .. }
            | CompileError::UnknownVariable { span, .. } => *span,
        }
    }
}
