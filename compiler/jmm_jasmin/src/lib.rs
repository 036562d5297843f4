//! Jasmin assembly generation for Java-- classes.
//!
//! [`generate`] turns one [`IrClass`] into the text of a `.j` file:
//!
//! ```text
//! .class public Main
//! .super java/lang/Object
//!
//! .field public count I
//!
//! .method public add(II)I
//!     .limit stack 2
//!     .limit locals 4
//!     iload_1
//!     ...
//! .end method
//! ```
//!
//! - `descriptor.rs`: class paths and JVM type descriptors.
//! - `uses.rs`: per-method read counts, used to drop dead call results.
//! - `emitter.rs`: instruction buffer with stack-depth accounting.
//! - `method.rs`: instruction selection.

mod descriptor;
mod emitter;
mod method;
mod uses;

use std::fmt::Write as _;

use jmm_ir::{CompileResult, IrClass, IrMethod};
use tracing::debug;

pub use descriptor::Descriptors;

use method::MethodGen;

/// Generate Jasmin text for a lowered class.
///
/// A public no-argument constructor chaining to the superclass is emitted
/// when the class does not declare one.
pub fn generate(class: &IrClass) -> CompileResult<String> {
    let desc = Descriptors::new(class);
    let mut out = String::with_capacity(4096);

    let _ = writeln!(out, ".class public {}", class.name);
    let _ = writeln!(out, ".super {}", desc.super_path()?);

    if !class.fields.is_empty() {
        out.push('\n');
    }
    for field in &class.fields {
        let _ = writeln!(
            out,
            ".field {}{} {}",
            field.modifiers.keywords(),
            field.name,
            desc.type_desc(&field.ty)?
        );
    }

    for method in &class.methods {
        out.push('\n');
        out.push_str(&MethodGen::new(class, &desc, method).generate()?);
    }

    if !class.has_constructor() {
        let ctor = IrMethod::default_constructor(&class.name);
        out.push('\n');
        out.push_str(&MethodGen::new(class, &desc, &ctor).generate()?);
    }

    debug!(class = %class.name, bytes = out.len(), "generated jasmin");
    Ok(out)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for concise assertions")]
mod tests;
