//! Java-- back end pipeline.
//!
//! Runs both passes over a type-checked unit:
//!
//! ```text
//! Program + SymbolTable ──lower──▶ IrClass ──generate──▶ Jasmin text
//!                                     │
//!                                     └──Display──▶ IR text
//! ```
//!
//! Each unit gets its own [`LowerCtx`], so [`compile_units`] can process
//! independent units on the rayon pool.

use std::sync::Once;

use jmm_ir::{CompileResult, Program, SymbolTable};
use jmm_lower::LowerCtx;
use rayon::prelude::*;
use tracing::debug;

/// Output of compiling one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledUnit {
    pub class_name: String,
    /// Three-address IR text.
    pub ir: String,
    /// Jasmin assembly text.
    pub jasmin: String,
}

/// Lower one unit and generate its Jasmin text.
///
/// The first error aborts the unit; no partial output is returned.
pub fn compile_program(program: &Program, symbols: &SymbolTable) -> CompileResult<CompiledUnit> {
    let mut ctx = LowerCtx::new();
    let class = jmm_lower::lower_program_with(&mut ctx, program, symbols)?;
    let ir = class.to_string();
    let jasmin = jmm_jasmin::generate(&class)?;
    debug!(
        class = %class.name,
        ir_bytes = ir.len(),
        jasmin_bytes = jasmin.len(),
        "compiled unit"
    );
    Ok(CompiledUnit {
        class_name: class.name,
        ir,
        jasmin,
    })
}

/// Compile independent units in parallel. Results keep input order.
pub fn compile_units(units: &[(Program, SymbolTable)]) -> Vec<CompileResult<CompiledUnit>> {
    units
        .par_iter()
        .map(|(program, symbols)| compile_program(program, symbols))
        .collect()
}

static TRACING_INIT: Once = Once::new();

/// Install a stderr subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset or unparsable, or when the host
/// already installed a global subscriber. Only the first call has an effect.
///
/// - `RUST_LOG=jmm_lower=debug`: one event per lowered method and class.
/// - `RUST_LOG=jmm_jasmin=trace`: every selected instruction and skipped label.
/// - `RUST_LOG=jmm_compiler=debug`: IR and Jasmin sizes per unit.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let Ok(filter) = EnvFilter::try_from_default_env() else {
            return;
        };
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init();
    });
}

#[cfg(test)]
mod interp;
