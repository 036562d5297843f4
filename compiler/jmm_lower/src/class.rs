//! Method and class lowering.

use jmm_ir::{
    ClassDecl, CompileError, CompileResult, Instr, IrClass, IrField, IrMethod, IrParam, IrType,
    MethodDecl, Modifiers, Program, SymbolTable,
};
use tracing::debug;

use crate::expr::Lowerer;
use crate::scope::{ir_type, MethodCtx};
use crate::LowerCtx;

/// Lower a whole compilation unit with a fresh [`LowerCtx`].
pub fn lower_program(program: &Program, symbols: &SymbolTable) -> CompileResult<IrClass> {
    let mut ctx = LowerCtx::new();
    lower_program_with(&mut ctx, program, symbols)
}

/// Lower a compilation unit, drawing temporaries and labels from `ctx`.
///
/// The class is laid out as fields, declared methods in source order, then
/// the synthesized default constructor.
pub fn lower_program_with(
    ctx: &mut LowerCtx,
    program: &Program,
    symbols: &SymbolTable,
) -> CompileResult<IrClass> {
    let class = &program.class;

    let fields = symbols
        .fields()
        .iter()
        .map(|field| {
            Ok(IrField {
                name: field.name.clone(),
                ty: ir_type(&field.ty, &field.name, class.span)?,
                modifiers: Modifiers::PUBLIC,
            })
        })
        .collect::<CompileResult<Vec<_>>>()?;

    let mut methods = Vec::with_capacity(class.methods.len() + 1);
    for decl in &class.methods {
        methods.push(lower_method(ctx, symbols, class, decl)?);
    }
    methods.push(IrMethod::default_constructor(symbols.class_name()));

    debug!(
        class = %symbols.class_name(),
        methods = methods.len(),
        temps = ctx.temps_allocated(),
        "lowered class to IR"
    );

    Ok(IrClass {
        name: symbols.class_name().to_owned(),
        superclass: symbols.superclass().map(str::to_owned),
        imports: symbols.imports().to_vec(),
        fields,
        methods,
    })
}

fn lower_method(
    ctx: &mut LowerCtx,
    symbols: &SymbolTable,
    class: &ClassDecl,
    decl: &MethodDecl,
) -> CompileResult<IrMethod> {
    let sig = symbols.method(&decl.name).ok_or_else(|| {
        CompileError::unsupported(
            format!("method `{}` missing from the symbols of `{}`", decl.name, class.name),
            decl.span,
        )
    })?;

    let params = sig
        .params
        .iter()
        .map(|p| {
            Ok(IrParam {
                name: p.name.clone(),
                ty: ir_type(&p.ty, &p.name, decl.span)?,
            })
        })
        .collect::<CompileResult<Vec<_>>>()?;

    let mut lowerer = Lowerer {
        symbols,
        ctx,
        method: MethodCtx::new(symbols.class_name(), sig, decl.span)?,
    };
    let mut instrs = Vec::new();
    lowerer.lower_stmts(&decl.body, &mut instrs)?;

    let return_type = lowerer.method.return_type.clone();
    if return_type.is_void() && !matches!(instrs.last(), Some(Instr::Return { .. })) {
        instrs.push(Instr::Return {
            ty: IrType::Void,
            value: None,
        });
    }

    let mut modifiers = Modifiers::empty();
    if decl.is_public {
        modifiers |= Modifiers::PUBLIC;
    }
    if decl.is_static {
        modifiers |= Modifiers::STATIC;
    }

    debug!(method = %decl.name, instrs = instrs.len(), "lowered method");

    Ok(IrMethod {
        name: decl.name.clone(),
        modifiers,
        params,
        return_type,
        instrs,
        var_table: lowerer.method.into_var_table(),
        is_constructor: false,
    })
}
