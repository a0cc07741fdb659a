// ABOUTME: User function definition and call lowering

use std::rc::Rc;

use inkwell::types::BasicMetadataTypeEnum;
use inkwell::AddressSpace;

use super::{Engine, EnvRc, Lowered};
use crate::ast::{Ast, Lambda};
use crate::env::{EnvEntry, Environment};
use crate::error::{CompileError, Diagnostic};
use crate::ir::arithmetic::{coerce_value, ir_emission, llvm_type};
use crate::ir::lower::lower_expr;
use crate::token::Pos;
use crate::types::{ParamType, Type};

fn unknown_type(pos: Pos, name: &str) -> CompileError {
    CompileError::UnknownType(Diagnostic::new(pos, None, format!("unknown type '{name}'"), None))
}

fn resolve_annotation(type_name: Option<&str>, pos: Pos) -> Result<Type, CompileError> {
    match type_name {
        Some(name) => Type::from_annotation_name(name).ok_or_else(|| unknown_type(pos, name)),
        None => Ok(Type::Float),
    }
}

fn fn_type_for<'ctx>(
    engine: &Engine<'ctx>,
    return_type: &Type,
    params: &[BasicMetadataTypeEnum<'ctx>],
) -> inkwell::types::FunctionType<'ctx> {
    match return_type {
        Type::Float => engine.context.f64_type().fn_type(params, false),
        Type::Char => engine.context.i8_type().fn_type(params, false),
        Type::String => engine.context.ptr_type(AddressSpace::default()).fn_type(params, false),
        _ => engine.context.i64_type().fn_type(params, false),
    }
}

/// Materialises a function for a `define`d lambda, lowers its body under a
/// fresh child frame, and only then inserts the function into the enclosing
/// environment (§4.5 step 6 — self-recursive calls are not resolvable,
/// matching the source's own behaviour).
pub fn lower_function_definition<'ctx>(
    engine: &Engine<'ctx>,
    env: &EnvRc<'ctx>,
    name: &str,
    lambda: &Lambda,
    pos: Pos,
) -> Result<(), CompileError> {
    let mut param_types = Vec::with_capacity(lambda.signature.params.len());
    for param in &lambda.signature.params {
        param_types.push(resolve_annotation(param.type_name.as_deref(), param.span.start)?);
    }
    let return_type = resolve_annotation(lambda.signature.return_type.as_deref(), pos)?;

    let llvm_param_types: Vec<BasicMetadataTypeEnum> = param_types
        .iter()
        .map(|t| llvm_type(engine, t).into())
        .collect();
    let fn_type = fn_type_for(engine, &return_type, &llvm_param_types);
    let function = engine.module.add_function(name, fn_type, None);

    let saved_block = engine.builder.get_insert_block();
    let result = lower_function_body(engine, env, &function, lambda, &param_types, &return_type, pos);
    if let Some(block) = saved_block {
        engine.builder.position_at_end(block);
    }
    result?;

    let params_desc: Vec<ParamType> = lambda
        .signature
        .params
        .iter()
        .zip(param_types.iter())
        .map(|(p, t)| ParamType::required(p.name.clone(), t.clone()))
        .collect();
    env.insert_function(name, params_desc, return_type, function, lambda.docstring.clone());
    Ok(())
}

fn lower_function_body<'ctx>(
    engine: &Engine<'ctx>,
    env: &EnvRc<'ctx>,
    function: &inkwell::values::FunctionValue<'ctx>,
    lambda: &Lambda,
    param_types: &[Type],
    return_type: &Type,
    pos: Pos,
) -> Result<(), CompileError> {
    let entry = engine.context.append_basic_block(*function, "entry");
    engine.builder.position_at_end(entry);

    let body_env = Environment::with_parent(Rc::clone(env));
    for (i, (param, ty)) in lambda.signature.params.iter().zip(param_types.iter()).enumerate() {
        let arg_value = function
            .get_nth_param(i as u32)
            .expect("parameter count matches the materialised signature");
        let alloca = engine
            .builder
            .build_alloca(llvm_type(engine, ty), &param.name)
            .map_err(ir_emission(param.span.start))?;
        engine
            .builder
            .build_store(alloca, arg_value)
            .map_err(ir_emission(param.span.start))?;
        body_env.insert_variable(param.name.clone(), ty.clone(), alloca);
    }

    let lowered_body = lower_expr(engine, &body_env, &lambda.body)?;
    let coerced = coerce_value(engine, lowered_body.value, &lowered_body.ty, return_type, pos)?;
    engine.builder.build_return(Some(&coerced)).map_err(ir_emission(pos))?;
    Ok(())
}

/// Resolves `name` to a user function and calls it, coercing each actual
/// argument to its formal's declared type (§4.5 — same rules as `define`).
pub fn lower_call<'ctx>(
    engine: &Engine<'ctx>,
    env: &EnvRc<'ctx>,
    name: &str,
    args: &[Ast],
    pos: Pos,
) -> Result<Lowered<'ctx>, CompileError> {
    let entry = env.lookup(name).ok_or_else(|| {
        CompileError::UnknownFunction(Diagnostic::new(pos, None, format!("unknown function '{name}'"), None))
    })?;
    let func_entry = match entry {
        EnvEntry::Function { entry, .. } => entry,
        EnvEntry::Variable(_) => {
            return Err(CompileError::NotCallable(Diagnostic::new(
                pos,
                None,
                format!("'{name}' is a variable, not a function"),
                None,
            )))
        }
        EnvEntry::Builtin { .. } => {
            return Err(CompileError::NotCallable(Diagnostic::new(
                pos,
                None,
                format!("'{name}' is a builtin used in an unsupported position"),
                None,
            )))
        }
    };

    if args.len() != func_entry.params.len() {
        return Err(CompileError::ArityMismatch(Diagnostic::new(
            pos,
            None,
            format!(
                "'{name}' expects {} argument(s), got {}",
                func_entry.params.len(),
                args.len()
            ),
            None,
        )));
    }

    let mut llvm_args = Vec::with_capacity(args.len());
    for (arg_ast, param) in args.iter().zip(func_entry.params.iter()) {
        let lowered = lower_expr(engine, env, arg_ast)?;
        let param_ty = param.ty.clone().unwrap_or(Type::Float);
        let coerced = coerce_value(engine, lowered.value, &lowered.ty, &param_ty, pos)?;
        llvm_args.push(coerced.into());
    }

    let call_site = engine
        .builder
        .build_call(func_entry.handle, &llvm_args, "call")
        .map_err(ir_emission(pos))?;
    let ret_val = call_site.try_as_basic_value().left().ok_or_else(|| {
        CompileError::IrEmission(Diagnostic::new(pos, None, "function call produced no value".to_string(), None))
    })?;
    Ok(Lowered::new(func_entry.return_type.clone(), ret_val))
}
