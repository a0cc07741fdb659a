// ABOUTME: The `show` special form and the structural printer backing `quote` in expression position

use inkwell::module::Linkage;
use inkwell::values::PointerValue;

use super::{Engine, EnvRc, Lowered};
use crate::ast::{Ast, AstKind};
use crate::error::CompileError;
use crate::ir::arithmetic::ir_emission;
use crate::ir::lower::lower_expr;
use crate::token::Pos;
use crate::types::Type;

/// Renders a quoted AST node exactly as the reader would need to re-read it:
/// numbers keep their original lexeme, strings/chars keep their delimiters,
/// lists are space-separated and parenthesised.
pub fn ast_print(node: &Ast) -> String {
    match &node.kind {
        AstKind::Number { lexeme, .. } => lexeme.clone(),
        AstKind::Symbol(s) => s.clone(),
        AstKind::String(s) => format!("\"{s}\""),
        AstKind::Char(b) => format!("'{}'", *b as char),
        AstKind::List(items) => {
            let inner = items.iter().map(ast_print).collect::<Vec<_>>().join(" ");
            format!("({inner})")
        }
        AstKind::Lambda(_) => "#<lambda>".to_string(),
    }
}

pub fn add_string_constant<'ctx>(engine: &Engine<'ctx>, text: &str) -> PointerValue<'ctx> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    let const_str = engine.context.const_string(&bytes, false);
    let global = engine.module.add_global(const_str.get_type(), None, "str");
    global.set_initializer(&const_str);
    global.set_constant(true);
    global.set_linkage(Linkage::Private);
    global.as_pointer_value()
}

fn print_literal_line<'ctx>(engine: &Engine<'ctx>, text: &str, pos: Pos) -> Result<(), CompileError> {
    let ptr = add_string_constant(engine, text);
    let fmt = engine.format_ptr("%s\n");
    engine
        .builder
        .build_call(engine.printf(), &[fmt.into(), ptr.into()], "print_str")
        .map_err(ir_emission(pos))?;
    Ok(())
}

fn print_char_line<'ctx>(engine: &Engine<'ctx>, byte: u8, pos: Pos) -> Result<(), CompileError> {
    let fmt = engine.format_ptr("%c\n");
    let value = engine.context.i8_type().const_int(byte as u64, false);
    let promoted = engine
        .builder
        .build_int_s_extend(value, engine.context.i32_type(), "c_promote")
        .map_err(ir_emission(pos))?;
    engine
        .builder
        .build_call(engine.printf(), &[fmt.into(), promoted.into()], "print_char")
        .map_err(ir_emission(pos))?;
    Ok(())
}

/// Prints an already-lowered value using the formatter its inferred type
/// implies (§4.5).
pub fn print_value_by_type<'ctx>(
    engine: &Engine<'ctx>,
    lowered: &Lowered<'ctx>,
    pos: Pos,
) -> Result<(), CompileError> {
    match &lowered.ty {
        Type::Int => {
            let fmt = engine.format_ptr("%ld\n");
            engine
                .builder
                .build_call(engine.printf(), &[fmt.into(), lowered.value.into()], "print_int")
                .map_err(ir_emission(pos))?;
        }
        Type::Float => {
            let fmt = engine.format_ptr("%g\n");
            engine
                .builder
                .build_call(engine.printf(), &[fmt.into(), lowered.value.into()], "print_float")
                .map_err(ir_emission(pos))?;
        }
        Type::Char => {
            let fmt = engine.format_ptr("%c\n");
            let promoted = engine
                .builder
                .build_int_s_extend(lowered.value.into_int_value(), engine.context.i32_type(), "c_promote")
                .map_err(ir_emission(pos))?;
            engine
                .builder
                .build_call(engine.printf(), &[fmt.into(), promoted.into()], "print_char")
                .map_err(ir_emission(pos))?;
        }
        Type::String => {
            let fmt = engine.format_ptr("%s\n");
            engine
                .builder
                .build_call(engine.printf(), &[fmt.into(), lowered.value.into()], "print_string")
                .map_err(ir_emission(pos))?;
        }
        Type::Hex => {
            let fmt = engine.format_ptr("0x%lX\n");
            engine
                .builder
                .build_call(engine.printf(), &[fmt.into(), lowered.value.into()], "print_hex")
                .map_err(ir_emission(pos))?;
        }
        Type::Oct => {
            let fmt = engine.format_ptr("0o%lo\n");
            engine
                .builder
                .build_call(engine.printf(), &[fmt.into(), lowered.value.into()], "print_oct")
                .map_err(ir_emission(pos))?;
        }
        Type::Bin => {
            let print_binary = engine.print_binary_fn(pos)?;
            engine
                .builder
                .build_call(print_binary, &[lowered.value.into()], "print_bin")
                .map_err(ir_emission(pos))?;
        }
        other => {
            return Err(CompileError::UnknownType(crate::error::Diagnostic::new(
                pos,
                None,
                format!("don't know how to show a value of type {other}"),
                None,
            )))
        }
    }
    Ok(())
}

/// `show` always consumes exactly one argument and returns a dummy Float
/// zero, never the printed value's own type (§4.5).
pub fn lower_show<'ctx>(
    engine: &Engine<'ctx>,
    env: &EnvRc<'ctx>,
    arg: &Ast,
    pos: Pos,
) -> Result<Lowered<'ctx>, CompileError> {
    if arg.is_head("quote") {
        let quoted = &arg.list().unwrap()[1];
        print_literal_line(engine, &ast_print(quoted), pos)?;
    } else {
        match &arg.kind {
            AstKind::String(s) => print_literal_line(engine, s, pos)?,
            AstKind::Char(b) => print_char_line(engine, *b, pos)?,
            _ => {
                let lowered = lower_expr(engine, env, arg)?;
                print_value_by_type(engine, &lowered, pos)?;
            }
        }
    }
    Ok(Lowered::new(Type::Float, engine.context.f64_type().const_float(0.0)))
}
