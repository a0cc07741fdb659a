// ABOUTME: The central lowering dispatch: literals, symbols, and special-form/call routing

use inkwell::AddressSpace;

use super::{Engine, EnvRc, Lowered};
use crate::ast::{Ast, AstKind};
use crate::env::EnvEntry;
use crate::error::{CompileError, Diagnostic};
use crate::ir::arithmetic::{coerce_value, ir_emission, llvm_type, lower_arithmetic};
use crate::ir::function::{lower_call, lower_function_definition};
use crate::ir::show::{add_string_constant, ast_print, lower_show};
use crate::ir::LowerMode;
use crate::token::Pos;
use crate::types::Type;

fn empty_list(pos: Pos) -> CompileError {
    CompileError::UnexpectedToken(Diagnostic::new(pos, None, "empty list is not a valid expression".to_string(), None))
}

fn lower_number<'ctx>(engine: &Engine<'ctx>, value: f64, lexeme: &str) -> Lowered<'ctx> {
    let ty = crate::types::infer_literal_type(value, Some(lexeme));
    if ty.is_integer_kind() {
        let v = engine.context.i64_type().const_int(value as i64 as u64, true);
        Lowered::new(ty, v)
    } else {
        let v = engine.context.f64_type().const_float(value);
        Lowered::new(ty, v)
    }
}

fn lower_symbol<'ctx>(engine: &Engine<'ctx>, env: &EnvRc<'ctx>, name: &str, pos: Pos) -> Result<Lowered<'ctx>, CompileError> {
    let entry = env
        .lookup(name)
        .ok_or_else(|| CompileError::UnboundSymbol(Diagnostic::new(pos, None, format!("unbound symbol '{name}'"), None)))?;
    match entry {
        EnvEntry::Variable(v) => {
            let loaded = engine
                .builder
                .build_load(llvm_type(engine, &v.ty), v.storage, name)
                .map_err(ir_emission(pos))?;
            Ok(Lowered::new(v.ty, loaded))
        }
        EnvEntry::Function { .. } | EnvEntry::Builtin { .. } => Err(CompileError::NotCallable(Diagnostic::new(
            pos,
            None,
            format!("'{name}' names a function; functions are not first-class values"),
            None,
        ))),
    }
}

/// Allocates storage for a `define`d variable: a module global in REPL mode
/// (so a later wrapper function can still reach it), a stack slot otherwise.
fn allocate_storage<'ctx>(engine: &Engine<'ctx>, ty: &Type, name: &str, pos: Pos) -> Result<inkwell::values::PointerValue<'ctx>, CompileError> {
    let llvm_ty = llvm_type(engine, ty);
    match engine.mode {
        LowerMode::Repl => {
            let global = engine.module.add_global(llvm_ty, None, name);
            global.set_initializer(&zero_value_for(engine, llvm_ty));
            Ok(global.as_pointer_value())
        }
        LowerMode::Batch => engine.builder.build_alloca(llvm_ty, name).map_err(ir_emission(pos)),
    }
}

fn zero_value_for<'ctx>(engine: &Engine<'ctx>, ty: inkwell::types::BasicTypeEnum<'ctx>) -> inkwell::values::BasicValueEnum<'ctx> {
    use inkwell::types::BasicTypeEnum;
    match ty {
        BasicTypeEnum::FloatType(f) => f.const_zero().into(),
        BasicTypeEnum::IntType(i) => i.const_zero().into(),
        BasicTypeEnum::PointerType(_) => engine.context.ptr_type(AddressSpace::default()).const_null().into(),
        _ => unreachable!("define only ever stores float, int, or pointer types"),
    }
}

/// `(define name value)`, `(define [name :: T] value)`, and the function form
/// `(define name (lambda ...))` (the short-form rewrite lands here too, since
/// the parser already expands it to this shape).
fn lower_define<'ctx>(engine: &Engine<'ctx>, env: &EnvRc<'ctx>, rest: &[Ast], pos: Pos) -> Result<Lowered<'ctx>, CompileError> {
    if rest.len() != 2 {
        return Err(CompileError::ArityMismatch(Diagnostic::new(
            pos,
            None,
            format!("'define' expects 2 arguments, got {}", rest.len()),
            None,
        )));
    }
    let target = &rest[0];
    let value_ast = &rest[1];

    match &target.kind {
        AstKind::Symbol(name) => {
            if let AstKind::Lambda(lambda) = &value_ast.kind {
                lower_function_definition(engine, env, name, lambda, pos)?;
                return Ok(unit_value(engine));
            }
            let lowered = lower_expr(engine, env, value_ast)?;
            let storage = allocate_storage(engine, &lowered.ty, name, pos)?;
            engine.builder.build_store(storage, lowered.value).map_err(ir_emission(pos))?;
            env.insert_variable(name.clone(), lowered.ty, storage);
            Ok(unit_value(engine))
        }
        AstKind::List(items) => {
            if items.len() != 3 {
                return Err(CompileError::MalformedAnnotation(Diagnostic::new(
                    target.span.start,
                    None,
                    "expected '[name :: Type]'".to_string(),
                    None,
                )));
            }
            if items[1].symbol() != Some("::") {
                return Err(malformed_annotation(target.span.start));
            }
            let name = items[0]
                .symbol()
                .ok_or_else(|| malformed_annotation(target.span.start))?;
            let type_name = items[2]
                .symbol()
                .ok_or_else(|| malformed_annotation(target.span.start))?;
            let declared = Type::from_annotation_name(type_name).ok_or_else(|| {
                CompileError::UnknownType(Diagnostic::new(
                    target.span.start,
                    None,
                    format!("unknown type '{type_name}'"),
                    None,
                ))
            })?;
            if matches!(value_ast.kind, AstKind::Lambda(_)) {
                return Err(malformed_annotation(target.span.start));
            }
            let lowered = lower_expr(engine, env, value_ast)?;
            let coerced = coerce_value(engine, lowered.value, &lowered.ty, &declared, pos)?;
            let storage = allocate_storage(engine, &declared, name, pos)?;
            engine.builder.build_store(storage, coerced).map_err(ir_emission(pos))?;
            env.insert_variable(name.to_string(), declared, storage);
            Ok(unit_value(engine))
        }
        _ => Err(malformed_annotation(target.span.start)),
    }
}

fn malformed_annotation(pos: Pos) -> CompileError {
    CompileError::MalformedAnnotation(Diagnostic::new(pos, None, "malformed 'define' target".to_string(), None))
}

fn unit_value<'ctx>(engine: &Engine<'ctx>) -> Lowered<'ctx> {
    Lowered::new(Type::Float, engine.context.f64_type().const_float(0.0))
}

/// `quote` in bare expression position renders its payload with the same
/// structural printer `show` uses, as the value of the expression itself.
fn lower_quote<'ctx>(engine: &Engine<'ctx>, payload: &Ast) -> Lowered<'ctx> {
    let text = ast_print(payload);
    let ptr = add_string_constant(engine, &text);
    Lowered::new(Type::String, ptr)
}

const ARITHMETIC_OPS: [&str; 4] = ["+", "-", "*", "/"];

/// Lowers one AST node to a typed LLVM value, dispatching list heads to the
/// special forms and builtins, and otherwise to a user-defined function call.
pub fn lower_expr<'ctx>(engine: &Engine<'ctx>, env: &EnvRc<'ctx>, ast: &Ast) -> Result<Lowered<'ctx>, CompileError> {
    match &ast.kind {
        AstKind::Number { value, lexeme } => Ok(lower_number(engine, *value, lexeme)),
        AstKind::Char(b) => Ok(Lowered::new(Type::Char, engine.context.i8_type().const_int(*b as u64, false))),
        AstKind::String(s) => Ok(Lowered::new(Type::String, add_string_constant(engine, s))),
        AstKind::Symbol(name) => lower_symbol(engine, env, name, ast.span.start),
        AstKind::Lambda(_) => Err(CompileError::NotCallable(Diagnostic::new(
            ast.span.start,
            None,
            "a lambda is only meaningful directly inside 'define'".to_string(),
            None,
        ))),
        AstKind::List(items) => {
            if items.is_empty() {
                return Err(empty_list(ast.span.start));
            }
            let head = &items[0];
            let args = &items[1..];
            match head.symbol() {
                Some("define") => lower_define(engine, env, args, ast.span.start),
                Some("show") => {
                    if args.len() != 1 {
                        return Err(CompileError::ArityMismatch(Diagnostic::new(
                            ast.span.start,
                            None,
                            format!("'show' expects 1 argument, got {}", args.len()),
                            None,
                        )));
                    }
                    lower_show(engine, env, &args[0], ast.span.start)
                }
                Some("quote") => {
                    if args.len() != 1 {
                        return Err(CompileError::ArityMismatch(Diagnostic::new(
                            ast.span.start,
                            None,
                            format!("'quote' expects 1 argument, got {}", args.len()),
                            None,
                        )));
                    }
                    Ok(lower_quote(engine, &args[0]))
                }
                Some(op) if ARITHMETIC_OPS.contains(&op) => {
                    if args.is_empty() {
                        return Err(CompileError::ArityMismatch(Diagnostic::new(
                            ast.span.start,
                            None,
                            format!("'{op}' expects at least 1 argument"),
                            None,
                        )));
                    }
                    lower_arithmetic(engine, env, op, args, ast.span.start)
                }
                Some(name) => lower_call(engine, env, name, args, ast.span.start),
                None => Err(CompileError::NotCallable(Diagnostic::new(
                    ast.span.start,
                    None,
                    "only a symbol may appear in call position".to_string(),
                    None,
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Engine;
    use crate::parser::parse_one;
    use inkwell::context::Context;

    fn lower_source<'ctx>(engine: &Engine<'ctx>, source: &str) -> Result<Lowered<'ctx>, CompileError> {
        let ast = parse_one(source).expect("source parses");
        let env = engine.root_env();
        lower_expr(engine, &env, &ast)
    }

    #[test]
    fn lowers_integer_literal() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let lowered = lower_source(&engine, "42").unwrap();
        assert_eq!(lowered.ty, Type::Int);
    }

    #[test]
    fn lowers_float_literal() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let lowered = lower_source(&engine, "3.5").unwrap();
        assert_eq!(lowered.ty, Type::Float);
    }

    #[test]
    fn unbound_symbol_is_an_error() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let err = lower_source(&engine, "nope").unwrap_err();
        assert!(matches!(err, CompileError::UnboundSymbol(_)));
    }

    #[test]
    fn arithmetic_folds_left_with_promotion() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let lowered = lower_source(&engine, "(+ 1 2.0 3)").unwrap();
        assert_eq!(lowered.ty, Type::Float);
    }

    #[test]
    fn mixed_base_arithmetic_is_rejected() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let err = lower_source(&engine, "(+ 0xFF 0b1010)").unwrap_err();
        assert!(matches!(err, CompileError::MixedBase(_)));
    }

    #[test]
    fn define_binds_a_variable_for_later_lookup() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let env = engine.root_env();
        let function_ty = context.void_type().fn_type(&[], false);
        let function = engine.module.add_function("wrapper", function_ty, None);
        let block = context.append_basic_block(function, "entry");
        engine.builder.position_at_end(block);

        let define_ast = parse_one("(define x 10)").unwrap();
        lower_expr(&engine, &env, &define_ast).unwrap();
        let lookup_ast = parse_one("x").unwrap();
        let lowered = lower_expr(&engine, &env, &lookup_ast).unwrap();
        assert_eq!(lowered.ty, Type::Int);
    }

    #[test]
    fn annotated_define_coerces_the_value() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let env = engine.root_env();
        let function_ty = context.void_type().fn_type(&[], false);
        let function = engine.module.add_function("wrapper", function_ty, None);
        let block = context.append_basic_block(function, "entry");
        engine.builder.position_at_end(block);

        let define_ast = parse_one("(define [x :: Float] 10)").unwrap();
        lower_expr(&engine, &env, &define_ast).unwrap();
        let lookup_ast = parse_one("x").unwrap();
        let lowered = lower_expr(&engine, &env, &lookup_ast).unwrap();
        assert_eq!(lowered.ty, Type::Float);
    }

    #[test]
    fn annotated_bool_define_accepts_a_numeric_value() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let env = engine.root_env();
        let function_ty = context.void_type().fn_type(&[], false);
        let function = engine.module.add_function("wrapper", function_ty, None);
        let block = context.append_basic_block(function, "entry");
        engine.builder.position_at_end(block);

        let define_ast = parse_one("(define [b :: Bool] 1)").unwrap();
        lower_expr(&engine, &env, &define_ast).unwrap();
        let lookup_ast = parse_one("b").unwrap();
        let lowered = lower_expr(&engine, &env, &lookup_ast).unwrap();
        assert_eq!(lowered.ty, Type::Bool);
    }

    #[test]
    fn malformed_annotation_without_double_colon_is_rejected() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let env = engine.root_env();
        let function_ty = context.void_type().fn_type(&[], false);
        let function = engine.module.add_function("wrapper", function_ty, None);
        let block = context.append_basic_block(function, "entry");
        engine.builder.position_at_end(block);

        let err = lower_expr(&engine, &env, &parse_one("(define [x foo Float] 10)").unwrap()).unwrap_err();
        assert!(matches!(err, CompileError::MalformedAnnotation(_)));
    }

    #[test]
    fn quote_in_expression_position_renders_structurally() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let lowered = lower_source(&engine, "(quote (a b 1))").unwrap();
        assert_eq!(lowered.ty, Type::String);
    }

    #[test]
    fn calling_a_variable_is_not_callable() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let env = engine.root_env();
        let function_ty = context.void_type().fn_type(&[], false);
        let function = engine.module.add_function("wrapper", function_ty, None);
        let block = context.append_basic_block(function, "entry");
        engine.builder.position_at_end(block);

        lower_expr(&engine, &env, &parse_one("(define x 1)").unwrap()).unwrap();
        let err = lower_expr(&engine, &env, &parse_one("x").unwrap());
        assert!(err.is_ok());
        let call_err = lower_expr(&engine, &env, &parse_one("(x 1)").unwrap()).unwrap_err();
        assert!(matches!(call_err, CompileError::NotCallable(_)));
    }

    #[test]
    fn user_function_definition_and_call() {
        let context = Context::create();
        let engine = Engine::new(&context, "test", LowerMode::Batch);
        let env = engine.root_env();

        lower_expr(&engine, &env, &parse_one("(define (square [x :: Int]) (* x x))").unwrap()).unwrap();

        let function_ty = context.i64_type().fn_type(&[], false);
        let function = engine.module.add_function("caller", function_ty, None);
        let block = context.append_basic_block(function, "entry");
        engine.builder.position_at_end(block);
        let lowered = lower_expr(&engine, &env, &parse_one("(square 5)").unwrap()).unwrap();
        assert_eq!(lowered.ty, Type::Int);
    }
}
