// ABOUTME: End-to-end tests compiling small complete programs down to LLVM IR text

use inkwell::context::Context;
use monadc::error::CompileError;
use monadc::ir::lower::lower_expr;
use monadc::ir::{Engine, LowerMode};
use monadc::parser::parse_all;

fn run(context: &Context, source: &str) -> Result<Engine<'_>, CompileError> {
    let engine = Engine::new(context, "test_module", LowerMode::Batch);
    let env = engine.root_env();
    let forms = parse_all(source)?;

    let fn_type = engine.context.void_type().fn_type(&[], false);
    let function = engine.module.add_function("entry", fn_type, None);
    let block = engine.context.append_basic_block(function, "entry");
    engine.builder.position_at_end(block);

    for form in &forms {
        lower_expr(&engine, &env, form)?;
    }
    engine.builder.build_return(None).unwrap();
    Ok(engine)
}

#[test]
fn sum_of_three_ints_shows_as_a_call_to_printf() {
    let context = Context::create();
    let engine = run(&context, "(show (+ 1 2 3))").unwrap();
    let ir = engine.module.print_to_string().to_string();
    assert!(ir.contains("call i32 (ptr, ...) @printf"));
    assert!(ir.contains("%ld\\0A"));
}

#[test]
fn define_hex_literal_preserves_its_base() {
    let context = Context::create();
    let engine = run(&context, "(define x 0xFF) (show x)").unwrap();
    let ir = engine.module.print_to_string().to_string();
    assert!(ir.contains("0x%lX\\0A"));
    assert!(ir.contains("alloca i64"));
}

#[test]
fn annotated_float_binding_participates_in_arithmetic() {
    let context = Context::create();
    let engine = run(&context, "(define [y :: Float] 3) (show (+ y 1))").unwrap();
    let ir = engine.module.print_to_string().to_string();
    assert!(ir.contains("fadd"));
}

#[test]
fn user_function_definition_emits_a_named_function() {
    let context = Context::create();
    let engine = run(&context, "(define (sq [x :: Int] -> Int) (* x x)) (show (sq 5))").unwrap();
    let ir = engine.module.print_to_string().to_string();
    assert!(ir.contains("define i64 @sq"));
    assert!(ir.contains("call i64 @sq"));
}

#[test]
fn quote_under_show_prints_the_structural_rendering() {
    let context = Context::create();
    let engine = run(&context, r#"(show '(a 1 "b"))"#).unwrap();
    let ir = engine.module.print_to_string().to_string();
    assert!(ir.contains("(a 1 \\22b\\22)"));
}

#[test]
fn mixed_base_arithmetic_is_a_fatal_error() {
    let context = Context::create();
    let err = run(&context, "(+ 0xFF 0b10)").unwrap_err();
    assert!(matches!(err, CompileError::MixedBase(_)));
    assert!(err.to_string().contains("cannot mix Hex and Bin"));
}

#[test]
fn calling_an_unbound_function_is_a_fatal_error() {
    let context = Context::create();
    let err = run(&context, "(frobnicate 1 2)").unwrap_err();
    assert!(matches!(err, CompileError::UnknownFunction(_)));
}

#[test]
fn arity_mismatch_on_a_user_function_is_fatal() {
    let context = Context::create();
    let err = run(&context, "(define (sq [x :: Int]) (* x x)) (sq 1 2)").unwrap_err();
    assert!(matches!(err, CompileError::ArityMismatch(_)));
}
