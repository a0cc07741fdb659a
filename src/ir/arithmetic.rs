// ABOUTME: Operand coercion and the + - * / builtins, per the promotion rules in the type model

use inkwell::values::BasicValueEnum;
use inkwell::AddressSpace;

use super::{Engine, EnvRc, Lowered};
use crate::ast::Ast;
use crate::error::{CompileError, Diagnostic};
use crate::ir::lower::lower_expr;
use crate::token::Pos;
use crate::types::{promote, PromotionError, Type};

pub fn ir_emission(pos: Pos) -> impl Fn(inkwell::builder::BuilderError) -> CompileError {
    move |e| CompileError::IrEmission(Diagnostic::new(pos, None, e.to_string(), None))
}

fn non_numeric(pos: Pos, ty: &Type) -> CompileError {
    CompileError::NonNumericOperand(Diagnostic::new(
        pos,
        None,
        format!("non-numeric operand of type {ty}"),
        None,
    ))
}

/// The LLVM storage type for a surface `Type` (§4.5): integer kinds all
/// share the same 64-bit representation.
pub fn llvm_type<'ctx>(engine: &Engine<'ctx>, ty: &Type) -> inkwell::types::BasicTypeEnum<'ctx> {
    match ty {
        Type::Float => engine.context.f64_type().into(),
        Type::Char => engine.context.i8_type().into(),
        Type::String => engine.context.ptr_type(AddressSpace::default()).into(),
        _ => engine.context.i64_type().into(),
    }
}

/// Converts a value from one surface type to another, per §4.3's coercion
/// rules: Float<->Int via signed conversion, Char<->wider-int via sign
/// extension/truncation, and same-representation moves among the integer
/// kinds (Int/Hex/Bin/Oct) which require no instruction at all.
pub fn coerce_value<'ctx>(
    engine: &Engine<'ctx>,
    value: BasicValueEnum<'ctx>,
    from: &Type,
    to: &Type,
    pos: Pos,
) -> Result<BasicValueEnum<'ctx>, CompileError> {
    if from == to {
        return Ok(value);
    }
    match (from, to) {
        (Type::Float, Type::Char) => {
            let f = value.into_float_value();
            let i8_type = engine.context.i8_type();
            Ok(engine
                .builder
                .build_float_to_signed_int(f, i8_type, "f2c")
                .map_err(ir_emission(pos))?
                .into())
        }
        (Type::Float, t) if t.is_integer_kind() => {
            let f = value.into_float_value();
            let i64_type = engine.context.i64_type();
            Ok(engine
                .builder
                .build_float_to_signed_int(f, i64_type, "f2i")
                .map_err(ir_emission(pos))?
                .into())
        }
        (f, Type::Float) if f.is_integer_kind() || *f == Type::Char => {
            let i = value.into_int_value();
            let f64_type = engine.context.f64_type();
            Ok(engine
                .builder
                .build_signed_int_to_float(i, f64_type, "i2f")
                .map_err(ir_emission(pos))?
                .into())
        }
        (Type::Char, t) if t.is_integer_kind() => {
            let i = value.into_int_value();
            let i64_type = engine.context.i64_type();
            Ok(engine
                .builder
                .build_int_s_extend(i, i64_type, "c2i")
                .map_err(ir_emission(pos))?
                .into())
        }
        (f, Type::Char) if f.is_integer_kind() => {
            let i = value.into_int_value();
            let i8_type = engine.context.i8_type();
            Ok(engine
                .builder
                .build_int_truncate(i, i8_type, "i2c")
                .map_err(ir_emission(pos))?
                .into())
        }
        (f, t) if f.is_integer_kind() && t.is_integer_kind() => Ok(value),
        (Type::Float, Type::Bool) => {
            let f = value.into_float_value();
            let i64_type = engine.context.i64_type();
            Ok(engine
                .builder
                .build_float_to_signed_int(f, i64_type, "f2bool")
                .map_err(ir_emission(pos))?
                .into())
        }
        (Type::Char, Type::Bool) => {
            let i = value.into_int_value();
            let i64_type = engine.context.i64_type();
            Ok(engine
                .builder
                .build_int_s_extend(i, i64_type, "c2bool")
                .map_err(ir_emission(pos))?
                .into())
        }
        (f, Type::Bool) if f.is_integer_kind() => Ok(value),
        _ => Err(CompileError::NonNumericOperand(Diagnostic::new(
            pos,
            None,
            format!("cannot coerce {from} to {to}"),
            None,
        ))),
    }
}

fn apply_op<'ctx>(
    engine: &Engine<'ctx>,
    op: &str,
    lhs: BasicValueEnum<'ctx>,
    rhs: BasicValueEnum<'ctx>,
    ty: &Type,
    pos: Pos,
) -> Result<BasicValueEnum<'ctx>, CompileError> {
    if matches!(ty, Type::Float) {
        let l = lhs.into_float_value();
        let r = rhs.into_float_value();
        let v = match op {
            "+" => engine.builder.build_float_add(l, r, "fadd"),
            "-" => engine.builder.build_float_sub(l, r, "fsub"),
            "*" => engine.builder.build_float_mul(l, r, "fmul"),
            "/" => engine.builder.build_float_div(l, r, "fdiv"),
            _ => unreachable!("unknown arithmetic operator"),
        }
        .map_err(ir_emission(pos))?;
        Ok(v.into())
    } else {
        let l = lhs.into_int_value();
        let r = rhs.into_int_value();
        let v = match op {
            "+" => engine.builder.build_int_add(l, r, "iadd"),
            "-" => engine.builder.build_int_sub(l, r, "isub"),
            "*" => engine.builder.build_int_mul(l, r, "imul"),
            "/" => engine.builder.build_int_signed_div(l, r, "idiv"),
            _ => unreachable!("unknown arithmetic operator"),
        }
        .map_err(ir_emission(pos))?;
        Ok(v.into())
    }
}

fn negate<'ctx>(engine: &Engine<'ctx>, operand: Lowered<'ctx>, pos: Pos) -> Result<Lowered<'ctx>, CompileError> {
    match &operand.ty {
        Type::Float => {
            let v = engine
                .builder
                .build_float_neg(operand.value.into_float_value(), "fneg")
                .map_err(ir_emission(pos))?;
            Ok(Lowered::new(Type::Float, v))
        }
        t if t.is_integer_kind() => {
            let ty = t.clone();
            let v = engine
                .builder
                .build_int_neg(operand.value.into_int_value(), "ineg")
                .map_err(ir_emission(pos))?;
            Ok(Lowered::new(ty, v))
        }
        Type::Char => {
            let as_int = coerce_value(engine, operand.value, &Type::Char, &Type::Int, pos)?;
            let v = engine
                .builder
                .build_int_neg(as_int.into_int_value(), "ineg")
                .map_err(ir_emission(pos))?;
            Ok(Lowered::new(Type::Int, v))
        }
        other => Err(non_numeric(pos, other)),
    }
}

fn reciprocal<'ctx>(engine: &Engine<'ctx>, operand: Lowered<'ctx>, pos: Pos) -> Result<Lowered<'ctx>, CompileError> {
    if !operand.ty.is_numeric() {
        return Err(non_numeric(pos, &operand.ty));
    }
    let as_float = coerce_value(engine, operand.value, &operand.ty, &Type::Float, pos)?;
    let one = engine.context.f64_type().const_float(1.0);
    let v = engine
        .builder
        .build_float_div(one, as_float.into_float_value(), "recip")
        .map_err(ir_emission(pos))?;
    Ok(Lowered::new(Type::Float, v))
}

fn mixed_base_error(pos: Pos, a: &Type, b: &Type) -> CompileError {
    CompileError::MixedBase(Diagnostic::new(
        pos,
        None,
        format!("cannot mix {a} and {b} in arithmetic"),
        None,
    ))
}

/// Lowers `+ - * /`, folding left under the promotion rules after the first
/// operand. A single argument is unary: `-` negates, `/` reciprocates,
/// `+`/`*` are the identity.
pub fn lower_arithmetic<'ctx>(
    engine: &Engine<'ctx>,
    env: &EnvRc<'ctx>,
    op: &str,
    args: &[Ast],
    pos: Pos,
) -> Result<Lowered<'ctx>, CompileError> {
    let first = lower_expr(engine, env, &args[0])?;

    if args.len() == 1 {
        return match op {
            "-" => negate(engine, first, pos),
            "/" => reciprocal(engine, first, pos),
            _ => Ok(first),
        };
    }

    let mut acc = first;
    for rest in &args[1..] {
        let next = lower_expr(engine, env, rest)?;
        let result_ty = promote(&acc.ty, &next.ty).map_err(|e| match e {
            PromotionError::NonNumericOperand => {
                let bad = if acc.ty.is_numeric() { &next.ty } else { &acc.ty };
                non_numeric(pos, bad)
            }
            PromotionError::MixedBase(a, b) => mixed_base_error(pos, &a, &b),
        })?;
        let lhs = coerce_value(engine, acc.value, &acc.ty, &result_ty, pos)?;
        let rhs = coerce_value(engine, next.value, &next.ty, &result_ty, pos)?;
        let value = apply_op(engine, op, lhs, rhs, &result_ty, pos)?;
        acc = Lowered::new(result_ty, value);
    }
    Ok(acc)
}
