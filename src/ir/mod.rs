// ABOUTME: The lowering engine: owns the IR module, builder, context, and the memoised globals

pub mod arithmetic;
pub mod format;
pub mod function;
pub mod lower;
pub mod show;

use std::rc::Rc;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{BasicValueEnum, FunctionValue, GlobalValue, PointerValue};

use crate::env::{Environment, UNBOUNDED};
use crate::types::Type;

pub type VarStorage<'ctx> = PointerValue<'ctx>;
pub type FuncHandle<'ctx> = FunctionValue<'ctx>;
pub type Env<'ctx> = Environment<VarStorage<'ctx>, FuncHandle<'ctx>>;
pub type EnvRc<'ctx> = Rc<Env<'ctx>>;

/// Whether `define` should bind a stack slot (inside a function body being
/// compiled ahead of time) or a module global (so a later REPL wrapper
/// function can still see it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerMode {
    Batch,
    Repl,
}

/// A lowered expression: the value plus the type the rest of lowering should
/// treat it as (drives coercion, printing, and promotion).
#[derive(Debug, Clone)]
pub struct Lowered<'ctx> {
    pub ty: Type,
    pub value: BasicValueEnum<'ctx>,
}

impl<'ctx> Lowered<'ctx> {
    pub fn new(ty: Type, value: impl Into<BasicValueEnum<'ctx>>) -> Self {
        Self {
            ty,
            value: value.into(),
        }
    }
}

/// Per-module globals lowering only ever builds once (§4.5): the format
/// strings, the printf declaration, and the hand-rolled binary printer.
#[derive(Default)]
pub struct FormatGlobals<'ctx> {
    pub strings: std::cell::RefCell<std::collections::HashMap<&'static str, GlobalValue<'ctx>>>,
    pub printf: std::cell::RefCell<Option<FunctionValue<'ctx>>>,
    pub print_binary: std::cell::RefCell<Option<FunctionValue<'ctx>>>,
}

pub struct Engine<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub mode: LowerMode,
    pub formats: FormatGlobals<'ctx>,
}

impl<'ctx> Engine<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str, mode: LowerMode) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        Self {
            context,
            module,
            builder,
            mode,
            formats: FormatGlobals::default(),
        }
    }

    /// A fresh root environment with the fixed builtin table pre-registered
    /// (§4.7 — needed before any lowering so arity checks work without it).
    pub fn root_env(&self) -> Rc<Env<'ctx>> {
        let env = Environment::new();
        env.insert_builtin("+", 1, UNBOUNDED, Some("sum its arguments, or negate one".to_string()));
        env.insert_builtin("-", 1, UNBOUNDED, Some("subtract, or negate one argument".to_string()));
        env.insert_builtin("*", 1, UNBOUNDED, Some("multiply its arguments".to_string()));
        env.insert_builtin("/", 1, UNBOUNDED, Some("divide, or reciprocate one argument".to_string()));
        env.insert_builtin("show", 1, 1, Some("print a value".to_string()));
        env.insert_builtin("quote", 1, 1, Some("quote an expression without evaluating it".to_string()));
        env.insert_builtin("define", 2, 2, Some("bind a name to a value or function".to_string()));
        env
    }
}
