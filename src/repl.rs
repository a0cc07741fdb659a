// ABOUTME: The interactive evaluator: a wrapper-per-line JIT protocol over the shared lowering engine

use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::OptimizationLevel;

use crate::ast::Ast;
use crate::error::{CompileError, Diagnostic};
use crate::ir::arithmetic::ir_emission;
use crate::ir::lower::lower_expr;
use crate::ir::show::print_value_by_type;
use crate::ir::{Engine, LowerMode};
use crate::parser::parse_one;
use crate::token::Pos;

/// Supplies one line of input at a time; end of input is `None`. Lets the
/// evaluator core run against a real terminal or, in tests, a fixed script.
pub trait LineSource {
    fn next_line(&mut self) -> Option<String>;
}

/// A fixed sequence of lines, for driving the evaluator in tests without a
/// real terminal.
pub struct VecLineSource {
    lines: std::vec::IntoIter<String>,
}

impl VecLineSource {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines: lines.into_iter() }
    }
}

impl LineSource for VecLineSource {
    fn next_line(&mut self) -> Option<String> {
        self.lines.next()
    }
}

/// One interactive session: a persistent environment and IR module shared by
/// every line, plus the JIT execution engine that runs each line's wrapper.
pub struct Repl<'ctx> {
    engine: Engine<'ctx>,
    env: crate::ir::EnvRc<'ctx>,
    execution_engine: ExecutionEngine<'ctx>,
    wrapper_count: u64,
}

impl<'ctx> Repl<'ctx> {
    pub fn new(context: &'ctx Context) -> Result<Self, CompileError> {
        let engine = Engine::new(context, "monad_repl", LowerMode::Repl);
        let execution_engine = engine
            .module
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| CompileError::TargetLookupFailed(Diagnostic::new(Pos::default(), None, e.to_string(), None)))?;
        let env = engine.root_env();
        Ok(Self {
            engine,
            env,
            execution_engine,
            wrapper_count: 0,
        })
    }

    /// Parses, lowers, verifies, and JITs exactly one line (§4.7 steps 2-5).
    /// A failure leaves the module as it was before the line was read: the
    /// unfinished wrapper function is deleted.
    pub fn eval_line(&mut self, line: &str) -> Result<(), CompileError> {
        let ast = parse_one(line)?;
        self.wrapper_count += 1;
        let fn_name = format!("__monad_line_{}", self.wrapper_count);

        let void_type = self.engine.context.void_type();
        let fn_type = void_type.fn_type(&[], false);
        let function = self.engine.module.add_function(&fn_name, fn_type, None);
        let entry = self.engine.context.append_basic_block(function, "entry");
        self.engine.builder.position_at_end(entry);

        if let Err(e) = self.lower_and_print(&ast) {
            unsafe { function.delete() };
            return Err(e);
        }
        if let Err(e) = self.engine.builder.build_return(None) {
            unsafe { function.delete() };
            return Err(ir_emission(ast.span.start)(e));
        }
        if let Err(e) = self.engine.module.verify() {
            unsafe { function.delete() };
            return Err(CompileError::VerificationFailed(Diagnostic::new(
                ast.span.start,
                None,
                e.to_string(),
                None,
            )));
        }

        unsafe {
            self.execution_engine.run_function(function, &[]);
        }
        Ok(())
    }

    /// Step 4: a `define` or `show` already produced its own output (or
    /// none); any other expression gets an extra print of its value.
    fn lower_and_print(&mut self, ast: &Ast) -> Result<(), CompileError> {
        let is_silent = ast.is_head("define") || ast.is_head("show");
        let lowered = lower_expr(&self.engine, &self.env, ast)?;
        if !is_silent {
            print_value_by_type(&self.engine, &lowered, ast.span.start)?;
        }
        Ok(())
    }

    /// Drives the session to completion against any `LineSource`, skipping
    /// blank lines and reporting (without aborting the session) any
    /// per-line error through `on_error`.
    pub fn run(&mut self, source: &mut dyn LineSource, mut on_error: impl FnMut(CompileError)) {
        while let Some(line) = source.next_line() {
            if line.trim().is_empty() {
                continue;
            }
            if let Err(e) = self.eval_line(&line) {
                on_error(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_expression_runs_without_error() {
        let context = Context::create();
        let mut repl = Repl::new(&context).unwrap();
        repl.eval_line("(show (+ 1 2 3))").unwrap();
    }

    #[test]
    fn define_persists_across_lines() {
        let context = Context::create();
        let mut repl = Repl::new(&context).unwrap();
        repl.eval_line("(define x 0xFF)").unwrap();
        repl.eval_line("(show x)").unwrap();
    }

    #[test]
    fn bad_line_reports_error_and_session_continues() {
        let context = Context::create();
        let mut repl = Repl::new(&context).unwrap();
        let mut source = VecLineSource::new(vec!["nope".to_string(), "(show 1)".to_string()]);
        let mut errors = 0;
        repl.run(&mut source, |_| errors += 1);
        assert_eq!(errors, 1);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let context = Context::create();
        let mut repl = Repl::new(&context).unwrap();
        let mut source = VecLineSource::new(vec!["".to_string(), "   ".to_string(), "(show 1)".to_string()]);
        let mut errors = 0;
        repl.run(&mut source, |_| errors += 1);
        assert_eq!(errors, 0);
    }

    #[test]
    fn user_function_definition_and_call_over_two_lines() {
        let context = Context::create();
        let mut repl = Repl::new(&context).unwrap();
        repl.eval_line("(define (sq [x :: Int] -> Int) (* x x))").unwrap();
        repl.eval_line("(show (sq 5))").unwrap();
    }
}
