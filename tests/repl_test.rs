// ABOUTME: Drives the interactive evaluator's wrapper-per-line protocol against an in-memory line source

use inkwell::context::Context;
use monadc::repl::{Repl, VecLineSource};

#[test]
fn a_full_session_runs_without_error() {
    let context = Context::create();
    let mut repl = Repl::new(&context).unwrap();
    let mut source = VecLineSource::new(vec![
        "(define x 0xFF)".to_string(),
        "(show x)".to_string(),
        "(define (sq [x :: Int] -> Int) (* x x))".to_string(),
        "(show (sq 5))".to_string(),
    ]);
    let mut errors = Vec::new();
    repl.run(&mut source, |e| errors.push(e));
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[test]
fn a_define_on_one_line_is_visible_to_a_later_line() {
    let context = Context::create();
    let mut repl = Repl::new(&context).unwrap();
    repl.eval_line("(define y 3)").unwrap();
    repl.eval_line("(show (+ y 1))").unwrap();
}

#[test]
fn an_unbound_symbol_is_reported_but_the_session_keeps_going() {
    let context = Context::create();
    let mut repl = Repl::new(&context).unwrap();
    let mut source = VecLineSource::new(vec!["nope".to_string(), "(show 1)".to_string()]);
    let mut errors = Vec::new();
    repl.run(&mut source, |e| errors.push(e));
    assert_eq!(errors.len(), 1);
}

#[test]
fn blank_and_whitespace_only_lines_are_ignored() {
    let context = Context::create();
    let mut repl = Repl::new(&context).unwrap();
    let mut source = VecLineSource::new(vec!["".to_string(), "  \t ".to_string(), "(show 1)".to_string()]);
    let mut errors = Vec::new();
    repl.run(&mut source, |e| errors.push(e));
    assert!(errors.is_empty());
}

#[test]
fn end_of_input_ends_the_session() {
    let context = Context::create();
    let mut repl = Repl::new(&context).unwrap();
    let mut source = VecLineSource::new(vec!["(show 1)".to_string()]);
    let mut errors = Vec::new();
    repl.run(&mut source, |e| errors.push(e));
    assert!(errors.is_empty());
}
