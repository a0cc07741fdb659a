mod ast;
mod backend;
mod config;
mod env;
mod error;
mod ir;
mod lexer;
mod parser;
mod repl;
mod token;
mod types;

use std::path::PathBuf;

use clap::Parser;
use inkwell::context::Context;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};

use backend::{artifact_path, Backend};
use config::{ArtifactKind, TargetConfig, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use error::{CompileError, Reporter};
use ir::lower::lower_expr;
use ir::{Engine, LowerMode};
use parser::parse_all;
use repl::Repl;

/// An ahead-of-time Lisp-style compiler, with an interactive JIT mode when no
/// input file is given.
#[derive(Parser, Debug)]
#[command(name = "monadc")]
#[command(version = config::VERSION)]
#[command(about = "Compiles or interactively evaluates a Monad program")]
struct CliArgs {
    /// Source file to compile (omit to start the interactive evaluator)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output base name (default: input's basename minus its extension)
    #[arg(short = 'o', long = "output", value_name = "NAME")]
    output: Option<String>,

    #[arg(long = "emit-ir")]
    emit_ir: bool,
    #[arg(long = "emit-bc")]
    emit_bc: bool,
    #[arg(long = "emit-asm")]
    emit_asm: bool,
    #[arg(long = "emit-obj")]
    emit_obj: bool,

    /// Target triple override (default: host)
    #[arg(long = "target", value_name = "TRIPLE")]
    target: Option<String>,
}

fn main() {
    let args = CliArgs::parse();
    let input = args.input.clone();
    let result = match input {
        Some(path) => run_compile(&path, &args),
        None => run_repl(),
    };
    if let Err(message) = result {
        eprintln!("{message}");
        std::process::exit(1);
    }
}

fn requested_artifacts(args: &CliArgs) -> Vec<ArtifactKind> {
    let mut kinds = Vec::new();
    if args.emit_ir {
        kinds.push(ArtifactKind::Ir);
    }
    if args.emit_bc {
        kinds.push(ArtifactKind::Bitcode);
    }
    if args.emit_asm {
        kinds.push(ArtifactKind::Assembly);
    }
    if args.emit_obj {
        kinds.push(ArtifactKind::Object);
    }
    kinds
}

fn output_base(args: &CliArgs, input: &std::path::Path) -> String {
    match &args.output {
        Some(name) => name.clone(),
        None => input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("a")
            .to_string(),
    }
}

fn run_compile(path: &std::path::Path, args: &CliArgs) -> Result<(), String> {
    let source = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let reporter = Reporter::new(path.display().to_string(), source.clone());
    compile(&source, args, path).map_err(|e| reporter.render(e.diagnostic()))
}

fn compile(source: &str, args: &CliArgs, input_path: &std::path::Path) -> Result<(), CompileError> {
    let forms = parse_all(source)?;

    let context = Context::create();
    let engine = Engine::new(&context, "monad_module", LowerMode::Batch);
    let env = engine.root_env();

    let i32_type = engine.context.i32_type();
    let main_fn_type = i32_type.fn_type(&[], false);
    let main_fn = engine.module.add_function("main", main_fn_type, None);
    let entry = engine.context.append_basic_block(main_fn, "entry");
    engine.builder.position_at_end(entry);

    for form in &forms {
        lower_expr(&engine, &env, form)?;
    }
    engine
        .builder
        .build_return(Some(&i32_type.const_zero()))
        .map_err(|e| ir::arithmetic::ir_emission(forms.last().map(|f| f.span.start).unwrap_or_default())(e))?;

    let target_config = TargetConfig {
        triple: args.target.clone(),
    };
    let backend = Backend::new(&target_config)?;
    backend.verify(&engine)?;

    let base = output_base(args, input_path);
    let base_path = std::path::PathBuf::from(&base);
    let requested = requested_artifacts(args);

    if requested.is_empty() {
        let obj_path = artifact_path(&base_path, ArtifactKind::Object);
        backend.emit_object(&engine, &obj_path)?;
        backend.link(&obj_path, &base_path)?;
        let _ = std::fs::remove_file(&obj_path);
    } else {
        for kind in requested {
            let path = artifact_path(&base_path, kind);
            match kind {
                ArtifactKind::Ir => backend.emit_ir(&engine, &path)?,
                ArtifactKind::Bitcode => backend.emit_bitcode(&engine, &path)?,
                ArtifactKind::Assembly => backend.emit_assembly(&engine, &path)?,
                ArtifactKind::Object => backend.emit_object(&engine, &path)?,
                ArtifactKind::Executable => unreachable!("executable is never explicitly requested"),
            }
        }
    }
    Ok(())
}

fn run_repl() -> Result<(), String> {
    let context = Context::create();
    let mut repl = Repl::new(&context).map_err(|e| e.to_string())?;

    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), rustyline::history::DefaultHistory> =
        Editor::with_config(rl_config).map_err(|e| format!("failed to initialize the line reader: {e}"))?;
    let history_file = ".monad_history";
    let _ = rl.load_history(history_file);

    println!("{WELCOME_MESSAGE}");
    println!("{WELCOME_SUBTITLE}");

    loop {
        match rl.readline("monad> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match line.trim() {
                    "(quit)" | "(exit)" => {
                        println!("Goodbye!");
                        break;
                    }
                    "(clear)" => {
                        print!("\x1B[2J\x1B[H");
                        continue;
                    }
                    _ => {}
                }
                if let Err(e) = repl.eval_line(&line) {
                    let reporter = Reporter::new("<repl>", line.clone());
                    eprintln!("{}", reporter.render(e.diagnostic()));
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("{err}");
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    Ok(())
}
