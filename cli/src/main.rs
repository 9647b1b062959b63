//! Tamarin command-line interface: a REPL, a one-shot runner, and the
//! engine benchmark driver.

use std::process::ExitCode;
use std::time::Instant;

use bumpalo::Bump;
use clap::{Parser, ValueEnum};
use nu_ansi_term::Color;
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use tamarin_core::compiler::{Compiler, SymbolTable};
use tamarin_core::evaluator::{self, Environment};
use tamarin_core::parser;
use tamarin_core::values::Value;
use tamarin_core::vm::{GLOBALS_SIZE, Vm};
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Engine {
    /// Compile to bytecode and run on the stack machine.
    Vm,
    /// Walk the AST directly.
    Eval,
}

impl Engine {
    fn name(self) -> &'static str {
        match self {
            Engine::Vm => "vm",
            Engine::Eval => "eval",
        }
    }
}

/// Tamarin - a small expression language with a bytecode VM
#[derive(Parser, Debug)]
#[command(name = "tamarin")]
#[command(about = "Run Tamarin programs", long_about = None)]
struct Args {
    /// Execution engine
    #[arg(long, value_enum, default_value_t = Engine::Vm)]
    engine: Engine,

    /// Run the recursive-fibonacci benchmark and print the timing
    #[arg(long)]
    bench: bool,

    /// Fibonacci number for --bench
    #[arg(long, default_value_t = 15)]
    fib: u32,

    /// Print the compiled bytecode instead of running
    #[arg(long)]
    bytecode: bool,

    /// Read the program from a file
    #[arg(short, long)]
    file: Option<std::path::PathBuf>,

    /// Program text to run (the REPL starts if neither this nor --file
    /// is given)
    program: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.bench {
        return run_benchmark(args.engine, args.fib);
    }

    let source = match (&args.file, &args.program) {
        (Some(path), _) => match std::fs::read_to_string(path) {
            Ok(source) => Some(source),
            Err(err) => {
                eprintln!("cannot read {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        (None, Some(text)) => Some(text.clone()),
        (None, None) => None,
    };

    match source {
        Some(source) => run_source(&source, args.engine, args.bytecode),
        None => repl(args.engine),
    }
}

fn run_source(source: &str, engine: Engine, show_bytecode: bool) -> ExitCode {
    let arena = Bump::new();
    let program = match parser::parse(&arena, source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("parse error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match engine {
        Engine::Vm => {
            let mut compiler = Compiler::new();
            if let Err(err) = compiler.compile(&program) {
                eprintln!("compile error: {}", err);
                return ExitCode::FAILURE;
            }
            let code = compiler.bytecode();

            if show_bytecode {
                println!("{:?}", code);
                return ExitCode::SUCCESS;
            }

            let mut vm = Vm::new(code);
            if let Err(err) = vm.run() {
                eprintln!("runtime error: {}", err);
                return ExitCode::FAILURE;
            }
            println!("{}", vm.last_popped_stack_elem());
        }
        Engine::Eval => {
            if show_bytecode {
                eprintln!("--bytecode requires --engine vm");
                return ExitCode::FAILURE;
            }
            let env = Environment::new();
            match evaluator::eval_program(&program, &env) {
                Ok(value) => println!("{}", value),
                Err(err) => {
                    eprintln!("runtime error: {}", err);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

/// Time one run of the recursive fibonacci program, like the classic
/// compiler-vs-interpreter shootout.
fn run_benchmark(engine: Engine, fib: u32) -> ExitCode {
    let source = format!(
        "let fibonacci = fn(x) {{
             if (x == 0) {{ 0 }} else {{
                 if (x == 1) {{ return 1; }}
                 else {{ fibonacci(x - 1) + fibonacci(x - 2); }}
             }}
         }};
         fibonacci({});",
        fib
    );

    let arena = Bump::new();
    let program = match parser::parse(&arena, &source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("parse error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let (result, duration) = match engine {
        Engine::Vm => {
            let mut compiler = Compiler::new();
            if let Err(err) = compiler.compile(&program) {
                eprintln!("compile error: {}", err);
                return ExitCode::FAILURE;
            }
            let mut vm = Vm::new(compiler.bytecode());
            let start = Instant::now();
            if let Err(err) = vm.run() {
                eprintln!("runtime error: {}", err);
                return ExitCode::FAILURE;
            }
            (vm.last_popped_stack_elem().to_string(), start.elapsed())
        }
        Engine::Eval => {
            let env = Environment::new();
            let start = Instant::now();
            match evaluator::eval_program(&program, &env) {
                Ok(value) => (value.to_string(), start.elapsed()),
                Err(err) => {
                    eprintln!("runtime error: {}", err);
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    println!(
        "engine={}, result={}, duration={:?}",
        engine.name(),
        result,
        duration
    );
    ExitCode::SUCCESS
}

fn repl(engine: Engine) -> ExitCode {
    println!(
        "{} ({} engine)",
        Color::Green.paint(concat!("tamarin ", env!("CARGO_PKG_VERSION"))),
        engine.name()
    );
    println!("Type expressions, Ctrl-D to exit.");

    tracing::debug!(engine = engine.name(), "starting REPL");
    let mut line_editor = Reedline::create();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic(">> ".to_string()),
        DefaultPromptSegment::Empty,
    );

    // Session state: the arena keeps every input's AST (and the values
    // referring into it) alive; compiler state and globals carry over
    // so bindings from earlier inputs stay addressable.
    let arena = Bump::new();
    let mut state: Option<(SymbolTable, Vec<Value>)> = None;
    let mut globals: Vec<Value> = vec![Value::Null; GLOBALS_SIZE];
    let env = Environment::new();

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let program = match parser::parse(&arena, &line) {
                    Ok(program) => program,
                    Err(err) => {
                        eprintln!("parse error: {}", err);
                        continue;
                    }
                };

                match engine {
                    Engine::Vm => {
                        let mut compiler = match state.take() {
                            Some((symbol_table, constants)) => {
                                Compiler::with_state(symbol_table, constants)
                            }
                            None => Compiler::new(),
                        };
                        let compiled = compiler.compile(&program);
                        let code = compiler.bytecode();
                        state = Some(compiler.into_state());
                        if let Err(err) = compiled {
                            eprintln!("compile error: {}", err);
                            continue;
                        }

                        let mut vm = Vm::with_globals(code, std::mem::take(&mut globals));
                        let ran = vm.run();
                        let result = vm.last_popped_stack_elem();
                        globals = vm.into_globals();
                        match ran {
                            Ok(()) => println!("{}", result),
                            Err(err) => eprintln!("runtime error: {}", err),
                        }
                    }
                    Engine::Eval => match evaluator::eval_program(&program, &env) {
                        Ok(value) => println!("{}", value),
                        Err(err) => eprintln!("runtime error: {}", err),
                    },
                }
            }
            Ok(Signal::CtrlC) => continue,
            Ok(Signal::CtrlD) => break,
            Err(err) => {
                eprintln!("input error: {}", err);
                break;
            }
        }
    }

    ExitCode::SUCCESS
}
