use mico::ast::Statement;
use mico::builtins;
use mico::evaluator;
use mico::lexer::Lexer;
use mico::macros;
use mico::parser::Parser;
use mico::value::{Env, Environment, Value};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

const PROMPT: &str = "mico> ";

fn main() {
    env_logger::init();

    let result = panic::catch_unwind(run_repl);

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("Mico interactive interpreter");
    println!("Enter expressions like: let add = fn(a, b) {{ a + b }};");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");

    // Bindings and macro definitions persist across lines
    let env = Environment::new();
    let macro_env = Environment::new();

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&env, &macro_env);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                eval_line(line, &env, &macro_env);
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

/// Parse one input line, expand macros against the persistent macro
/// environment, evaluate, and print the result.
fn eval_line(line: &str, env: &Env, macro_env: &Env) {
    let mut parser = Parser::new(Lexer::new(line));
    let mut program = parser.parse_program();
    if !parser.errors().is_empty() {
        println!("Parse errors:");
        for error in parser.errors() {
            println!("  {error}");
        }
        return;
    }

    macros::define_macros(&mut program, macro_env);
    let program = match macros::expand_macros(program, macro_env) {
        Ok(program) => program,
        Err(error) => {
            println!("Error: {error}");
            return;
        }
    };

    // Don't echo anything for lines that end in a definition
    let quiet = matches!(program.statements.last(), None | Some(Statement::Let { .. }));

    match evaluator::eval_program(&program, env) {
        Ok(value) => {
            if !quiet {
                println!("{value}");
            }
        }
        Err(error) => println!("Error: {error}"),
    }
}

fn print_help() {
    println!("Mico interpreter:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current bindings, macros and builtins");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Language at a glance:");
    println!("  Values: 42, true, \"text\", [1, 2, 3], {{\"key\": \"value\"}}, null");
    println!("  Bindings: let x = 5;");
    println!("  Functions: let add = fn(a, b) {{ a + b }}; add(1, 2)");
    println!("  Conditionals: if (x > 0) {{ \"pos\" }} else {{ \"non-pos\" }}");
    println!("  Indexing: [10, 20, 30][1], {{\"a\": 1}}[\"a\"]");
    println!("  Macros: let unless = macro(c, a, b) {{ quote(if (!(unquote(c))) {{ unquote(a) }} else {{ unquote(b) }}) }};");
    println!();
    println!("Builtins:");
    for builtin in builtins::all() {
        println!("  {}", builtin.name);
    }
    println!();
}

fn print_environment(env: &Env, macro_env: &Env) {
    let builtin_names: Vec<&str> = builtins::all().iter().map(|b| b.name).collect();
    println!("Built-in functions ({}):", builtin_names.len());
    let mut col = 0;
    for name in &builtin_names {
        print!("  {name:<15}");
        col += 1;
        if col % 4 == 0 {
            println!();
        }
    }
    if col % 4 != 0 {
        println!();
    }
    println!();

    let macro_names = macro_env.local_names();
    if !macro_names.is_empty() {
        println!("Macros ({}):", macro_names.len());
        for name in &macro_names {
            if let Some(value) = macro_env.get(name) {
                println!("  {name} = {value}");
            }
        }
        println!();
    }

    let user_names = env.local_names();
    if user_names.is_empty() {
        println!("No user-defined bindings.");
        return;
    }
    println!("User-defined bindings ({}):", user_names.len());
    for name in &user_names {
        if let Some(value) = env.get(name) {
            match value {
                Value::String(text) => println!("  {name} = \"{}\"", text.as_str()),
                other => println!("  {name} = {other}"),
            }
        }
    }
}
