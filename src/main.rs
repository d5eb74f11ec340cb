use clap::{crate_version, App, Arg, ErrorKind};
use log::debug;
use lox_treewalk::lox::render;
use lox_treewalk::{Lox, LoxOptions};
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;

const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;
const EX_IOERR: i32 = 74;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let app = App::new("lox")
        .version(crate_version!())
        .about("A tree-walking interpreter for the Lox language")
        .arg(
            Arg::with_name("script")
                .help("Script to run. Starts an interactive prompt if omitted.")
                .index(1),
        )
        .arg(
            Arg::with_name("print-ast")
                .long("print-ast")
                .help("Print the parsed syntax tree instead of running it"),
        );
    let matches = match app.get_matches_safe() {
        Ok(matches) => matches,
        Err(e) => match e.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => e.exit(),
            _ => {
                eprintln!("{}", e.message);
                process::exit(EX_USAGE);
            }
        },
    };
    let print_ast = matches.is_present("print-ast");
    match matches.value_of("script") {
        Some(script) => run_file(script, print_ast),
        None => run_prompt(print_ast),
    }
}

fn run_file(path: &str, print_ast: bool) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read {}: {}", path, e);
            process::exit(EX_IOERR);
        }
    };
    debug!("running {} ({} bytes)", path, source.len());
    let stdout = io::stdout();
    let mut lox = Lox::new(LoxOptions { repl: false }, stdout.lock());
    if !run(&mut lox, &source, print_ast) {
        let diagnostics = lox.diagnostics();
        if diagnostics.had_error() {
            process::exit(EX_DATAERR);
        }
        if diagnostics.had_runtime_error() {
            process::exit(EX_SOFTWARE);
        }
    }
}

fn run_prompt(print_ast: bool) {
    let mut lox = Lox::new(LoxOptions { repl: true }, io::stdout());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return;
        }
        match lines.next() {
            Some(Ok(line)) => {
                run(&mut lox, &line, print_ast);
            }
            Some(Err(e)) => {
                eprintln!("{}", e);
                process::exit(EX_IOERR);
            }
            None => return,
        }
    }
}

/// Runs one unit of source and reports its errors. Returns false if any
/// error was reported.
fn run<W: Write>(lox: &mut Lox<W>, source: &str, print_ast: bool) -> bool {
    if print_ast {
        if let Some(printed) = lox.print_ast(source) {
            println!("{}", printed);
        }
    } else {
        lox.run(source);
    }
    let errors = lox.diagnostics().errors();
    for error in errors {
        eprintln!("{}", render(error, source));
    }
    errors.is_empty()
}
