//! Entrypoint for CLI
use std::{env, error::Error, fs, path::Path};

use jack_compiler::{
    compile_str,
    lex::{debug_print_lexer, Lexer},
};
use log::{error, info};

static USAGE: &str = r#"
usage: jackc CMD FILE

commands:
    compile  Compile the target class file into VM commands
    lex      Print the token table for the target class file

examples:
    jackc compile Main.jack
    jackc lex Main.jack
"#;

fn run_compile(filepath: impl AsRef<str>) -> Result<(), Box<dyn Error>> {
    let filepath = filepath.as_ref();
    info!("compiling {}", filepath);

    let file_bytes = fs::read(filepath)?;
    let source_code = String::from_utf8(file_bytes)?;

    match compile_str(source_code.as_str()) {
        Ok(commands) => {
            let outpath = Path::new(filepath).with_extension("vm");
            fs::write(&outpath, commands)?;
            info!("wrote {}", outpath.display());
            Ok(())
        }
        Err(err) => {
            error!("compile error in {}\n{}", filepath, err);
            // Exit process with error
            Err(err.into())
        }
    }
}

fn run_lexer(filepath: impl AsRef<str>) -> Result<(), Box<dyn Error>> {
    let file_bytes = fs::read(filepath.as_ref())?;
    let source_code = String::from_utf8(file_bytes)?;

    let lexer = Lexer::new(source_code.as_str());
    debug_print_lexer(lexer);

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    match parse_args() {
        Some(Cmd::Compile { filepath }) => run_compile(filepath)?,
        Some(Cmd::Lex { filepath }) => run_lexer(filepath)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(cmd) => match cmd.as_str() {
            "compile" => Some(Cmd::Compile {
                filepath: consume_arg(args)?,
            }),
            "lex" => Some(Cmd::Lex {
                filepath: consume_arg(args)?,
            }),
            _ => None,
        },
        None => None,
    }
}

/// Consumes the next argument, so the caller can print the usage text
/// if it doesn't exist.
fn consume_arg(mut args: impl Iterator<Item = String>) -> Option<String> {
    args.next()
}

fn print_usage() {
    println!("{USAGE}");
}

enum Cmd {
    /// Compile a class file
    Compile { filepath: String },
    /// Dump tokens
    Lex { filepath: String },
}
