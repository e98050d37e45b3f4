use std::{
    io::{stdin, stdout, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;

use interpreter::{InterpretError, Interpreter};

// Exit codes as in BSD's sysexits.h
const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_SOFTWARE: u8 = 70;
const EX_IOERR: u8 = 74;

#[derive(clap::Parser)]
#[command(about = "Tree-walking interpreter for the krios scripting language")]
struct Args {
    /// Script to run. Starts an interactive prompt if omitted.
    file: Option<PathBuf>,
}

fn run_file(path: PathBuf) -> anyhow::Result<ExitCode> {
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Could not read '{}'", path.display()))?;

    let mut interpreter = Interpreter::new(stdout());
    match interpreter.run_source(&source) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{e}");
            Ok(exit_code(&e))
        }
    }
}

fn run_prompt() -> anyhow::Result<ExitCode> {
    let mut interpreter = Interpreter::new(stdout());
    loop {
        print!("> ");
        stdout().flush()?;

        let mut line = String::new();
        if stdin().read_line(&mut line)? == 0 {
            // EOF
            println!();
            return Ok(ExitCode::SUCCESS);
        }

        if let Err(e) = interpreter.run_source(&line) {
            eprintln!("{e}");
        }
    }
}

fn exit_code(error: &InterpretError) -> ExitCode {
    ExitCode::from(match error {
        InterpretError::Static(_) => EX_DATAERR,
        InterpretError::Runtime(_) => EX_SOFTWARE,
        InterpretError::Io(_) => EX_IOERR,
    })
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            e.print()?;
            // --help and --version also end up here
            return Ok(if e.use_stderr() { ExitCode::from(EX_USAGE) } else { ExitCode::SUCCESS });
        }
    };

    let result = match args.file {
        Some(file) => run_file(file),
        None => run_prompt(),
    };

    result.or_else(|e| {
        log::debug!("I/O failure: {e:?}");
        eprintln!("{e:#}");
        Ok(ExitCode::from(EX_IOERR))
    })
}
