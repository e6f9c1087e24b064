//! blang compiler CLI
//!
//! `blang <MODE> [-O <N>] [INFILE] [OUTFILE] [ERRFILE]` runs the
//! pipeline prefix the mode names. Missing file arguments default to
//! stdin, stdout and stderr. Diagnostics go to the error stream and any
//! failure exits with status 1.

use blang::{Config, Mode};
use clap::Parser as ClapParser;
use clap::error::ErrorKind;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

#[derive(ClapParser)]
#[command(name = "blang")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "blang compiler - lower blang programs to x86-32 assembly", long_about = None)]
struct Cli {
    /// Pipeline mode: scan, parse, print, resolve, typecheck, canonicalize,
    /// reduce, annotate, inline, prune, allocate or generate
    #[arg(value_parser = Mode::from_str)]
    mode: Mode,

    /// Run the optimization passes (reduce, annotate, inline, prune) N times
    #[arg(short = 'O', value_name = "N")]
    opt: Option<u32>,

    /// Input source file (defaults to stdin)
    infile: Option<PathBuf>,

    /// Output file (defaults to stdout)
    outfile: Option<PathBuf>,

    /// Error file (defaults to stderr)
    errfile: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => process::exit(0),
                _ => process::exit(1),
            }
        }
    };

    let mut err_stream = open_sink(cli.errfile.as_deref(), "error");
    let source = read_source(cli.infile.as_deref(), &mut err_stream);

    let config = Config::for_mode(cli.mode, cli.opt);
    match blang::compile(&source, cli.mode, &config) {
        Ok(output) => {
            let mut out_stream = open_sink(cli.outfile.as_deref(), "output");
            if out_stream.write_all(output.as_bytes()).is_err() {
                let _ = writeln!(err_stream, "failed to write output");
                process::exit(1);
            }
        }
        Err(diagnostic) => {
            let _ = writeln!(err_stream, "{}", diagnostic);
            process::exit(1);
        }
    }
}

fn read_source(path: Option<&Path>, err_stream: &mut Box<dyn Write>) -> String {
    let mut source = String::new();
    let result = match path {
        Some(path) => File::open(path)
            .map_err(|_| format!("input file '{}' cannot be opened", path.display()))
            .and_then(|mut file| {
                file.read_to_string(&mut source)
                    .map_err(|_| format!("input file '{}' cannot be read", path.display()))
            }),
        None => std::io::stdin()
            .read_to_string(&mut source)
            .map_err(|_| "stdin cannot be read".to_string()),
    };
    if let Err(message) = result {
        let _ = writeln!(err_stream, "{}", message);
        process::exit(1);
    }
    source
}

fn open_sink(path: Option<&Path>, what: &str) -> Box<dyn Write> {
    match path {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(file),
            Err(_) => {
                eprintln!("{} file '{}' cannot be opened", what, path.display());
                process::exit(1);
            }
        },
        None => {
            if what == "error" {
                Box::new(std::io::stderr())
            } else {
                Box::new(std::io::stdout())
            }
        }
    }
}
