use std::{path::PathBuf, process::ExitCode};

use clap::{error::ErrorKind as ClapErrorKind, ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use resin::{loader, HostConfig, Interpreter, ResinError};

const EXIT_OK: u8 = 0;
const EXIT_ARGS: u8 = 1;
const EXIT_SCRIPT: u8 = 2;
const EXIT_INIT: u8 = 3;
const EXIT_RUN: u8 = 4;

const LOG_ENV: &str = "RESIN_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "resin",
    version,
    about = "Run a resin script",
    disable_version_flag = true
)]
struct Args {
    /// Add DIR to the front of the module search path
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Print version information
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Script to run; `-` or nothing reads standard input
    script: Option<String>,

    /// Arguments made available to the script as `arguments`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    arguments: Vec<String>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => EXIT_OK,
                _ => EXIT_ARGS,
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };
    init_tracing();
    ExitCode::from(run(args))
}

fn run(args: Args) -> u8 {
    let script = args.script.as_deref().filter(|script| *script != "-");
    let source = match loader::load_source(script.map(std::path::Path::new)) {
        Ok(source) => source,
        Err(err) => {
            report(&err);
            return EXIT_SCRIPT;
        }
    };
    if source.is_empty() {
        return EXIT_OK;
    }

    let config = match HostConfig::from_env().and_then(|config| config.with_include_dirs(args.include)) {
        Ok(config) => config.with_arguments(args.arguments),
        Err(err) => {
            report(&err);
            return EXIT_INIT;
        }
    };
    tracing::debug!(search_path = ?config.search_path, "starting interpreter");

    let mut interpreter = Interpreter::with_config(config);
    match interpreter.eval_script(source) {
        Ok(_) => EXIT_OK,
        Err(ResinError::Exit(code)) => code,
        Err(err) => {
            report(&err);
            EXIT_RUN
        }
    }
}

fn report(err: &ResinError) {
    let location = err.location().map(ToString::to_string).unwrap_or_default();
    eprintln!("{}: {}{location}", err.error_name(), err.message());
    if let ResinError::Diagnostic(diag) = err {
        for note in &diag.notes {
            eprintln!("  note: {note}");
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
