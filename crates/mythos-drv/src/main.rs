//! The `mythos` command line interface.
//!
//! Subcommands: `run` (execute a script or code image, with `--emit`
//! dumps of intermediate phases), `repl` (interactive session), and
//! `build` (write a compiled code image). Exit codes: 0 on success,
//! 1 for compile errors, 2 for runtime errors.

mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mythos_drv::EmitKind;

/// The Mythos scripting language.
#[derive(Parser, Debug)]
#[command(name = "mythos")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compiler and virtual machine for the Mythos language", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose pipeline logging
    #[arg(short, long, global = true, env = "MYTHOS_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile and run a script (or a compiled .mythc image)
    Run(RunArgs),

    /// Start an interactive read-evaluate-print loop
    Repl,

    /// Compile a script to a code image on disk
    Build(BuildArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the .mythos source file or .mythc image
    file: PathBuf,

    /// Dump an intermediate form instead of executing
    #[arg(long, value_enum)]
    emit: Option<EmitArg>,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Path to the .mythos source file
    file: PathBuf,

    /// Output path (defaults to the input with a .mythc extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EmitArg {
    Tokens,
    Ast,
    Bytecode,
}

impl From<EmitArg> for EmitKind {
    fn from(arg: EmitArg) -> Self {
        match arg {
            EmitArg::Tokens => EmitKind::Tokens,
            EmitArg::Ast => EmitKind::Ast,
            EmitArg::Bytecode => EmitKind::Bytecode,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args.file, args.emit.map(Into::into)),
        Commands::Repl => commands::repl::execute(),
        Commands::Build(args) => commands::build::execute(args.file, args.output),
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(err.exit_code());
    }
}
