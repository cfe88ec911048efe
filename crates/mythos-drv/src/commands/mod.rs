//! CLI subcommand implementations.

pub mod build;
pub mod repl;
pub mod run;
