//! mythos-util - Shared infrastructure for the Mythos pipeline.
//!
//! Every phase of the pipeline (lexer, parser, emitter, virtual machine)
//! depends on this crate for three things:
//!
//! - [`Span`] / [`FileId`] - source location tracking. Every token, AST
//!   node, and emitted instruction carries a span so that errors can be
//!   localised down to a line and column.
//! - [`Symbol`] - interned identifier strings. Interning turns identifier
//!   comparison into an integer comparison and lets tokens and AST nodes
//!   stay `Copy`-cheap.
//! - [`Diagnostic`] / [`Handler`] - error and warning collection. Phases
//!   report through a shared handler instead of threading error values
//!   through every function; the driver checks `has_errors()` between
//!   phases and aborts the pipeline on the first failing phase.
//!
//! The crate is deliberately free of language-specific knowledge: nothing
//! in here knows what a token or a value is.

mod diagnostic;
mod span;
mod symbol;

pub use diagnostic::{Diagnostic, Handler, Level};
pub use span::{FileId, Span};
pub use symbol::Symbol;
