//! mythos-lex - Lexical analysis for Mythos source text.
//!
//! The lexer transforms a stream of characters into a stream of tokens.
//! It is the first phase of the pipeline:
//!
//! ```text
//! source text --> [Lexer] --> tokens --> [Parser] --> AST --> ...
//! ```
//!
//! Design points that differ from a whitespace-blind lexer:
//!
//! - **Newlines are tokens.** A line break emits [`TokenKind::Newline`],
//!   which the parser uses as a soft statement terminator. Consecutive
//!   line breaks (including blank and comment-only lines) collapse into
//!   a single token.
//! - **Bracket suppression.** Inside parentheses and square brackets a
//!   nesting counter suppresses newline tokens entirely, so call
//!   argument lists and array literals can span lines freely. Braces do
//!   not suppress newlines: block bodies rely on them to separate
//!   statements.
//! - **Comments** start with `#` and run to end of line.
//! - **Halt on error.** An unterminated string or an unrecognised
//!   character reports through the [`Handler`](mythos_util::Handler)
//!   and lexing stops; subsequent calls return `Eof`.
//!
//! Tokens carry a [`Span`](mythos_util::Span) with byte offsets and the
//! 1-based line/column of their start.

pub mod cursor;
mod edge_cases;
pub mod lexer;
mod token;

pub use cursor::Cursor;
pub use lexer::Lexer;
pub use token::{keyword_from_ident, Token, TokenKind};
