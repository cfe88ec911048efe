//! mythos-par - Syntactic analysis for Mythos.
//!
//! A hand-written recursive descent parser with a Pratt-style operator
//! precedence core for expressions:
//!
//! ```text
//! tokens --> [Parser] --> AST --> [Emitter] --> bytecode
//! ```
//!
//! Grammar notes:
//!
//! - Statements are separated by `Newline` or `;` tokens. Since the lexer
//!   suppresses newlines inside `(` / `[` pairs, expressions spanning
//!   lines need no continuation syntax.
//! - `{` at statement position opens a block, unless one token of
//!   lookahead shows `IDENT :` or `STRING :`, in which case it is an
//!   object literal in an expression statement. In expression position
//!   `{` is always an object literal.
//! - Arrow functions are recognised speculatively: on `(` the parser
//!   tries to read a parameter list followed by `->`, and rewinds to the
//!   saved token index on failure.
//! - The parser aborts at the first error. Errors go to the shared
//!   [`Handler`](mythos_util::Handler) as `expected ..., found ...`
//!   messages and every production returns `None` upward.

pub mod ast;
mod decl;
mod edge_cases;
pub mod expr;
pub mod printer;
mod stmt;

use mythos_lex::{Token, TokenKind};
use mythos_util::{Handler, Span, Symbol};

pub use ast::*;
pub use printer::print_program;

/// The Mythos parser.
///
/// Owns the token stream produced by [`mythos_lex::Lexer::tokenize`] and
/// walks it with one token of lookahead (plus explicit save/rewind for
/// arrow functions).
pub struct Parser<'a> {
    /// Token stream, terminated by `Eof`.
    tokens: Vec<Token>,

    /// Current position in the token stream.
    position: usize,

    /// Error handler.
    handler: &'a Handler,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, handler: &'a Handler) -> Self {
        debug_assert!(matches!(
            tokens.last().map(|t| &t.kind),
            Some(TokenKind::Eof)
        ));
        Self {
            tokens,
            position: 0,
            handler,
        }
    }

    /// Parse a whole program.
    ///
    /// Returns `None` after reporting the first error.
    pub fn parse_program(&mut self) -> Option<Program> {
        let start = self.current_span();
        let mut body = Vec::new();

        self.skip_separators();
        while !self.at_end() {
            let stmt = self.parse_stmt()?;
            body.push(stmt);
            self.expect_statement_end()?;
        }

        let span = match body.first() {
            Some(first) => first.span().merge(body.last().unwrap().span()),
            None => start,
        };
        Some(Program { body, span })
    }

    /// Parse the input as a single expression consuming all tokens.
    ///
    /// Used by the REPL to decide whether a line is an expression whose
    /// value should be printed.
    pub fn parse_expression_entry(&mut self) -> Option<ast::Expr> {
        self.skip_separators();
        let expr = self.parse_expr(expr::bp::MIN)?;
        self.skip_separators();
        if !self.at_end() {
            self.error_expected("end of input");
            return None;
        }
        Some(expr)
    }

    // =========================================================================
    // TOKEN STREAM HELPERS
    // =========================================================================

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    pub(crate) fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    pub(crate) fn current_span(&self) -> Span {
        self.current().span
    }

    /// Kind of the token `offset` places ahead (0 = current).
    pub(crate) fn peek_kind(&self, offset: usize) -> &TokenKind {
        let index = (self.position + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    pub(crate) fn previous_span(&self) -> Span {
        if self.position == 0 {
            self.current_span()
        } else {
            self.tokens[self.position - 1].span
        }
    }

    pub(crate) fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.position.min(self.tokens.len() - 1)];
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    /// True if the current token is `kind`. Only for payload-free kinds.
    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        debug_assert!(kind.is_simple());
        self.current_kind() == kind
    }

    /// Consume the current token if it is `kind`.
    pub(crate) fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token of `kind` or report an error.
    pub(crate) fn expect(&mut self, kind: &TokenKind) -> Option<Span> {
        if self.check(kind) {
            let span = self.current_span();
            self.advance();
            Some(span)
        } else {
            self.error_expected(&format!("'{}'", kind));
            None
        }
    }

    /// Consume an identifier or report an error.
    pub(crate) fn expect_ident(&mut self) -> Option<(Symbol, Span)> {
        if let TokenKind::Ident(name) = *self.current_kind() {
            let span = self.current_span();
            self.advance();
            Some((name, span))
        } else {
            self.error_expected("identifier");
            None
        }
    }

    /// Skip any run of newline / semicolon separators.
    pub(crate) fn skip_separators(&mut self) {
        while matches!(
            self.current_kind(),
            TokenKind::Newline | TokenKind::Semicolon
        ) {
            self.advance();
        }
    }

    /// Require a statement boundary: newline, `;`, `}`, or end of input.
    pub(crate) fn expect_statement_end(&mut self) -> Option<()> {
        match self.current_kind() {
            TokenKind::Newline | TokenKind::Semicolon => {
                self.skip_separators();
                Some(())
            }
            TokenKind::RBrace | TokenKind::Eof => Some(()),
            _ => {
                self.error_expected("newline or ';'");
                None
            }
        }
    }

    /// Saved stream position for speculative parsing.
    pub(crate) fn save(&self) -> usize {
        self.position
    }

    /// Rewind to a saved position.
    pub(crate) fn restore(&mut self, position: usize) {
        self.position = position;
    }

    /// Report `expected ..., found <current token>` at the current span.
    pub(crate) fn error_expected(&self, expected: &str) {
        self.handler.error(
            format!("expected {}, found {}", expected, self.current_kind()),
            self.current_span(),
        );
    }

    pub(crate) fn error_at(&self, message: impl Into<String>, span: Span) {
        self.handler.error(message, span);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use mythos_lex::Lexer;

    /// Lex and parse a program, panicking on any diagnostic.
    pub fn parse_source(source: &str) -> Program {
        let handler = Handler::new();
        let tokens = Lexer::new(source, &handler).tokenize();
        assert!(!handler.has_errors(), "lex error: {:?}", handler.first_error());
        let program = Parser::new(tokens, &handler).parse_program();
        assert!(
            !handler.has_errors(),
            "parse error: {:?}",
            handler.first_error()
        );
        program.expect("parser returned None without reporting")
    }

    /// Lex and parse, returning the first error message.
    pub fn parse_error(source: &str) -> String {
        let handler = Handler::new();
        let tokens = Lexer::new(source, &handler).tokenize();
        let result = Parser::new(tokens, &handler).parse_program();
        assert!(
            result.is_none() || handler.has_errors(),
            "expected a parse error for {:?}",
            source
        );
        handler
            .first_error()
            .map(|d| d.message)
            .unwrap_or_else(|| "no diagnostic".into())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_empty_program() {
        let program = parse_source("");
        assert!(program.body.is_empty());
    }

    #[test]
    fn test_statements_separated_by_newlines() {
        let program = parse_source("x = 1\ny = 2\n");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_statements_separated_by_semicolons() {
        let program = parse_source("x = 1; y = 2");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_missing_separator_is_an_error() {
        let message = parse_error("x = 1 y = 2");
        assert!(message.contains("expected newline"), "got: {}", message);
    }

    #[test]
    fn test_program_span_covers_statements() {
        let program = parse_source("a = 1\nb = 2");
        assert_eq!(program.span.line, 1);
        assert!(program.span.end > program.span.start);
    }

    #[test]
    fn test_expression_entry_accepts_expression() {
        let handler = Handler::new();
        let tokens = mythos_lex::Lexer::new("1 + 2 * 3", &handler).tokenize();
        let expr = Parser::new(tokens, &handler).parse_expression_entry();
        assert!(expr.is_some());
        assert!(!handler.has_errors());
    }

    #[test]
    fn test_expression_entry_rejects_statement() {
        let handler = Handler::new();
        let tokens = mythos_lex::Lexer::new("while x { }", &handler).tokenize();
        let expr = Parser::new(tokens, &handler).parse_expression_entry();
        assert!(expr.is_none());
    }
}
