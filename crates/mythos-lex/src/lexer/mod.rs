//! Main lexer implementation.
//!
//! The lexer produces tokens on demand via [`Lexer::next_token`], or all
//! at once via [`Lexer::tokenize`]. It dispatches on the first character
//! of each token; literal handling lives in the sibling submodules.

mod ident;
mod number;
mod operator;
mod string;

use mythos_util::{FileId, Handler, Span};

use crate::cursor::Cursor;
use crate::token::{Token, TokenKind};

/// The Mythos lexer.
///
/// Holds a [`Cursor`] for position tracking and reports errors through a
/// shared [`Handler`]. After the first error the lexer halts: every
/// subsequent call returns `Eof`.
pub struct Lexer<'a> {
    /// Character cursor over the source.
    cursor: Cursor<'a>,

    /// Diagnostic handler for error reporting.
    handler: &'a Handler,

    /// File the source came from, stamped into every span.
    file: FileId,

    /// Depth of open `(` and `[` pairs. Newlines are suppressed while
    /// positive. Braces intentionally do not contribute: block bodies
    /// need newline terminators.
    nesting: u32,

    /// Set when a lex error has been reported; lexing halts.
    failed: bool,

    /// Start position of the token being lexed.
    token_start: u32,
    token_line: u32,
    token_column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, handler: &'a Handler) -> Self {
        Self::with_file(source, handler, FileId::DUMMY)
    }

    pub fn with_file(source: &'a str, handler: &'a Handler, file: FileId) -> Self {
        Self {
            cursor: Cursor::new(source),
            handler,
            file,
            nesting: 0,
            failed: false,
            token_start: 0,
            token_line: 1,
            token_column: 1,
        }
    }

    /// Lex the entire input, including the trailing `Eof` token.
    ///
    /// On error the returned stream ends early at `Eof`; the error is in
    /// the handler.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Token {
        if self.failed {
            return self.make(TokenKind::Eof);
        }

        if let Some(newline) = self.skip_insignificant() {
            return newline;
        }

        self.mark_start();

        if self.cursor.is_at_end() {
            return self.make(TokenKind::Eof);
        }

        match self.cursor.first() {
            c if c.is_ascii_digit() => self.lex_number(),
            c if c == '_' || c.is_ascii_alphabetic() => self.lex_ident(),
            '"' | '\'' => self.lex_string(),
            _ => self.lex_operator(),
        }
    }

    /// Skip spaces, tabs, carriage returns, and comments. When a line
    /// break is significant (not nested inside `(`/`[`), consume the
    /// whole run of blank and comment-only lines and return a single
    /// collapsed `Newline` token.
    fn skip_insignificant(&mut self) -> Option<Token> {
        let mut newline: Option<Token> = None;
        loop {
            match self.cursor.first() {
                ' ' | '\t' | '\r' => {
                    self.cursor.advance();
                }
                '#' => {
                    self.cursor.advance_while(|c| c != '\n');
                }
                '\n' => {
                    if newline.is_none() && self.nesting == 0 {
                        self.mark_start();
                        self.cursor.advance();
                        newline = Some(self.make(TokenKind::Newline));
                    } else {
                        self.cursor.advance();
                    }
                }
                _ => return newline,
            }
        }
    }

    /// Record the start position of the current token.
    fn mark_start(&mut self) {
        self.token_start = self.cursor.position();
        self.token_line = self.cursor.line();
        self.token_column = self.cursor.column();
    }

    /// Build a token spanning from the recorded start to the cursor.
    fn make(&self, kind: TokenKind) -> Token {
        let span = Span {
            start: self.token_start,
            end: self.cursor.position(),
            line: self.token_line,
            column: self.token_column,
            file: self.file,
        };
        Token::new(kind, span)
    }

    /// Report a lex error and halt.
    fn report_error(&mut self, message: impl Into<String>) -> Token {
        let span = Span {
            start: self.token_start,
            end: self.cursor.position(),
            line: self.token_line,
            column: self.token_column,
            file: self.file,
        };
        self.handler.error(message, span);
        self.failed = true;
        self.make(TokenKind::Eof)
    }

    pub(crate) fn cursor(&mut self) -> &mut Cursor<'a> {
        &mut self.cursor
    }

    pub(crate) fn bump_nesting(&mut self) {
        self.nesting += 1;
    }

    pub(crate) fn drop_nesting(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    pub(crate) fn token_start(&self) -> u32 {
        self.token_start
    }
}
