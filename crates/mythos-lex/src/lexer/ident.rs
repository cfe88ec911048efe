//! Identifier and keyword lexing.

use mythos_util::Symbol;

use crate::token::{keyword_from_ident, Token, TokenKind};
use crate::Lexer;

impl<'a> Lexer<'a> {
    /// Lex an identifier and promote reserved words to keyword tokens.
    pub(super) fn lex_ident(&mut self) -> Token {
        self.cursor()
            .advance_while(|c| c == '_' || c.is_ascii_alphanumeric());

        let start = self.token_start();
        let end = self.cursor().position();
        let text = self.cursor().slice(start, end);

        match keyword_from_ident(text) {
            Some(keyword) => self.make(keyword),
            None => self.make(TokenKind::Ident(Symbol::intern(text))),
        }
    }
}
