//! Operator and punctuation lexing.

use crate::token::{Token, TokenKind};
use crate::Lexer;

impl<'a> Lexer<'a> {
    /// Lex an operator or punctuation token, longest match first.
    ///
    /// `(` and `[` raise the newline-suppression nesting depth; their
    /// closers lower it.
    pub(super) fn lex_operator(&mut self) -> Token {
        let c = self.cursor().advance();
        let kind = match c {
            '+' => {
                if self.cursor().eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.cursor().eat('=') {
                    TokenKind::MinusEq
                } else if self.cursor().eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.cursor().eat('=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.cursor().eat('=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '=' => {
                if self.cursor().eat('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.cursor().eat('=') {
                    TokenKind::NotEq
                } else {
                    return self.report_error("unexpected character '!'");
                }
            }
            '<' => {
                if self.cursor().eat('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.cursor().eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '(' => {
                self.bump_nesting();
                TokenKind::LParen
            }
            ')' => {
                self.drop_nesting();
                TokenKind::RParen
            }
            '[' => {
                self.bump_nesting();
                TokenKind::LBracket
            }
            ']' => {
                self.drop_nesting();
                TokenKind::RBracket
            }
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            other => {
                return self.report_error(format!("unexpected character '{}'", other));
            }
        };
        self.make(kind)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Lexer, TokenKind};
    use mythos_util::Handler;

    fn lex_kinds(source: &str) -> Vec<TokenKind> {
        let handler = Handler::new();
        let tokens = Lexer::new(source, &handler).tokenize();
        assert!(!handler.has_errors());
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_longest_match_wins() {
        assert_eq!(
            lex_kinds("== = <= < += -> -"),
            vec![
                TokenKind::EqEq,
                TokenKind::Eq,
                TokenKind::LtEq,
                TokenKind::Lt,
                TokenKind::PlusEq,
                TokenKind::Arrow,
                TokenKind::Minus,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_compound_assignment_operators() {
        assert_eq!(
            lex_kinds("+= -= *= /="),
            vec![
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            lex_kinds("( ) { } [ ] , . : ;"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Colon,
                TokenKind::Semicolon,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_bang_alone_is_an_error() {
        let handler = Handler::new();
        Lexer::new("a ! b", &handler).tokenize();
        assert!(handler.has_errors());
    }

    #[test]
    fn test_arithmetic_chain_without_spaces() {
        assert_eq!(
            lex_kinds("1+2*3^4%5"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.0),
                TokenKind::Star,
                TokenKind::Number(3.0),
                TokenKind::Caret,
                TokenKind::Number(4.0),
                TokenKind::Percent,
                TokenKind::Number(5.0),
                TokenKind::Eof
            ]
        );
    }
}
