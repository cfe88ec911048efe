//! Numeric literal lexing.

use crate::token::{Token, TokenKind};
use crate::Lexer;

impl<'a> Lexer<'a> {
    /// Lex a number: digits, optional decimal part, optional exponent.
    ///
    /// A `.` is only consumed when followed by a digit, so `3.times` lexes
    /// as `3` `.` `times`. The exponent form is `e`/`E`, optional sign,
    /// and at least one digit.
    pub(super) fn lex_number(&mut self) -> Token {
        self.cursor().advance_while(|c| c.is_ascii_digit());

        if self.cursor().first() == '.' && self.cursor().second().is_ascii_digit() {
            self.cursor().advance();
            self.cursor().advance_while(|c| c.is_ascii_digit());
        }

        if matches!(self.cursor().first(), 'e' | 'E') {
            let next = self.cursor().second();
            if next.is_ascii_digit() {
                self.cursor().advance();
                self.cursor().advance_while(|c| c.is_ascii_digit());
            } else if next == '+' || next == '-' {
                self.cursor().advance();
                self.cursor().advance();
                if !self.cursor().first().is_ascii_digit() {
                    return self.report_error("malformed exponent in number literal");
                }
                self.cursor().advance_while(|c| c.is_ascii_digit());
            }
            // A bare `e` not followed by digits or a sign is left for the
            // identifier lexer: `2e` is `2` then `e`.
        }

        let start = self.token_start();
        let end = self.cursor().position();
        let text = self.cursor().slice(start, end);
        match text.parse::<f64>() {
            Ok(value) => self.make(TokenKind::Number(value)),
            Err(_) => self.report_error(format!("invalid number literal '{}'", text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Lexer, TokenKind};
    use mythos_util::Handler;

    fn lex_one_number(source: &str) -> f64 {
        let handler = Handler::new();
        let tokens = Lexer::new(source, &handler).tokenize();
        assert!(!handler.has_errors());
        match tokens[0].kind {
            TokenKind::Number(n) => n,
            ref other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_integer() {
        assert_eq!(lex_one_number("42"), 42.0);
    }

    #[test]
    fn test_decimal() {
        assert_eq!(lex_one_number("3.25"), 3.25);
    }

    #[test]
    fn test_exponent_forms() {
        assert_eq!(lex_one_number("1e3"), 1000.0);
        assert_eq!(lex_one_number("2.5e2"), 250.0);
        assert_eq!(lex_one_number("5e-1"), 0.5);
        assert_eq!(lex_one_number("5e+1"), 50.0);
    }

    #[test]
    fn test_dot_without_digit_is_member_access() {
        let handler = Handler::new();
        let tokens = Lexer::new("3.times", &handler).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Number(3.0));
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }

    #[test]
    fn test_bare_e_suffix_is_identifier() {
        let handler = Handler::new();
        let tokens = Lexer::new("2e", &handler).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Number(2.0));
        assert!(matches!(tokens[1].kind, TokenKind::Ident(_)));
    }

    #[test]
    fn test_signed_exponent_without_digits_errors() {
        let handler = Handler::new();
        Lexer::new("1e+", &handler).tokenize();
        assert!(handler.has_errors());
    }
}
