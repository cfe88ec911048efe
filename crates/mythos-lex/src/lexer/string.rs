//! String literal lexing.

use mythos_util::Symbol;

use crate::token::{Token, TokenKind};
use crate::Lexer;

impl<'a> Lexer<'a> {
    /// Lex a string literal delimited by `"` or `'`.
    ///
    /// Recognised escapes: `\n \t \r \\ \" \'`. Any other backslash pair
    /// passes through verbatim, which is how `${...}` interpolation
    /// syntax stays inert. A raw line break or end of input inside the
    /// literal is an error.
    pub(super) fn lex_string(&mut self) -> Token {
        let quote = self.cursor().advance();
        let mut content = String::new();

        loop {
            if self.cursor().is_at_end() {
                return self.report_error("unterminated string literal");
            }

            let c = self.cursor().first();

            if c == quote {
                self.cursor().advance();
                break;
            }

            if c == '\n' {
                return self.report_error("unterminated string literal");
            }

            if c == '\\' {
                self.cursor().advance();
                let escaped = self.cursor().advance();
                match escaped {
                    'n' => content.push('\n'),
                    't' => content.push('\t'),
                    'r' => content.push('\r'),
                    '\\' => content.push('\\'),
                    '"' => content.push('"'),
                    '\'' => content.push('\''),
                    '\0' => return self.report_error("unterminated string literal"),
                    other => {
                        content.push('\\');
                        content.push(other);
                    }
                }
            } else {
                content.push(c);
                self.cursor().advance();
            }
        }

        self.make(TokenKind::Str(Symbol::intern(&content)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Lexer, TokenKind};
    use mythos_util::{Handler, Symbol};

    fn lex_one_string(source: &str) -> Symbol {
        let handler = Handler::new();
        let tokens = Lexer::new(source, &handler).tokenize();
        assert!(!handler.has_errors(), "lex error: {:?}", handler.first_error());
        match tokens[0].kind {
            TokenKind::Str(s) => s,
            ref other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_double_and_single_quotes() {
        assert_eq!(lex_one_string("\"hello\"").as_str(), "hello");
        assert_eq!(lex_one_string("'world'").as_str(), "world");
    }

    #[test]
    fn test_escape_sequences() {
        assert_eq!(lex_one_string(r#""a\nb\tc""#).as_str(), "a\nb\tc");
        assert_eq!(lex_one_string(r#""q\"q""#).as_str(), "q\"q");
        assert_eq!(lex_one_string(r#"'it\'s'"#).as_str(), "it's");
        assert_eq!(lex_one_string(r#""back\\slash""#).as_str(), "back\\slash");
    }

    #[test]
    fn test_other_quote_kind_is_plain() {
        assert_eq!(lex_one_string("\"it's\"").as_str(), "it's");
    }

    #[test]
    fn test_interpolation_syntax_passes_through() {
        assert_eq!(lex_one_string("\"v=${x}\"").as_str(), "v=${x}");
    }

    #[test]
    fn test_unknown_escape_passes_through() {
        assert_eq!(lex_one_string(r#""\q""#).as_str(), "\\q");
    }

    #[test]
    fn test_unterminated_at_eof() {
        let handler = Handler::new();
        Lexer::new("\"abc", &handler).tokenize();
        assert!(handler.has_errors());
        assert!(handler
            .first_error()
            .unwrap()
            .message
            .contains("unterminated"));
    }

    #[test]
    fn test_unterminated_at_newline() {
        let handler = Handler::new();
        Lexer::new("\"abc\ndef\"", &handler).tokenize();
        assert!(handler.has_errors());
    }
}
