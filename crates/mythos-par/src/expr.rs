//! Expression parsing using Pratt parsing (top-down operator precedence).
//!
//! # Operator precedence (lowest to highest)
//!
//! | Level | Operators | Associativity |
//! |-------|-----------|---------------|
//! | 1 | `=`, `+=`, `-=`, `*=`, `/=` | Right |
//! | 2 | `or` | Left |
//! | 3 | `and` | Left |
//! | 4 | `not` (prefix) | - |
//! | 5 | `==`, `!=` | Left |
//! | 6 | `<`, `>`, `<=`, `>=` | Left |
//! | 7 | `+`, `-` | Left |
//! | 8 | `*`, `/`, `%` | Left |
//! | 9 | `^` | Right |
//! | 10 | unary `-` (prefix) | - |
//! | 11 | call, `.member`, `[index]` (postfix) | - |
//!
//! Each infix operator has a pair of binding powers; left-associative
//! operators use `right = left + 1`, right-associative ones use
//! `right = left - 1`.

use mythos_lex::TokenKind;
use mythos_util::Span;

use crate::ast::*;
use crate::Parser;

/// Binding power levels for Pratt parsing.
/// Higher numbers bind tighter.
pub mod bp {
    /// Minimum binding power (start of expression).
    pub const MIN: u8 = 0;

    /// Right-hand side of an assignment (right-associative).
    pub const ASSIGN_RHS: u8 = 1;

    /// Operand of prefix `not`: binds past `and`/`or`, stops below `==`.
    pub const NOT_OPERAND: u8 = 8;

    /// Operand of prefix `-` and `await`: tighter than every infix
    /// operator; postfix still applies inside.
    pub const UNARY_OPERAND: u8 = 19;
}

/// Binding powers for the current infix token, if it is one.
///
/// Assignment operators are included here and handled specially in the
/// Pratt loop (target validation).
fn infix_binding_power(kind: &TokenKind) -> Option<(u8, u8)> {
    let pair = match kind {
        TokenKind::Eq
        | TokenKind::PlusEq
        | TokenKind::MinusEq
        | TokenKind::StarEq
        | TokenKind::SlashEq => (2, 1),
        TokenKind::Or => (3, 4),
        TokenKind::And => (5, 6),
        TokenKind::EqEq | TokenKind::NotEq => (9, 10),
        TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => (11, 12),
        TokenKind::Plus | TokenKind::Minus => (13, 14),
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => (15, 16),
        TokenKind::Caret => (18, 17),
        _ => return None,
    };
    Some(pair)
}

impl<'a> Parser<'a> {
    /// Pratt parser core: parse an expression consuming only operators
    /// whose left binding power is at least `min_bp`.
    pub(crate) fn parse_expr(&mut self, min_bp: u8) -> Option<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some((lbp, rbp)) = infix_binding_power(self.current_kind()) else {
                break;
            };
            if lbp < min_bp {
                break;
            }

            let op_kind = self.current_kind().clone();
            self.advance();
            let rhs = self.parse_expr(rbp)?;
            lhs = self.combine_infix(lhs, &op_kind, rhs)?;
        }

        Some(lhs)
    }

    /// Fold an infix application into the matching AST node.
    fn combine_infix(&mut self, lhs: Expr, op: &TokenKind, rhs: Expr) -> Option<Expr> {
        let span = lhs.span().merge(rhs.span());

        // Assignment: validate the target shape.
        let compound = match op {
            TokenKind::Eq => Some(None),
            TokenKind::PlusEq => Some(Some(BinOp::Add)),
            TokenKind::MinusEq => Some(Some(BinOp::Sub)),
            TokenKind::StarEq => Some(Some(BinOp::Mul)),
            TokenKind::SlashEq => Some(Some(BinOp::Div)),
            _ => None,
        };
        if let Some(op) = compound {
            if !matches!(lhs, Expr::Ident(_) | Expr::Member(_) | Expr::Index(_)) {
                self.error_at("invalid assignment target", lhs.span());
                return None;
            }
            return Some(Expr::Assign(AssignExpr {
                target: Box::new(lhs),
                op,
                value: Box::new(rhs),
                span,
            }));
        }

        if let Some(logical) = match op {
            TokenKind::And => Some(LogicalOp::And),
            TokenKind::Or => Some(LogicalOp::Or),
            _ => None,
        } {
            return Some(Expr::Logical(LogicalExpr {
                op: logical,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            }));
        }

        let binop = match op {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Mod,
            TokenKind::Caret => BinOp::Pow,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::NotEq,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::LtEq => BinOp::LtEq,
            TokenKind::GtEq => BinOp::GtEq,
            other => unreachable!("not an infix operator: {:?}", other),
        };
        Some(Expr::Binary(BinaryExpr {
            op: binop,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span,
        }))
    }

    /// Parse prefix operators, then fall through to postfix parsing.
    fn parse_prefix(&mut self) -> Option<Expr> {
        match self.current_kind() {
            TokenKind::Minus => {
                let start = self.current_span();
                self.advance();
                let operand = self.parse_expr(bp::UNARY_OPERAND)?;
                let span = start.merge(operand.span());
                Some(Expr::Unary(UnaryExpr {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                    span,
                }))
            }
            TokenKind::Not => {
                let start = self.current_span();
                self.advance();
                let operand = self.parse_expr(bp::NOT_OPERAND)?;
                let span = start.merge(operand.span());
                Some(Expr::Unary(UnaryExpr {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                    span,
                }))
            }
            TokenKind::Await => {
                let start = self.current_span();
                self.advance();
                let value = self.parse_expr(bp::UNARY_OPERAND)?;
                let span = start.merge(value.span());
                Some(Expr::Await(AwaitExpr {
                    value: Box::new(value),
                    span,
                }))
            }
            _ => self.parse_postfix(),
        }
    }

    /// Parse a primary expression followed by any chain of calls, member
    /// accesses, and index accesses.
    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let (args, close) = self.parse_args()?;
                    let span = expr.span().merge(close);
                    // `recv.name(args)` becomes a bound call.
                    expr = if let Expr::Member(member) = expr {
                        Expr::MethodCall(MethodCallExpr {
                            recv: member.object,
                            method: member.name,
                            args,
                            span,
                        })
                    } else {
                        Expr::Call(CallExpr {
                            callee: Box::new(expr),
                            args,
                            span,
                        })
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_span) = self.expect_ident()?;
                    let span = expr.span().merge(name_span);
                    expr = Expr::Member(MemberExpr {
                        object: Box::new(expr),
                        name,
                        span,
                    });
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr(bp::MIN)?;
                    let close = self.expect(&TokenKind::RBracket)?;
                    let span = expr.span().merge(close);
                    expr = Expr::Index(IndexExpr {
                        object: Box::new(expr),
                        index: Box::new(index),
                        span,
                    });
                }
                _ => break,
            }
        }

        Some(expr)
    }

    /// Parse `(args...)` after the opening paren has been consumed.
    /// Returns the arguments and the span of the closing paren.
    fn parse_args(&mut self) -> Option<(Vec<Expr>, Span)> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr(bp::MIN)?);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(&TokenKind::RParen)?;
        Some((args, close))
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let span = self.current_span();
        match self.current_kind() {
            TokenKind::Number(value) => {
                let value = *value;
                self.advance();
                Some(Expr::Number(NumberLit { value, span }))
            }
            TokenKind::Str(value) => {
                let value = *value;
                self.advance();
                Some(Expr::Str(StrLit { value, span }))
            }
            TokenKind::True => {
                self.advance();
                Some(Expr::Bool(BoolLit { value: true, span }))
            }
            TokenKind::False => {
                self.advance();
                Some(Expr::Bool(BoolLit { value: false, span }))
            }
            TokenKind::Null => {
                self.advance();
                Some(Expr::Null(NullLit { span }))
            }
            TokenKind::Ident(name) => {
                let name = *name;
                self.advance();
                Some(Expr::Ident(IdentExpr { name, span }))
            }
            TokenKind::This => {
                self.advance();
                Some(Expr::This(ThisExpr { span }))
            }
            TokenKind::Super => self.parse_super_call(),
            TokenKind::New => self.parse_new_expr(),
            TokenKind::LParen => self.parse_paren_or_lambda(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            _ => {
                self.error_expected("expression");
                None
            }
        }
    }

    /// Parse `super.name(args)`.
    fn parse_super_call(&mut self) -> Option<Expr> {
        let start = self.expect(&TokenKind::Super)?;
        self.expect(&TokenKind::Dot)?;
        let (method, _) = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let (args, close) = self.parse_args()?;
        Some(Expr::SuperCall(SuperCallExpr {
            method,
            args,
            span: start.merge(close),
        }))
    }

    /// Parse `new Class(args)`; the class part is an identifier possibly
    /// qualified by member accesses.
    fn parse_new_expr(&mut self) -> Option<Expr> {
        let start = self.expect(&TokenKind::New)?;

        let (name, name_span) = self.expect_ident()?;
        let mut class = Expr::Ident(IdentExpr {
            name,
            span: name_span,
        });
        while self.match_kind(&TokenKind::Dot) {
            let (member, member_span) = self.expect_ident()?;
            let span = class.span().merge(member_span);
            class = Expr::Member(MemberExpr {
                object: Box::new(class),
                name: member,
                span,
            });
        }

        self.expect(&TokenKind::LParen)?;
        let (args, close) = self.parse_args()?;
        Some(Expr::New(NewExpr {
            class: Box::new(class),
            args,
            span: start.merge(close),
        }))
    }

    /// On `(`: either an arrow function or a parenthesised expression.
    ///
    /// The arrow attempt runs with pure lookahead (no diagnostics); a
    /// failed guess rewinds to the saved token index.
    fn parse_paren_or_lambda(&mut self) -> Option<Expr> {
        let saved = self.save();
        if let Some(lambda) = self.try_parse_lambda() {
            return Some(lambda);
        }
        self.restore(saved);

        self.expect(&TokenKind::LParen)?;
        let expr = self.parse_expr(bp::MIN)?;
        self.expect(&TokenKind::RParen)?;
        Some(expr)
    }

    /// Speculative arrow-function parse: `(params) -> body`.
    ///
    /// Reports nothing until the `->` confirms the guess; from there on
    /// errors are real.
    fn try_parse_lambda(&mut self) -> Option<Expr> {
        let start = self.current_span();
        if !self.match_kind(&TokenKind::LParen) {
            return None;
        }

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let TokenKind::Ident(name) = *self.current_kind() else {
                    return None;
                };
                params.push(name);
                self.advance();
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if !self.match_kind(&TokenKind::RParen) {
            return None;
        }
        if !self.match_kind(&TokenKind::Arrow) {
            return None;
        }

        // Committed: a lambda for sure.
        let (body, end) = if self.check(&TokenKind::LBrace) {
            let block = self.parse_block()?;
            let end = block.span;
            (LambdaBody::Block(block), end)
        } else {
            let expr = self.parse_expr(bp::ASSIGN_RHS)?;
            let end = expr.span();
            (LambdaBody::Expr(Box::new(expr)), end)
        };

        Some(Expr::Lambda(LambdaExpr {
            params,
            body,
            span: start.merge(end),
        }))
    }

    /// Parse `[a, b, c]`.
    fn parse_array_literal(&mut self) -> Option<Expr> {
        let start = self.expect(&TokenKind::LBracket)?;
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expr(bp::MIN)?);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
                // tolerate a trailing comma
                if self.check(&TokenKind::RBracket) {
                    break;
                }
            }
        }
        let close = self.expect(&TokenKind::RBracket)?;
        Some(Expr::Array(ArrayLit {
            elements,
            span: start.merge(close),
        }))
    }

    /// Parse `{key: value, ...}`.
    ///
    /// Newlines are not suppressed inside braces, so entries may be
    /// separated by commas, newlines, or both.
    pub(crate) fn parse_object_literal(&mut self) -> Option<Expr> {
        let start = self.expect(&TokenKind::LBrace)?;
        self.skip_separators();

        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key = match self.current_kind() {
                TokenKind::Ident(name) => *name,
                TokenKind::Str(value) => *value,
                _ => {
                    self.error_expected("property name");
                    return None;
                }
            };
            self.advance();
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expr(bp::MIN)?;
            entries.push((key, value));

            self.skip_separators();
            if self.match_kind(&TokenKind::Comma) {
                self.skip_separators();
            } else if !self.check(&TokenKind::RBrace) {
                // entries on separate lines without commas are fine; two
                // entries on one line without a comma are not
                self.error_expected("',' or '}'");
                return None;
            }
        }

        let close = self.expect(&TokenKind::RBrace)?;
        Some(Expr::Object(ObjectLit {
            entries,
            span: start.merge(close),
        }))
    }
}
