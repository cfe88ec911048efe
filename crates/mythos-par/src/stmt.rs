//! Statement parsing.

use mythos_lex::TokenKind;
use mythos_util::Symbol;

use crate::ast::*;
use crate::expr::bp;
use crate::Parser;

impl<'a> Parser<'a> {
    /// Parse one statement.
    pub(crate) fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.current_kind() {
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Break => {
                let span = self.current_span();
                self.advance();
                Some(Stmt::Break(BreakStmt { span }))
            }
            TokenKind::Continue => {
                let span = self.current_span();
                self.advance();
                Some(Stmt::Continue(ContinueStmt { span }))
            }
            TokenKind::Try => self.parse_try_stmt(),
            TokenKind::Throw => self.parse_throw_stmt(),
            TokenKind::Match => self.parse_match_stmt(),
            TokenKind::Function => self.parse_function_decl(false).map(Stmt::Function),
            TokenKind::Async if matches!(self.peek_kind(1), TokenKind::Function) => {
                self.advance();
                self.parse_function_decl(true).map(Stmt::Function)
            }
            TokenKind::Class => self.parse_class_decl(),
            TokenKind::Scene => self.parse_scene_decl(),
            TokenKind::Import => self.parse_import_stmt(),
            TokenKind::From => self.parse_from_import_stmt(),
            TokenKind::Export => self.parse_export_stmt(),
            TokenKind::Const => self.parse_const_decl(),
            TokenKind::Ident(_) if self.is_web_app_head() => self.parse_web_app_decl(),
            TokenKind::LBrace => {
                if self.starts_object_literal() {
                    self.parse_expr_stmt()
                } else {
                    self.parse_block().map(Stmt::Block)
                }
            }
            _ => self.parse_expr_stmt(),
        }
    }

    /// One token of lookahead past `{`: `IDENT :` or `STRING :` means an
    /// object literal rather than a block.
    fn starts_object_literal(&self) -> bool {
        matches!(
            self.peek_kind(1),
            TokenKind::Ident(_) | TokenKind::Str(_)
        ) && matches!(self.peek_kind(2), TokenKind::Colon)
    }

    fn parse_expr_stmt(&mut self) -> Option<Stmt> {
        let expr = self.parse_expr(bp::MIN)?;
        let span = expr.span();
        Some(Stmt::Expr(ExprStmt { expr, span }))
    }

    /// Parse a braced statement list.
    pub(crate) fn parse_block(&mut self) -> Option<Block> {
        let open = self.expect(&TokenKind::LBrace)?;
        self.skip_separators();

        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            let stmt = self.parse_stmt()?;
            body.push(stmt);
            self.expect_statement_end()?;
        }

        let close = self.expect(&TokenKind::RBrace)?;
        Some(Block {
            body,
            span: open.merge(close),
        })
    }

    fn parse_if_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::If)?;

        let cond = self.parse_expr(bp::MIN)?;
        let then_block = self.parse_block()?;

        let mut elif_branches = Vec::new();
        while self.match_kind(&TokenKind::Elif) {
            let elif_cond = self.parse_expr(bp::MIN)?;
            let elif_block = self.parse_block()?;
            elif_branches.push((elif_cond, elif_block));
        }

        let else_block = if self.match_kind(&TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };

        let end = else_block
            .as_ref()
            .map(|b| b.span)
            .or_else(|| elif_branches.last().map(|(_, b)| b.span))
            .unwrap_or(then_block.span);
        Some(Stmt::If(IfStmt {
            cond,
            then_block,
            elif_branches,
            else_block,
            span: start.merge(end),
        }))
    }

    fn parse_while_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::While)?;
        let cond = self.parse_expr(bp::MIN)?;
        let body = self.parse_block()?;
        let span = start.merge(body.span);
        Some(Stmt::While(WhileStmt { cond, body, span }))
    }

    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::For)?;
        let (var, _) = self.expect_ident()?;
        self.expect(&TokenKind::In)?;
        let iterable = self.parse_expr(bp::MIN)?;
        let body = self.parse_block()?;
        let span = start.merge(body.span);
        Some(Stmt::ForIn(ForInStmt {
            var,
            iterable,
            body,
            span,
        }))
    }

    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Return)?;

        let value = if matches!(
            self.current_kind(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) {
            None
        } else {
            Some(self.parse_expr(bp::MIN)?)
        };

        let span = value
            .as_ref()
            .map(|v| start.merge(v.span()))
            .unwrap_or(start);
        Some(Stmt::Return(ReturnStmt { value, span }))
    }

    fn parse_try_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Try)?;
        let body = self.parse_block()?;

        let catch = if self.check(&TokenKind::Catch) {
            let catch_start = self.current_span();
            self.advance();
            // `catch e`, `catch (e)`, or bare `catch`
            let binding = if self.match_kind(&TokenKind::LParen) {
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::RParen)?;
                name
            } else if let TokenKind::Ident(name) = *self.current_kind() {
                self.advance();
                name
            } else {
                Symbol::intern("_")
            };
            let catch_body = self.parse_block()?;
            let span = catch_start.merge(catch_body.span);
            Some(CatchClause {
                binding,
                body: catch_body,
                span,
            })
        } else {
            None
        };

        let finally = if self.match_kind(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if catch.is_none() && finally.is_none() {
            self.error_expected("'catch' or 'finally'");
            return None;
        }

        let end = finally
            .as_ref()
            .map(|b| b.span)
            .or_else(|| catch.as_ref().map(|c| c.span))
            .unwrap_or(body.span);
        Some(Stmt::Try(TryStmt {
            body,
            catch,
            finally,
            span: start.merge(end),
        }))
    }

    fn parse_throw_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Throw)?;
        let value = self.parse_expr(bp::MIN)?;
        let span = start.merge(value.span());
        Some(Stmt::Throw(ThrowStmt { value, span }))
    }

    fn parse_match_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Match)?;
        let subject = self.parse_expr(bp::MIN)?;

        self.expect(&TokenKind::LBrace)?;
        self.skip_separators();

        let mut arms = Vec::new();
        let mut default = None;
        loop {
            if self.check(&TokenKind::Case) {
                let case_start = self.current_span();
                self.advance();
                let value = self.parse_expr(bp::MIN)?;
                let body = self.parse_block()?;
                let span = case_start.merge(body.span);
                arms.push(MatchArm { value, body, span });
                self.skip_separators();
            } else if self.check(&TokenKind::Default) {
                if default.is_some() {
                    self.error_expected("'}' (duplicate default arm)");
                    return None;
                }
                self.advance();
                default = Some(self.parse_block()?);
                self.skip_separators();
            } else {
                break;
            }
        }

        if arms.is_empty() && default.is_none() {
            self.error_expected("'case'");
            return None;
        }

        let close = self.expect(&TokenKind::RBrace)?;
        Some(Stmt::Match(MatchStmt {
            subject,
            arms,
            default,
            span: start.merge(close),
        }))
    }
}
