//! Declaration parsing: functions, classes, scenes, web routes, imports.

use mythos_lex::TokenKind;
use mythos_util::Symbol;

use crate::ast::*;
use crate::expr::bp;
use crate::Parser;

impl<'a> Parser<'a> {
    /// Parse `function name(params) { body }`.
    ///
    /// The `async` keyword, if any, has already been consumed by the
    /// caller.
    pub(crate) fn parse_function_decl(&mut self, is_async: bool) -> Option<FunctionDecl> {
        let start = self.expect(&TokenKind::Function)?;
        let (name, _) = self.expect_ident()?;
        let params = self.parse_param_list()?;
        let body = self.parse_block()?;
        let span = start.merge(body.span);
        Some(FunctionDecl {
            name,
            params,
            body,
            is_async,
            span,
        })
    }

    /// Parse `(a, b, c)` parameter names.
    pub(crate) fn parse_param_list(&mut self) -> Option<Vec<Symbol>> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (name, _) = self.expect_ident()?;
                params.push(name);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Some(params)
    }

    /// Parse `class Name [extends Base] { methods }`.
    pub(crate) fn parse_class_decl(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Class)?;
        let (name, _) = self.expect_ident()?;

        let base = if self.match_kind(&TokenKind::Extends) {
            let (base_name, _) = self.expect_ident()?;
            Some(base_name)
        } else {
            None
        };

        self.expect(&TokenKind::LBrace)?;
        self.skip_separators();

        let mut methods = Vec::new();
        while self.check(&TokenKind::Function) {
            let method = self.parse_function_decl(false)?;
            methods.push(method);
            self.skip_separators();
        }

        let close = self.expect(&TokenKind::RBrace)?;
        Some(Stmt::Class(ClassDecl {
            name,
            base,
            methods,
            span: start.merge(close),
        }))
    }

    /// Parse `scene Name { body }`.
    pub(crate) fn parse_scene_decl(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Scene)?;
        let (name, _) = self.expect_ident()?;
        let body = self.parse_block()?;
        let span = start.merge(body.span);
        Some(Stmt::Scene(SceneDecl { name, body, span }))
    }

    /// True if the statement starts `web.app {`.
    pub(crate) fn is_web_app_head(&self) -> bool {
        let TokenKind::Ident(web) = self.peek_kind(0) else {
            return false;
        };
        if web.as_str() != "web" || !matches!(self.peek_kind(1), TokenKind::Dot) {
            return false;
        }
        let TokenKind::Ident(app) = self.peek_kind(2) else {
            return false;
        };
        app.as_str() == "app" && matches!(self.peek_kind(3), TokenKind::LBrace)
    }

    /// Parse `web.app { route "/path" { body } ... }`.
    pub(crate) fn parse_web_app_decl(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // web
        self.advance(); // .
        self.advance(); // app

        self.expect(&TokenKind::LBrace)?;
        self.skip_separators();

        let mut routes = Vec::new();
        while self.check(&TokenKind::Route) {
            let route_start = self.current_span();
            self.advance();
            let path = if let TokenKind::Str(path) = *self.current_kind() {
                self.advance();
                path
            } else {
                self.error_expected("route path string");
                return None;
            };
            let body = self.parse_block()?;
            let span = route_start.merge(body.span);
            routes.push(RouteDecl { path, body, span });
            self.skip_separators();
        }

        let close = self.expect(&TokenKind::RBrace)?;
        Some(Stmt::WebApp(WebAppDecl {
            routes,
            span: start.merge(close),
        }))
    }

    /// Parse `import name`.
    pub(crate) fn parse_import_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Import)?;
        let (module, end) = self.expect_ident()?;
        Some(Stmt::Import(ImportStmt {
            module,
            names: Vec::new(),
            span: start.merge(end),
        }))
    }

    /// Parse `from name import a, b`.
    pub(crate) fn parse_from_import_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::From)?;
        let (module, _) = self.expect_ident()?;
        self.expect(&TokenKind::Import)?;

        let mut names = Vec::new();
        loop {
            let (name, name_span) = self.expect_ident()?;
            names.push(name);
            if !self.match_kind(&TokenKind::Comma) {
                return Some(Stmt::Import(ImportStmt {
                    module,
                    names,
                    span: start.merge(name_span),
                }));
            }
        }
    }

    /// Parse `export <declaration>`.
    pub(crate) fn parse_export_stmt(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Export)?;
        let inner = self.parse_stmt()?;
        let span = start.merge(inner.span());
        Some(Stmt::Export(ExportStmt {
            inner: Box::new(inner),
            span,
        }))
    }

    /// Parse `const NAME = expr`.
    pub(crate) fn parse_const_decl(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Const)?;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expr(bp::ASSIGN_RHS)?;
        let span = start.merge(value.span());
        Some(Stmt::Const(ConstDecl { name, value, span }))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::test_support::*;

    fn single(source: &str) -> Stmt {
        let mut program = parse_source(source);
        assert_eq!(program.body.len(), 1, "expected one statement");
        program.body.remove(0)
    }

    #[test]
    fn test_function_declaration() {
        let Stmt::Function(decl) = single("function add(a, b) { return a + b }") else {
            panic!("expected function")
        };
        assert_eq!(decl.name.as_str(), "add");
        assert_eq!(decl.params.len(), 2);
        assert!(!decl.is_async);
    }

    #[test]
    fn test_function_without_params() {
        let Stmt::Function(decl) = single("function tick() { }") else {
            panic!("expected function")
        };
        assert!(decl.params.is_empty());
    }

    #[test]
    fn test_async_function_declaration() {
        let Stmt::Function(decl) = single("async function fetch_data() { }") else {
            panic!("expected function")
        };
        assert!(decl.is_async);
    }

    #[test]
    fn test_class_with_methods() {
        let source = "class Point {\nfunction constructor(x, y) { this.x = x }\nfunction norm() { return this.x }\n}";
        let Stmt::Class(decl) = single(source) else {
            panic!("expected class")
        };
        assert_eq!(decl.name.as_str(), "Point");
        assert!(decl.base.is_none());
        assert_eq!(decl.methods.len(), 2);
        assert_eq!(decl.methods[0].name.as_str(), "constructor");
    }

    #[test]
    fn test_class_extends() {
        let Stmt::Class(decl) = single("class Dog extends Animal { }") else {
            panic!("expected class")
        };
        assert_eq!(decl.base.unwrap().as_str(), "Animal");
    }

    #[test]
    fn test_scene_declaration() {
        let Stmt::Scene(decl) = single("scene Intro { spawn() }") else {
            panic!("expected scene")
        };
        assert_eq!(decl.name.as_str(), "Intro");
        assert_eq!(decl.body.body.len(), 1);
    }

    #[test]
    fn test_web_app_with_routes() {
        let source = "web.app {\nroute \"/\" { home() }\nroute \"/about\" { about() }\n}";
        let Stmt::WebApp(decl) = single(source) else {
            panic!("expected web.app")
        };
        assert_eq!(decl.routes.len(), 2);
        assert_eq!(decl.routes[1].path.as_str(), "/about");
    }

    #[test]
    fn test_web_member_access_is_not_an_app_block() {
        // `web.start(8000)` must stay an ordinary method call.
        let Stmt::Expr(stmt) = single("web.start(8000)") else {
            panic!("expected expression")
        };
        assert!(matches!(stmt.expr, Expr::MethodCall(_)));
    }

    #[test]
    fn test_import_statement() {
        let Stmt::Import(stmt) = single("import physics") else {
            panic!("expected import")
        };
        assert_eq!(stmt.module.as_str(), "physics");
        assert!(stmt.names.is_empty());
    }

    #[test]
    fn test_from_import_statement() {
        let Stmt::Import(stmt) = single("from geometry import circle, square") else {
            panic!("expected import")
        };
        assert_eq!(stmt.module.as_str(), "geometry");
        assert_eq!(stmt.names.len(), 2);
    }

    #[test]
    fn test_export_declaration() {
        let Stmt::Export(stmt) = single("export function api() { }") else {
            panic!("expected export")
        };
        assert!(matches!(*stmt.inner, Stmt::Function(_)));
    }

    #[test]
    fn test_const_declaration() {
        let Stmt::Const(stmt) = single("const LIMIT = 100") else {
            panic!("expected const")
        };
        assert_eq!(stmt.name.as_str(), "LIMIT");
        assert!(matches!(stmt.value, Expr::Number(_)));
    }
}
