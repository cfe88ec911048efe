//! Edge case tests for mythos-par.

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::test_support::*;

    // ==================== EDGE CASES ====================

    #[test]
    fn test_edge_blank_lines_and_comments_between_statements() {
        let source = "a = 1\n\n# a comment\n\nb = 2\n";
        let program = parse_source(source);
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_edge_deeply_nested_parens() {
        let depth = 64;
        let source = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        let program = parse_source(&source);
        let Stmt::Expr(stmt) = &program.body[0] else {
            panic!()
        };
        assert!(matches!(stmt.expr, Expr::Ident(_)));
    }

    #[test]
    fn test_edge_empty_block() {
        let Stmt::Block(block) = parse_source("{\n}").body.remove(0) else {
            panic!("expected block")
        };
        assert!(block.body.is_empty());
    }

    #[test]
    fn test_edge_empty_class() {
        let Stmt::Class(class) = parse_source("class Empty { }").body.remove(0) else {
            panic!("expected class")
        };
        assert!(class.methods.is_empty());
    }

    #[test]
    fn test_edge_semicolons_and_newlines_mixed() {
        let program = parse_source("a = 1;\nb = 2;; \n\n c = 3");
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_edge_lambda_inside_call_args() {
        let program = parse_source("apply((x) -> x + 1, 2)");
        let Stmt::Expr(stmt) = &program.body[0] else {
            panic!()
        };
        let Expr::Call(call) = &stmt.expr else {
            panic!("expected call")
        };
        assert_eq!(call.args.len(), 2);
        assert!(matches!(call.args[0], Expr::Lambda(_)));
    }

    #[test]
    fn test_edge_lambda_returning_lambda() {
        let program = parse_source("mk = (x) -> (y) -> x + y");
        let Stmt::Expr(stmt) = &program.body[0] else {
            panic!()
        };
        let Expr::Assign(assign) = &stmt.expr else {
            panic!()
        };
        let Expr::Lambda(outer) = &*assign.value else {
            panic!("expected lambda")
        };
        let LambdaBody::Expr(inner) = &outer.body else {
            panic!()
        };
        assert!(matches!(&**inner, Expr::Lambda(_)));
    }

    #[test]
    fn test_edge_method_call_on_call_result() {
        let program = parse_source("make().init().run()");
        let Stmt::Expr(stmt) = &program.body[0] else {
            panic!()
        };
        let Expr::MethodCall(outer) = &stmt.expr else {
            panic!("expected method call")
        };
        assert_eq!(outer.method.as_str(), "run");
        assert!(matches!(&*outer.recv, Expr::MethodCall(_)));
    }

    #[test]
    fn test_edge_index_then_member() {
        let program = parse_source("rows[0].name");
        let Stmt::Expr(stmt) = &program.body[0] else {
            panic!()
        };
        let Expr::Member(member) = &stmt.expr else {
            panic!("expected member")
        };
        assert!(matches!(&*member.object, Expr::Index(_)));
    }

    #[test]
    fn test_edge_unclosed_block_reports() {
        let message = parse_error("while x { a = 1");
        assert!(message.contains("expected"), "got: {}", message);
    }

    #[test]
    fn test_edge_unclosed_paren_reports() {
        let message = parse_error("f(1, 2");
        assert!(message.contains("expected"), "got: {}", message);
    }

    #[test]
    fn test_edge_stray_operator_reports() {
        let message = parse_error("* 2");
        assert!(message.contains("expected expression"), "got: {}", message);
    }

    #[test]
    fn test_edge_keywords_not_usable_as_identifiers() {
        assert!(parse_error("class = 1").contains("expected"));
    }

    #[test]
    fn test_edge_string_keys_with_spaces() {
        let program = parse_source("o = {\"full name\": \"Ada\"}");
        let Stmt::Expr(stmt) = &program.body[0] else {
            panic!()
        };
        let Expr::Assign(assign) = &stmt.expr else {
            panic!()
        };
        let Expr::Object(object) = &*assign.value else {
            panic!()
        };
        assert_eq!(object.entries[0].0.as_str(), "full name");
    }

    #[test]
    fn test_edge_spans_cover_tokens() {
        // Every statement's span should enclose its tokens.
        let source = "total = 1 + 2";
        let program = parse_source(source);
        let span = program.body[0].span();
        assert_eq!(span.start, 0);
        assert_eq!(span.end as usize, source.len());
    }
}
