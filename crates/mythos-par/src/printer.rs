//! AST to source text.
//!
//! Prints a parsed program back as Mythos source. Comments are gone by
//! then and redundant parentheses are not reproduced, but the printed
//! text parses to a structurally identical AST: printing is a fixpoint
//! (`print(parse(print(parse(s)))) == print(parse(s))`), which is what
//! the round-trip tests lean on.

use crate::ast::*;

/// Binding strength used to decide where parentheses are needed.
/// Mirrors the parser's precedence ladder.
fn bin_prec(op: BinOp) -> u8 {
    match op {
        BinOp::Eq | BinOp::NotEq => 5,
        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => 6,
        BinOp::Add | BinOp::Sub => 7,
        BinOp::Mul | BinOp::Div | BinOp::Mod => 8,
        BinOp::Pow => 9,
    }
}

fn bin_token(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Pow => "^",
        BinOp::Eq => "==",
        BinOp::NotEq => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::LtEq => "<=",
        BinOp::GtEq => ">=",
    }
}

/// Print a whole program.
pub fn print_program(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.body {
        print_stmt(stmt, 0, &mut out);
    }
    out
}

fn indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str("    ");
    }
}

fn print_block(block: &Block, level: usize, out: &mut String) {
    out.push_str("{\n");
    for stmt in &block.body {
        print_stmt(stmt, level + 1, out);
    }
    indent(level, out);
    out.push('}');
}

fn print_stmt(stmt: &Stmt, level: usize, out: &mut String) {
    indent(level, out);
    match stmt {
        Stmt::Expr(s) => {
            print_expr(&s.expr, 0, out);
        }
        Stmt::Block(block) => print_block(block, level, out),
        Stmt::If(s) => {
            out.push_str("if ");
            print_expr(&s.cond, 0, out);
            out.push(' ');
            print_block(&s.then_block, level, out);
            for (cond, block) in &s.elif_branches {
                out.push_str(" elif ");
                print_expr(cond, 0, out);
                out.push(' ');
                print_block(block, level, out);
            }
            if let Some(else_block) = &s.else_block {
                out.push_str(" else ");
                print_block(else_block, level, out);
            }
        }
        Stmt::While(s) => {
            out.push_str("while ");
            print_expr(&s.cond, 0, out);
            out.push(' ');
            print_block(&s.body, level, out);
        }
        Stmt::ForIn(s) => {
            out.push_str("for ");
            out.push_str(s.var.as_str());
            out.push_str(" in ");
            print_expr(&s.iterable, 0, out);
            out.push(' ');
            print_block(&s.body, level, out);
        }
        Stmt::Function(decl) => print_function(decl, level, out),
        Stmt::Return(s) => {
            out.push_str("return");
            if let Some(value) = &s.value {
                out.push(' ');
                print_expr(value, 0, out);
            }
        }
        Stmt::Break(_) => out.push_str("break"),
        Stmt::Continue(_) => out.push_str("continue"),
        Stmt::Class(decl) => {
            out.push_str("class ");
            out.push_str(decl.name.as_str());
            if let Some(base) = decl.base {
                out.push_str(" extends ");
                out.push_str(base.as_str());
            }
            out.push_str(" {\n");
            for method in &decl.methods {
                print_function(method, level + 1, out);
                out.push('\n');
            }
            indent(level, out);
            out.push('}');
        }
        Stmt::Try(s) => {
            out.push_str("try ");
            print_block(&s.body, level, out);
            if let Some(catch) = &s.catch {
                out.push_str(" catch ");
                out.push_str(catch.binding.as_str());
                out.push(' ');
                print_block(&catch.body, level, out);
            }
            if let Some(finally) = &s.finally {
                out.push_str(" finally ");
                print_block(finally, level, out);
            }
        }
        Stmt::Throw(s) => {
            out.push_str("throw ");
            print_expr(&s.value, 0, out);
        }
        Stmt::Match(s) => {
            out.push_str("match ");
            print_expr(&s.subject, 0, out);
            out.push_str(" {\n");
            for arm in &s.arms {
                indent(level + 1, out);
                out.push_str("case ");
                print_expr(&arm.value, 0, out);
                out.push(' ');
                print_block(&arm.body, level + 1, out);
                out.push('\n');
            }
            if let Some(default) = &s.default {
                indent(level + 1, out);
                out.push_str("default ");
                print_block(default, level + 1, out);
                out.push('\n');
            }
            indent(level, out);
            out.push('}');
        }
        Stmt::Scene(s) => {
            out.push_str("scene ");
            out.push_str(s.name.as_str());
            out.push(' ');
            print_block(&s.body, level, out);
        }
        Stmt::WebApp(s) => {
            out.push_str("web.app {\n");
            for route in &s.routes {
                indent(level + 1, out);
                out.push_str("route ");
                print_string(route.path.as_str(), out);
                out.push(' ');
                print_block(&route.body, level + 1, out);
                out.push('\n');
            }
            indent(level, out);
            out.push('}');
        }
        Stmt::Import(s) => {
            if s.names.is_empty() {
                out.push_str("import ");
                out.push_str(s.module.as_str());
            } else {
                out.push_str("from ");
                out.push_str(s.module.as_str());
                out.push_str(" import ");
                let names: Vec<&str> = s.names.iter().map(|n| n.as_str()).collect();
                out.push_str(&names.join(", "));
            }
        }
        Stmt::Export(s) => {
            out.push_str("export ");
            // the inner statement prints on the same line
            let mut inner = String::new();
            print_stmt(&s.inner, level, &mut inner);
            out.push_str(inner.trim_start());
            return;
        }
        Stmt::Const(s) => {
            out.push_str("const ");
            out.push_str(s.name.as_str());
            out.push_str(" = ");
            print_expr(&s.value, 0, out);
        }
    }
    out.push('\n');
}

fn print_function(decl: &FunctionDecl, level: usize, out: &mut String) {
    if decl.is_async {
        out.push_str("async ");
    }
    out.push_str("function ");
    out.push_str(decl.name.as_str());
    out.push('(');
    let params: Vec<&str> = decl.params.iter().map(|p| p.as_str()).collect();
    out.push_str(&params.join(", "));
    out.push_str(") ");
    print_block(&decl.body, level, out);
}

fn print_string(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out.push('"');
}

fn print_number(n: f64, out: &mut String) {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        out.push_str(&format!("{}", n as i64));
    } else {
        out.push_str(&format!("{}", n));
    }
}

/// Print an expression. `min_prec` is the binding strength of the
/// context; weaker operators get wrapped in parentheses.
fn print_expr(expr: &Expr, min_prec: u8, out: &mut String) {
    match expr {
        Expr::Number(lit) => print_number(lit.value, out),
        Expr::Str(lit) => print_string(lit.value.as_str(), out),
        Expr::Bool(lit) => out.push_str(if lit.value { "true" } else { "false" }),
        Expr::Null(_) => out.push_str("null"),
        Expr::Ident(ident) => out.push_str(ident.name.as_str()),
        Expr::This(_) => out.push_str("this"),
        Expr::Unary(unary) => {
            let (token, prec) = match unary.op {
                UnOp::Neg => ("-", 10),
                UnOp::Not => ("not ", 4),
            };
            let wrap = prec < min_prec;
            if wrap {
                out.push('(');
            }
            out.push_str(token);
            print_expr(&unary.operand, prec + 1, out);
            if wrap {
                out.push(')');
            }
        }
        Expr::Binary(binary) => {
            let prec = bin_prec(binary.op);
            let wrap = prec < min_prec;
            if wrap {
                out.push('(');
            }
            // ^ is right-associative, the rest associate left
            let (left_min, right_min) = if binary.op == BinOp::Pow {
                (prec + 1, prec)
            } else {
                (prec, prec + 1)
            };
            print_expr(&binary.lhs, left_min, out);
            out.push(' ');
            out.push_str(bin_token(binary.op));
            out.push(' ');
            print_expr(&binary.rhs, right_min, out);
            if wrap {
                out.push(')');
            }
        }
        Expr::Logical(logical) => {
            let (token, prec) = match logical.op {
                LogicalOp::Or => ("or", 2),
                LogicalOp::And => ("and", 3),
            };
            let wrap = prec < min_prec;
            if wrap {
                out.push('(');
            }
            print_expr(&logical.lhs, prec, out);
            out.push(' ');
            out.push_str(token);
            out.push(' ');
            print_expr(&logical.rhs, prec + 1, out);
            if wrap {
                out.push(')');
            }
        }
        Expr::Assign(assign) => {
            let wrap = 1 < min_prec;
            if wrap {
                out.push('(');
            }
            print_expr(&assign.target, 11, out);
            out.push_str(match assign.op {
                None => " = ",
                Some(BinOp::Add) => " += ",
                Some(BinOp::Sub) => " -= ",
                Some(BinOp::Mul) => " *= ",
                Some(BinOp::Div) => " /= ",
                Some(_) => " = ",
            });
            print_expr(&assign.value, 1, out);
            if wrap {
                out.push(')');
            }
        }
        Expr::Array(array) => {
            out.push('[');
            for (index, element) in array.elements.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                print_expr(element, 0, out);
            }
            out.push(']');
        }
        Expr::Object(object) => {
            out.push('{');
            for (index, (key, value)) in object.entries.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push_str(key.as_str());
                out.push_str(": ");
                print_expr(value, 0, out);
            }
            out.push('}');
        }
        Expr::Member(member) => {
            print_expr(&member.object, 11, out);
            out.push('.');
            out.push_str(member.name.as_str());
        }
        Expr::Index(index) => {
            print_expr(&index.object, 11, out);
            out.push('[');
            print_expr(&index.index, 0, out);
            out.push(']');
        }
        Expr::Call(call) => {
            print_expr(&call.callee, 11, out);
            print_args(&call.args, out);
        }
        Expr::MethodCall(call) => {
            print_expr(&call.recv, 11, out);
            out.push('.');
            out.push_str(call.method.as_str());
            print_args(&call.args, out);
        }
        Expr::SuperCall(call) => {
            out.push_str("super.");
            out.push_str(call.method.as_str());
            print_args(&call.args, out);
        }
        Expr::Lambda(lambda) => {
            let wrap = min_prec > 0;
            if wrap {
                out.push('(');
            }
            out.push('(');
            let params: Vec<&str> = lambda.params.iter().map(|p| p.as_str()).collect();
            out.push_str(&params.join(", "));
            out.push_str(") -> ");
            match &lambda.body {
                LambdaBody::Expr(expr) => print_expr(expr, 1, out),
                LambdaBody::Block(block) => print_block(block, 0, out),
            }
            if wrap {
                out.push(')');
            }
        }
        Expr::New(new) => {
            out.push_str("new ");
            print_expr(&new.class, 11, out);
            print_args(&new.args, out);
        }
        Expr::Await(awaited) => {
            out.push_str("await ");
            print_expr(&awaited.value, 11, out);
        }
    }
}

fn print_args(args: &[Expr], out: &mut String) {
    out.push('(');
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        print_expr(arg, 0, out);
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::parse_source;

    /// Print, reparse, reprint: the two printed forms must agree.
    fn assert_fixpoint(source: &str) {
        let first = print_program(&parse_source(source));
        let second = print_program(&parse_source(&first));
        assert_eq!(first, second, "printer is not a fixpoint for {:?}", source);
    }

    #[test]
    fn test_simple_statements_round_trip() {
        assert_fixpoint("x = 10\ny = x + 1\nprint(x * y)");
    }

    #[test]
    fn test_precedence_round_trips_without_parens() {
        let printed = print_program(&parse_source("t = 1 + 2 * 3"));
        assert_eq!(printed, "t = 1 + 2 * 3\n");
        assert_fixpoint("t = (1 + 2) * 3");
        assert_fixpoint("t = 2 ^ 3 ^ 2");
        assert_fixpoint("t = (2 ^ 3) ^ 2");
        assert_fixpoint("t = -2 ^ 2");
        assert_fixpoint("t = not a and b or c");
    }

    #[test]
    fn test_grouped_lhs_keeps_parens() {
        let printed = print_program(&parse_source("t = (1 + 2) * 3"));
        assert_eq!(printed, "t = (1 + 2) * 3\n");
    }

    #[test]
    fn test_control_flow_round_trips() {
        assert_fixpoint("if a { b = 1 } elif c { d = 2 } else { e = 3 }");
        assert_fixpoint("while x < 10 { x += 1 }");
        assert_fixpoint("for item in list { print(item) }");
        assert_fixpoint("match x {\ncase 1 { a() }\ndefault { b() }\n}");
    }

    #[test]
    fn test_functions_and_classes_round_trip() {
        assert_fixpoint("function add(a, b) { return a + b }");
        assert_fixpoint(
            "class Dog extends Animal {\nfunction constructor(name) { this.name = name }\nfunction speak() { return super.speak() + \"!\" }\n}",
        );
        assert_fixpoint("mk = (x) -> (y) -> x + y");
        assert_fixpoint("p = new Point(1, 2).norm()");
    }

    #[test]
    fn test_literals_round_trip() {
        assert_fixpoint("a = [1, 2.5, \"s\", true, null]");
        assert_fixpoint("o = {name: \"Ada\", age: 36}");
        assert_fixpoint("s = \"tab\\there\\nline\"");
    }

    #[test]
    fn test_try_and_reserved_forms_round_trip() {
        assert_fixpoint("try { risky() } catch e { log(e) } finally { done() }");
        assert_fixpoint("throw \"boom\"");
        assert_fixpoint("import physics");
        assert_fixpoint("from geometry import circle, square");
        assert_fixpoint("const LIMIT = 100");
        assert_fixpoint("scene Intro { setup() }");
        assert_fixpoint("web.app {\nroute \"/\" { home() }\n}");
    }
}
