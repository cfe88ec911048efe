//! End-to-end execution tests: the scenario programs and boundary
//! cases, run through the full lex -> parse -> emit -> run pipeline
//! with a captured output sink.

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use mythos_emit::CodeObject;
    use mythos_lex::Lexer;
    use mythos_par::Parser;
    use mythos_util::Handler;

    use crate::{ErrorKind, HostEnv, Value, Vm, VmError};

    fn compile(source: &str) -> Rc<CodeObject> {
        let handler = Handler::new();
        let tokens = Lexer::new(source, &handler).tokenize();
        assert!(!handler.has_errors(), "lex: {:?}", handler.first_error());
        let program = Parser::new(tokens, &handler)
            .parse_program()
            .expect("parse failed");
        assert!(!handler.has_errors(), "parse: {:?}", handler.first_error());
        let code = mythos_emit::compile(&program, &handler).expect("emit failed");
        assert!(!handler.has_errors(), "emit: {:?}", handler.first_error());
        code
    }

    /// Run a program and return its captured stdout.
    fn run_stdout(source: &str) -> String {
        let (host, buffer) = HostEnv::buffered();
        let mut vm = Vm::with_host(host);
        let result = vm.run(compile(source));
        if let Err(err) = &result {
            panic!("runtime error: {}", err.report());
        }
        let bytes = buffer.borrow().clone();
        String::from_utf8(bytes).unwrap()
    }

    /// Run a program and return its result value.
    fn run_value(source: &str) -> Value {
        let (host, _buffer) = HostEnv::buffered();
        let mut vm = Vm::with_host(host);
        vm.run(compile(source)).expect("runtime error")
    }

    /// Run a program expecting a runtime error.
    fn run_error(source: &str) -> VmError {
        let (host, _buffer) = HostEnv::buffered();
        let mut vm = Vm::with_host(host);
        vm.run(compile(source)).expect_err("expected runtime error")
    }

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    #[test]
    fn test_scenario_1_arithmetic_on_globals() {
        assert_eq!(run_stdout("x = 10\ny = 20\nprint(x + y)"), "30\n");
    }

    #[test]
    fn test_scenario_2_function_call() {
        assert_eq!(
            run_stdout("function f(a, b) { return a * b }\nprint(f(6, 7))"),
            "42\n"
        );
    }

    #[test]
    fn test_scenario_3_for_over_range() {
        assert_eq!(
            run_stdout("s = \"\"\nfor i in range(1, 4) { s = s + string(i) }\nprint(s)"),
            "123\n"
        );
    }

    #[test]
    fn test_scenario_4_array_indexing() {
        assert_eq!(run_stdout("a = [1, 2, 3]\nprint(a[0] + a[2])"), "4\n");
    }

    #[test]
    fn test_scenario_5_object_member() {
        assert_eq!(
            run_stdout("o = {n: \"Alice\", a: 30}\nprint(o.n)"),
            "Alice\n"
        );
    }

    #[test]
    fn test_scenario_6_closure() {
        assert_eq!(
            run_stdout("function mk(x) { return (y) -> x + y }\nadd5 = mk(5)\nprint(add5(3))"),
            "8\n"
        );
    }

    #[test]
    fn test_scenario_7_class() {
        let source = "class C { function constructor(v) { this.v = v } function get() { return this.v } }\nprint(new C(7).get())";
        assert_eq!(run_stdout(source), "7\n");
    }

    // =========================================================================
    // ARITHMETIC AND COERCION
    // =========================================================================

    #[test]
    fn test_division_by_zero_is_ieee() {
        assert_eq!(run_stdout("print(1 / 0)\nprint(-1 / 0)\nprint(0 / 0)"), "inf\n-inf\nnan\n");
    }

    #[test]
    fn test_nan_is_not_equal_to_itself() {
        assert_eq!(run_stdout("n = 0 / 0\nprint(n == n)\nprint(n != n)"), "false\ntrue\n");
    }

    #[test]
    fn test_string_number_concatenation() {
        assert_eq!(run_stdout("print(\"v=\" + 3)\nprint(3 + \"!\")"), "v=3\n3!\n");
    }

    #[test]
    fn test_add_type_mismatch_raises() {
        let err = run_error("x = 1 + null");
        assert_eq!(err.kind, ErrorKind::Type);
        assert!(err.message.contains('+'));
    }

    #[test]
    fn test_power_and_precedence() {
        assert_eq!(run_stdout("print(2 ^ 3 ^ 2)"), "512\n");
        assert_eq!(run_stdout("print(1 + 2 * 3)"), "7\n");
        assert_eq!(run_stdout("print(-2 ^ 2)"), "4\n");
    }

    #[test]
    fn test_unary_minus_on_extremes() {
        assert_eq!(run_stdout("print(-(1 / 0))"), "-inf\n");
        assert_eq!(run_stdout("x = 1e308\nprint(-x + -x)"), "-inf\n");
    }

    #[test]
    fn test_string_comparison() {
        assert_eq!(run_stdout("print(\"abc\" < \"abd\")"), "true\n");
        let err = run_error("x = \"a\" < 1");
        assert_eq!(err.kind, ErrorKind::Type);
    }

    // =========================================================================
    // CONTROL FLOW
    // =========================================================================

    #[test]
    fn test_if_elif_else_chain() {
        let source = "function f(n) {\nif n < 0 { return \"neg\" } elif n == 0 { return \"zero\" } else { return \"pos\" }\n}\nprint(f(-1))\nprint(f(0))\nprint(f(3))";
        assert_eq!(run_stdout(source), "neg\nzero\npos\n");
    }

    #[test]
    fn test_while_with_break_and_continue() {
        let source = "i = 0\ns = \"\"\nwhile true {\ni += 1\nif i == 3 { continue }\nif i > 5 { break }\ns = s + string(i)\n}\nprint(s)";
        assert_eq!(run_stdout(source), "1245\n");
    }

    #[test]
    fn test_for_over_array_object_string() {
        assert_eq!(
            run_stdout("t = \"\"\nfor v in [1, 2] { t = t + string(v) }\nprint(t)"),
            "12\n"
        );
        assert_eq!(
            run_stdout("t = \"\"\nfor k in {b: 1, a: 2} { t = t + k }\nprint(t)"),
            "ba\n"
        );
        assert_eq!(
            run_stdout("t = \"\"\nfor c in \"xyz\" { t = t + c + \".\" }\nprint(t)"),
            "x.y.z.\n"
        );
    }

    #[test]
    fn test_nested_loop_break_is_inner_only() {
        let source = "s = \"\"\nfor i in range(0, 3) {\nfor j in range(0, 3) {\nif j == 1 { break }\ns = s + string(i) + string(j)\n}\n}\nprint(s)";
        assert_eq!(run_stdout(source), "001020\n");
    }

    #[test]
    fn test_match_selects_arm() {
        let source = "function name(n) {\nmatch n {\ncase 1 { return \"one\" }\ncase 2 { return \"two\" }\ndefault { return \"many\" }\n}\n}\nprint(name(1))\nprint(name(2))\nprint(name(9))";
        assert_eq!(run_stdout(source), "one\ntwo\nmany\n");
    }

    #[test]
    fn test_match_without_match_falls_through() {
        let source = "x = 5\nmatch x {\ncase 1 { print(\"no\") }\n}\nprint(\"after\")";
        assert_eq!(run_stdout(source), "after\n");
    }

    #[test]
    fn test_logical_short_circuit_leaves_value() {
        assert_eq!(run_stdout("print(null or \"fallback\")"), "fallback\n");
        assert_eq!(run_stdout("print(0 and boom())"), "0\n");
        assert_eq!(run_stdout("print(1 or boom())"), "1\n");
        assert_eq!(run_stdout("print(not 0)"), "true\n");
    }

    #[test]
    fn test_evaluation_order_left_to_right() {
        let source = "log = \"\"\nfunction tag(x) { log += string(x)\nreturn x }\nt = tag(1) + tag(2) * tag(3)\nprint(log)\nprint(t)";
        assert_eq!(run_stdout(source), "123\n7\n");
    }

    // =========================================================================
    // CLOSURES
    // =========================================================================

    #[test]
    fn test_closure_captures_variable_not_value() {
        // both lambdas share the cell behind parameter `n`
        let source = "function mk(n) {\nbump = () -> n = n + 1\nget = () -> n\nbump()\nbump()\nreturn get()\n}\nprint(mk(0))";
        assert_eq!(run_stdout(source), "2\n");
    }

    #[test]
    fn test_closure_outlives_frame() {
        let source = "function counter(n) {\nreturn () -> n = n + 1\n}\nc = counter(0)\nc()\nc()\nprint(c())";
        assert_eq!(run_stdout(source), "3\n");
    }

    #[test]
    fn test_local_function_recursion() {
        let source = "function outer() {\nfunction fact(n) {\nif n < 2 { return 1 }\nreturn n * fact(n - 1)\n}\nreturn fact(5)\n}\nprint(outer())";
        assert_eq!(run_stdout(source), "120\n");
    }

    // =========================================================================
    // CLASSES
    // =========================================================================

    #[test]
    fn test_inheritance_and_super() {
        let source = "class A {\nfunction greet() { return \"A\" }\n}\nclass B extends A {\nfunction greet() { return super.greet() + \"B\" }\n}\nprint(new B().greet())";
        assert_eq!(run_stdout(source), "AB\n");
    }

    #[test]
    fn test_method_lookup_walks_chain() {
        let source = "class A {\nfunction f() { return 1 }\n}\nclass B extends A { }\nprint(new B().f())";
        assert_eq!(run_stdout(source), "1\n");
    }

    #[test]
    fn test_constructor_return_value_is_ignored() {
        let source = "class C {\nfunction constructor() { this.v = 9\nreturn 42 }\n}\nc = new C()\nprint(c.v)";
        assert_eq!(run_stdout(source), "9\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = "class C {\nfunction f() { return \"method\" }\n}\nc = new C()\nc.f = () -> \"field\"\nprint(c.f())";
        assert_eq!(run_stdout(source), "field\n");
    }

    #[test]
    fn test_class_called_like_function_constructs() {
        let source = "class C {\nfunction constructor(v) { this.v = v }\n}\nc = C(5)\nprint(c.v)";
        assert_eq!(run_stdout(source), "5\n");
    }

    #[test]
    fn test_missing_member_is_null_on_dot() {
        assert_eq!(run_stdout("o = {a: 1}\nprint(o.missing)"), "null\n");
    }

    // =========================================================================
    // ERRORS AND HANDLERS
    // =========================================================================

    #[test]
    fn test_throw_and_catch_value() {
        let source = "try {\nthrow \"boom\"\n} catch e {\nprint(\"caught \" + e)\n}";
        assert_eq!(run_stdout(source), "caught boom\n");
    }

    #[test]
    fn test_catch_receives_error_object_for_vm_errors() {
        let source = "try {\nx = nope\n} catch e {\nprint(e.kind)\nprint(e.message)\n}";
        let out = run_stdout(source);
        assert!(out.starts_with("NameError\n"));
        assert!(out.contains("nope"));
    }

    #[test]
    fn test_finally_runs_on_normal_and_error_paths() {
        assert_eq!(
            run_stdout("try { print(\"body\") } finally { print(\"fin\") }"),
            "body\nfin\n"
        );
        let source =
            "try {\ntry { throw 1 } finally { print(\"fin\") }\n} catch e { print(\"caught\") }";
        assert_eq!(run_stdout(source), "fin\ncaught\n");
    }

    #[test]
    fn test_break_through_finally_runs_it_exactly_once() {
        let source = "count = 0\nfor i in range(0, 5) {\ntry {\nif i == 1 { break }\n} finally {\ncount += 1\n}\n}\nprint(count)";
        assert_eq!(run_stdout(source), "2\n");
    }

    #[test]
    fn test_continue_through_finally_runs_it_each_iteration() {
        let source = "count = 0\nfor i in range(0, 3) {\ntry {\ncontinue\n} finally {\ncount += 1\n}\n}\nprint(count)";
        assert_eq!(run_stdout(source), "3\n");
    }

    #[test]
    fn test_return_through_finally() {
        let source = "function f() {\ntry {\nreturn \"r\"\n} finally {\nprint(\"fin\")\n}\n}\nprint(f())";
        assert_eq!(run_stdout(source), "fin\nr\n");
    }

    #[test]
    fn test_error_unwinds_call_frames_to_handler() {
        let source = "function inner() { throw \"deep\" }\nfunction mid() { inner() }\ntry { mid() } catch e { print(e) }";
        assert_eq!(run_stdout(source), "deep\n");
    }

    #[test]
    fn test_rethrow_after_finally_continues_unwinding() {
        let source = "try {\ntry { throw \"x\" } finally { print(\"f1\") }\n} catch e { print(e) }";
        assert_eq!(run_stdout(source), "f1\nx\n");
    }

    #[test]
    fn test_uncaught_error_reports_call_stack() {
        let err = run_error("function f() { g() }\nfunction g() { throw \"末\" }\nf()");
        assert!(err.stack.iter().any(|f| f.function == "g"));
        assert!(err.stack.iter().any(|f| f.function == "<main>"));
    }

    #[test]
    fn test_name_error_on_unknown_global() {
        let err = run_error("print(missing_name)");
        assert_eq!(err.kind, ErrorKind::Name);
        assert!(err.message.contains("missing_name"));
        assert!(err.span.line >= 1);
    }

    #[test]
    fn test_calling_non_callable() {
        let err = run_error("x = 5\nx()");
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(err.span.line, 2);
    }

    // =========================================================================
    // INDEXING POLICY
    // =========================================================================

    #[test]
    fn test_array_read_out_of_range_is_null() {
        assert_eq!(run_stdout("a = [1]\nprint(a[5])\nprint(a[-1])"), "null\nnull\n");
    }

    #[test]
    fn test_array_write_out_of_range_raises() {
        let err = run_error("a = [1]\na[5] = 2");
        assert_eq!(err.kind, ErrorKind::Index);
    }

    #[test]
    fn test_object_bracket_access_is_strict() {
        assert_eq!(run_stdout("o = {k: 1}\nprint(o[\"k\"])"), "1\n");
        let err = run_error("o = {k: 1}\nx = o[\"nope\"]");
        assert_eq!(err.kind, ErrorKind::Key);
    }

    #[test]
    fn test_array_element_assignment() {
        assert_eq!(run_stdout("a = [1, 2]\na[0] = 9\nprint(a[0] + a[1])"), "11\n");
    }

    #[test]
    fn test_arrays_share_by_reference() {
        assert_eq!(run_stdout("a = [1]\nb = a\nb[0] = 5\nprint(a[0])"), "5\n");
    }

    #[test]
    fn test_compound_assignment_on_members_and_indexes() {
        assert_eq!(run_stdout("o = {n: 1}\no.n += 4\nprint(o.n)"), "5\n");
        assert_eq!(run_stdout("a = [10]\na[0] /= 4\nprint(a[0])"), "2.5\n");
    }

    // =========================================================================
    // LIMITS
    // =========================================================================

    #[test]
    fn test_deep_recursion_hits_vm_limit_not_host_stack() {
        let source = "function f(n) {\nif n == 0 { return 0 }\nreturn f(n - 1)\n}\nf(100000)";
        let err = run_error(source);
        assert_eq!(err.kind, ErrorKind::Error);
        assert!(err.message.contains("call depth"));
    }

    #[test]
    fn test_recursion_below_limit_is_fine() {
        let source = "function f(n) {\nif n == 0 { return 0 }\nreturn f(n - 1)\n}\nprint(f(1000))";
        assert_eq!(run_stdout(source), "0\n");
    }

    #[test]
    fn test_stack_depth_is_stable_across_statements() {
        // ten thousand expression statements must not leak stack
        let mut source = String::new();
        for _ in 0..10_000 {
            source.push_str("t = 1 + 2\n");
        }
        source.push_str("print(t)");
        assert_eq!(run_stdout(&source), "3\n");
    }

    // =========================================================================
    // EMBEDDING API
    // =========================================================================

    #[test]
    fn test_program_result_is_final_expression() {
        assert!(matches!(run_value("1 + 2"), Value::Number(n) if n == 3.0));
        // assignments are expressions and yield the assigned value
        assert!(matches!(run_value("x = 1"), Value::Number(n) if n == 1.0));
        // a non-expression final statement yields null
        assert!(matches!(run_value("while false { }"), Value::Null));
    }

    #[test]
    fn test_globals_persist_across_runs() {
        let (host, buffer) = HostEnv::buffered();
        let mut vm = Vm::with_host(host);
        vm.run(compile("counter = 41")).unwrap();
        vm.run(compile("counter = counter + 1")).unwrap();
        vm.run(compile("print(counter)")).unwrap();
        assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), "42\n");
    }

    #[test]
    fn test_registered_builtin_is_callable() {
        let (host, buffer) = HostEnv::buffered();
        let mut vm = Vm::with_host(host);
        vm.register_builtin("double", Some(1), |_, args| match args {
            [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
            _ => Ok(Value::Null),
        });
        vm.run(compile("print(double(21))")).unwrap();
        assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), "42\n");
    }

    #[test]
    fn test_scene_calls_registered_host_builtin() {
        let (host, buffer) = HostEnv::buffered();
        let mut vm = Vm::with_host(host);
        vm.register_builtin("__scene", Some(2), |_, args| {
            assert!(matches!(&args[0], Value::Str(s) if &**s == "Intro"));
            assert!(matches!(&args[1], Value::Function(_)));
            Ok(Value::Null)
        });
        vm.register_builtin("__route", Some(2), |_, _| Ok(Value::Null));
        vm.run(compile("scene Intro { print(\"never run\") }\nprint(\"done\")"))
            .unwrap();
        assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), "done\n");
    }

    #[test]
    fn test_unregistered_scene_raises_name_error() {
        let err = run_error("scene Intro { }");
        assert_eq!(err.kind, ErrorKind::Name);
        assert!(err.message.contains("__scene"));
    }

    #[test]
    fn test_object_key_order_is_insertion_order() {
        assert_eq!(
            run_stdout("o = {z: 1, a: 2}\no.m = 3\nprint(o)"),
            "{z: 1, a: 2, m: 3}\n"
        );
    }

    #[test]
    fn test_arguments_fill_and_discard() {
        let source = "function f(a, b) { return string(a) + \",\" + string(b) }\nprint(f(1))\nprint(f(1, 2, 3))";
        assert_eq!(run_stdout(source), "1,null\n1,2\n");
    }
}
