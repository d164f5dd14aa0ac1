#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use rulox::interpreter::Interpreter;

    /// Cloneable `Write` sink; one handle goes into the interpreter, the
    /// other stays with the test to read what the program printed.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run a whole program, returning the pipeline result and everything
    /// it printed.
    fn run_program(source: &str) -> (Result<(), String>, String) {
        let sink = SharedBuffer::default();
        let mut interpreter = Interpreter::with_output(Box::new(sink.clone()));

        let result = rulox::run(source.as_bytes(), &mut interpreter).map_err(|e| e.to_string());
        drop(interpreter);

        let output = String::from_utf8(sink.0.borrow().clone()).expect("output is UTF-8");

        (result, output)
    }

    fn output_of(source: &str) -> String {
        let (result, output) = run_program(source);
        assert!(result.is_ok(), "unexpected error: {:?}", result);
        output
    }

    fn error_of(source: &str) -> (String, String) {
        let (result, output) = run_program(source);
        (result.expect_err("expected a runtime error"), output)
    }

    // ───────────────────────── printing and operators ─────────────────────

    #[test]
    fn print_renders_canonical_forms() {
        assert_eq!(
            output_of("print nil; print true; print 3; print 2.5; print \"hi\";"),
            "nil\ntrue\n3\n2.5\nhi\n"
        );
    }

    #[test]
    fn function_and_class_values_print_by_name() {
        assert_eq!(
            output_of("fun f() {} class C {} print f; print C; print C(); print clock;"),
            "<fn f>\nC\nC instance\n<native fn>\n"
        );
    }

    #[test]
    fn arithmetic_and_string_concatenation() {
        assert_eq!(
            output_of("print 1 + 2 * 3 - 4 / 2; print \"foo\" + \"bar\";"),
            "5\nfoobar\n"
        );
    }

    #[test]
    fn comparison_and_equality() {
        assert_eq!(
            output_of("print 1 < 2; print 2 <= 1; print 1 == 1; print \"a\" == \"b\"; print nil == nil; print nil == false;"),
            "true\nfalse\ntrue\nfalse\ntrue\nfalse\n"
        );
    }

    #[test]
    fn zero_and_empty_string_are_truthy() {
        assert_eq!(
            output_of("if (0) print \"zero\"; if (\"\") print \"empty\"; if (nil) print \"nil\";"),
            "zero\nempty\n"
        );
    }

    #[test]
    fn logical_operators_yield_the_deciding_operand() {
        assert_eq!(
            output_of("print \"hi\" or 2; print nil or \"yes\"; print nil and 1; print 1 and 2;"),
            "hi\nyes\nnil\n2\n"
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(output_of("print -3; print !nil; print !0;"), "-3\ntrue\nfalse\n");
    }

    #[test]
    fn adding_a_number_to_a_string_is_an_error() {
        let (error, output) = error_of("print 1 + \"x\";");
        assert!(error.contains("Operands must be two numbers or two strings."));
        assert_eq!(output, "");
    }

    #[test]
    fn negating_a_string_is_an_error() {
        let (error, _) = error_of("print -\"x\";");
        assert!(error.contains("Operand must be a number."));
    }

    // ───────────────────────── variables and scope ────────────────────────

    #[test]
    fn block_scope_shadows_and_restores() {
        assert_eq!(
            output_of("var a = 1; { var a = 2; print a; } print a;"),
            "2\n1\n"
        );
    }

    #[test]
    fn global_redefinition_is_allowed() {
        assert_eq!(output_of("var a = 1; var a = 2; print a;"), "2\n");
    }

    #[test]
    fn assignment_evaluates_to_the_assigned_value() {
        assert_eq!(output_of("var a = 1; print a = 5; print a;"), "5\n5\n");
    }

    #[test]
    fn undefined_variable_read_fails_before_printing() {
        let (error, output) = error_of("print x;");

        assert!(error.contains("Undefined variable 'x'."), "got: {error}");
        assert!(error.contains("[line 1]"), "got: {error}");
        assert_eq!(output, "");
    }

    #[test]
    fn undefined_variable_assignment_fails() {
        let (error, _) = error_of("x = 1;");
        assert!(error.contains("Undefined variable 'x'."), "got: {error}");
    }

    #[test]
    fn shadowed_global_is_not_visible_to_an_earlier_closure() {
        // The function body resolved against the global `a`; the later
        // block-local must not leak into it.
        assert_eq!(
            output_of("var a = \"global\"; { fun show() { print a; } show(); var a = \"block\"; show(); }"),
            "global\nglobal\n"
        );
    }

    // ───────────────────────── control flow ───────────────────────────────

    #[test]
    fn if_else_picks_one_branch() {
        assert_eq!(
            output_of("if (1 < 2) print \"then\"; else print \"else\";"),
            "then\n"
        );
    }

    #[test]
    fn while_loop_runs_until_falsy() {
        assert_eq!(
            output_of("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn for_loop_desugars_and_runs() {
        assert_eq!(output_of("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
    }

    #[test]
    fn break_exits_one_loop() {
        assert_eq!(
            output_of("for (var i = 0; i < 5; i = i + 1) { if (i == 2) break; print i; }"),
            "0\n1\n"
        );
    }

    #[test]
    fn multi_level_break_exits_both_loops() {
        assert_eq!(
            output_of(
                "for (var i = 0; i < 3; i = i + 1) { for (var j = 0; j < 3; j = j + 1) { if (j == 1) break 2; print j; } }"
            ),
            "0\n"
        );
    }

    #[test]
    fn break_two_resumes_the_outermost_of_three_loops() {
        assert_eq!(
            output_of(
                "for (var i = 0; i < 2; i = i + 1) { for (var j = 0; j < 2; j = j + 1) { for (var k = 0; k < 2; k = k + 1) { print k; break 2; } } }"
            ),
            "0\n0\n"
        );
    }

    // ───────────────────────── functions and closures ─────────────────────

    #[test]
    fn function_call_and_implicit_nil_return() {
        assert_eq!(output_of("fun f(a, b) { print a + b; } print f(1, 2);"), "3\nnil\n");
    }

    #[test]
    fn return_unwinds_to_the_call_boundary() {
        assert_eq!(
            output_of("fun f() { while (true) { return \"out\"; } } print f();"),
            "out\n"
        );
    }

    #[test]
    fn recursion_works() {
        assert_eq!(
            output_of("fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);"),
            "55\n"
        );
    }

    #[test]
    fn closures_share_their_captured_frame() {
        assert_eq!(
            output_of(
                "fun make() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } var c = make(); print c(); print c();"
            ),
            "1\n2\n"
        );
    }

    #[test]
    fn sibling_closures_observe_each_others_writes() {
        assert_eq!(
            output_of(
                "fun make() { var n = 0; fun bump() { n = n + 1; } fun read() { return n; } bump(); print read(); }  make();"
            ),
            "1\n"
        );
    }

    #[test]
    fn calling_a_non_callable_fails_at_the_paren() {
        let (error, _) = error_of("var x = 1; x();");

        assert!(error.contains("Can only call functions and classes."), "got: {error}");
        assert!(error.contains("at ')'"), "got: {error}");
    }

    #[test]
    fn arity_mismatch_reports_expected_and_got() {
        let (error, _) = error_of("fun f(a, b) {} f(1);");
        assert!(error.contains("Expected 2 arguments but got 1."), "got: {error}");
    }

    // ───────────────────────── classes ────────────────────────────────────

    #[test]
    fn fields_are_created_on_first_set() {
        assert_eq!(
            output_of("class Box {} var b = Box(); b.value = 42; print b.value;"),
            "42\n"
        );
    }

    #[test]
    fn undefined_property_read_fails() {
        let (error, _) = error_of("class Box {} print Box().value;");
        assert!(error.contains("Undefined property 'value'."), "got: {error}");
    }

    #[test]
    fn property_access_on_a_number_fails() {
        let (error, _) = error_of("var x = 1; print x.y;");
        assert!(error.contains("Only instances have properties."), "got: {error}");
    }

    #[test]
    fn methods_bind_this_per_instance() {
        assert_eq!(
            output_of(
                "class Counter { Counter() { this.n = 0; } bump() { this.n = this.n + 1; return this.n; } } \
                 var a = Counter(); var b = Counter(); a.bump(); a.bump(); b.bump(); print a.n; print b.n;"
            ),
            "2\n1\n"
        );
    }

    #[test]
    fn detached_method_remembers_its_receiver() {
        assert_eq!(
            output_of(
                "class Speaker { Speaker(word) { this.word = word; } say() { print this.word; } } \
                 var m = Speaker(\"hi\").say; m();"
            ),
            "hi\n"
        );
    }

    #[test]
    fn initializer_is_the_method_named_after_the_class() {
        assert_eq!(
            output_of("class A { A() { print \"init\"; } } A();"),
            "init\n"
        );
    }

    #[test]
    fn constructor_yields_the_instance_despite_initializer_return() {
        assert_eq!(
            output_of("class C { C() { return; } } print C();"),
            "C instance\n"
        );
    }

    #[test]
    fn initializer_arity_is_enforced() {
        let (error, _) = error_of("class P { P(x, y) {} } P(1);");
        assert!(error.contains("Expected 2 arguments but got 1."), "got: {error}");
    }

    #[test]
    fn methods_inherit_through_the_superclass_chain() {
        assert_eq!(
            output_of("class A { hello() { print \"A\"; } } class B < A {} B().hello();"),
            "A\n"
        );
    }

    #[test]
    fn super_resolves_to_the_immediate_superclass_initializer() {
        assert_eq!(
            output_of(
                "class A { A() { print \"init\"; } } class B < A { B() { super.A(); print \"sub\"; } } B();"
            ),
            "init\nsub\n"
        );
    }

    #[test]
    fn super_skips_an_override() {
        assert_eq!(
            output_of(
                "class A { m() { print \"A\"; } } class B < A { m() { print \"B\"; } test() { super.m(); } } B().test();"
            ),
            "A\n"
        );
    }

    #[test]
    fn super_binds_through_a_grandchild_call() {
        assert_eq!(
            output_of(
                "class A { m() { print \"A\"; } } class B < A { m() { super.m(); print \"B\"; } } class C < B {} C().m();"
            ),
            "A\nB\n"
        );
    }

    #[test]
    fn superclass_must_be_a_class() {
        let (error, _) = error_of("var NotAClass = 1; class B < NotAClass {}");
        assert!(error.contains("Superclass must be a class."), "got: {error}");
    }

    // ───────────────────────── natives ────────────────────────────────────

    #[test]
    fn mod_native_computes_a_remainder() {
        assert_eq!(output_of("print mod(7, 3); print mod(9.5, 3);"), "1\n0.5\n");
    }

    #[test]
    fn mod_native_rejects_non_numbers() {
        let (error, _) = error_of("mod(\"a\", 1);");
        assert!(error.contains("Operands must be numbers."), "got: {error}");
    }

    #[test]
    fn clock_native_moves_forward() {
        assert_eq!(
            output_of("var t = clock(); print t > 0; print clock() >= t;"),
            "true\ntrue\n"
        );
    }

    #[test]
    fn natives_check_arity() {
        let (error, _) = error_of("clock(1);");
        assert!(error.contains("Expected 0 arguments but got 1."), "got: {error}");
    }

    // ───────────────────────── pipeline behavior ──────────────────────────

    #[test]
    fn scan_errors_stop_the_run_before_execution() {
        let (result, output) = run_program("print 1; @");

        assert!(result.unwrap_err().contains("Unexpected character"));
        assert_eq!(output, "");
    }

    #[test]
    fn static_errors_stop_the_run_before_execution() {
        // The print would succeed, but the resolver must fail first.
        let (result, output) = run_program("print 1; if (false) return 2;");

        assert!(result.unwrap_err().contains("Can't return from top-level code."));
        assert_eq!(output, "");
    }

    #[test]
    fn scanning_preserves_significant_characters() {
        use rulox::scanner::Scanner;

        let tokens = Scanner::new(b"1+2").scan_tokens().unwrap();
        let rebuilt: String = tokens.iter().map(|t| t.lexeme).collect();

        assert_eq!(rebuilt, "1+2");
    }

    #[test]
    fn a_session_spans_multiple_chunks() {
        let sink = SharedBuffer::default();
        let mut interpreter: Interpreter<'static> = Interpreter::with_output(Box::new(sink.clone()));

        rulox::run(b"var a = 1; fun next() { a = a + 1; return a; }", &mut interpreter).unwrap();
        rulox::run(b"print next();", &mut interpreter).unwrap();
        rulox::run(b"print next();", &mut interpreter).unwrap();
        drop(interpreter);

        let output = String::from_utf8(sink.0.borrow().clone()).unwrap();
        assert_eq!(output, "2\n3\n");
    }

    #[test]
    fn interactive_runs_echo_lone_expressions() {
        let sink = SharedBuffer::default();
        let mut interpreter: Interpreter<'static> = Interpreter::with_output(Box::new(sink.clone()));

        rulox::run_interactive(b"1 + 2;", &mut interpreter).unwrap();
        rulox::run_interactive(b"var a = 9;", &mut interpreter).unwrap();
        drop(interpreter);

        let output = String::from_utf8(sink.0.borrow().clone()).unwrap();
        assert_eq!(output, "3\n");
    }
}
